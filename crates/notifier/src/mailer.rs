//! Notification delivery seam.

use async_trait::async_trait;

use weather_common::error::DeliveryError;
use weather_common::types::NotificationEmail;

/// Capability to deliver a weather notification to one address.
///
/// A returned error means the notification must be treated as not delivered;
/// there is no partial-delivery signal.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_notification(
        &self,
        to: &str,
        email: &NotificationEmail,
    ) -> Result<(), DeliveryError>;
}

/// Notifier that writes each email as a structured log line instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_notification(
        &self,
        to: &str,
        email: &NotificationEmail,
    ) -> Result<(), DeliveryError> {
        if to.is_empty() {
            return Err(DeliveryError::Failed("empty recipient address".to_string()));
        }

        tracing::info!(
            to,
            subject = NotificationEmail::SUBJECT,
            city = %email.city,
            temperature = email.temperature,
            humidity = email.humidity,
            description = %email.description,
            frequency = %email.frequency,
            "Notification email sent"
        );
        Ok(())
    }
}
