//! Single-subscription dispatch.
//!
//! A worker looks the city up in the cycle cache (filling it on a miss), then runs
//! the notify unit: advance `last_notified_at` and send the email inside one store
//! transaction. The worker never returns an error; every path ends in a
//! [`DispatchOutcome`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use weather_common::error::{DeliveryError, StoreError, WeatherError};
use weather_common::types::{NotificationEmail, Subscription, WeatherSnapshot};

use crate::cache::WeatherCache;
use crate::clock::Clock;
use crate::mailer::Notifier;
use crate::store::SubscriptionStore;
use crate::weather::WeatherProvider;

/// Everything a worker needs besides the subscription and the cycle cache.
#[derive(Clone)]
pub struct DispatchContext {
    pub store: Arc<dyn SubscriptionStore>,
    pub weather: Arc<dyn WeatherProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl DispatchContext {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        weather: Arc<dyn WeatherProvider>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            weather,
            notifier,
            clock,
        }
    }
}

/// Failure inside the notify unit (after weather was obtained).
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("Dispatch task aborted: {0}")]
    Aborted(String),
}

impl DispatchError {
    /// The subscription was deleted between selection and update.
    pub fn is_unsubscribed(&self) -> bool {
        matches!(self, DispatchError::Store(StoreError::SubscriptionNotFound(_)))
    }
}

/// Terminal result of dispatching one subscription in one cycle.
#[derive(Debug)]
pub enum DispatchOutcome {
    Delivered,
    WeatherFailed(WeatherError),
    Failed(DispatchError),
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered)
    }
}

/// Dispatch one due subscription.
pub async fn dispatch(
    ctx: &DispatchContext,
    cache: &WeatherCache,
    subscription: &Subscription,
) -> DispatchOutcome {
    let weather = match lookup_weather(ctx.weather.as_ref(), cache, &subscription.city).await {
        Ok(weather) => weather,
        Err(e) => return DispatchOutcome::WeatherFailed(e),
    };

    // Captured before the unit so the written timestamp does not drift with
    // however long the store and notifier take.
    let now = ctx.clock.now();

    match notify(ctx, subscription, &weather, now).await {
        Ok(()) => DispatchOutcome::Delivered,
        Err(e) => DispatchOutcome::Failed(e),
    }
}

/// Read-through weather lookup. Only successful answers are cached.
pub async fn lookup_weather(
    provider: &dyn WeatherProvider,
    cache: &WeatherCache,
    city: &str,
) -> Result<WeatherSnapshot, WeatherError> {
    if let Some(hit) = cache.get(city) {
        tracing::trace!(city, "Weather cache hit");
        return Ok(hit);
    }

    let snapshot = provider.current(city).await?;
    cache.set(city, snapshot.clone());
    Ok(snapshot)
}

/// The notify unit. Returning early drops `tx`, which rolls the timestamp back.
async fn notify(
    ctx: &DispatchContext,
    subscription: &Subscription,
    weather: &WeatherSnapshot,
    now: DateTime<Utc>,
) -> Result<(), DispatchError> {
    let mut tx = ctx.store.begin().await?;
    tx.mark_notified(subscription.id, now).await?;

    let email = NotificationEmail::new(subscription, weather);
    ctx.notifier
        .send_notification(&subscription.email, &email)
        .await?;

    tx.commit().await?;
    Ok(())
}
