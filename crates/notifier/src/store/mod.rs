//! Subscription persistence seam.
//!
//! The dispatcher only needs two things from storage: the list of due
//! subscriptions, and a per-worker transaction in which to advance
//! `last_notified_at`. Each [`NotifyTransaction`] holds its own connection so
//! concurrent workers never share transactional state.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use weather_common::error::StoreError;
use weather_common::types::Subscription;

pub use memory::InMemorySubscriptionStore;
pub use postgres::PgSubscriptionStore;

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Confirmed subscriptions whose interval has elapsed at `now`, ordered by id.
    async fn select_due(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, StoreError>;

    /// Open a transaction for one subscription's notify unit.
    async fn begin(&self) -> Result<Box<dyn NotifyTransaction>, StoreError>;

    /// Set `last_notified_at` outside of any notify unit.
    ///
    /// Writing the same timestamp twice leaves the row unchanged and succeeds.
    async fn mark_notified(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        tx.mark_notified(id, at).await?;
        tx.commit().await
    }
}

/// A write scope for one subscription. Dropping it without [`commit`] rolls
/// every staged write back.
///
/// [`commit`]: NotifyTransaction::commit
#[async_trait]
pub trait NotifyTransaction: Send {
    /// Fails with [`StoreError::SubscriptionNotFound`] when no row matches `id`.
    async fn mark_notified(&mut self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
