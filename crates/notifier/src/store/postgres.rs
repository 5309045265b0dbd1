//! Postgres-backed subscription store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use weather_common::error::StoreError;
use weather_common::types::{Frequency, Subscription};

use super::{NotifyTransaction, SubscriptionStore};

/// Subscription store over the `subscriptions` table.
#[derive(Debug, Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn select_due(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, StoreError> {
        // Cutoffs are computed here so the intervals live in one place (`Frequency::interval`).
        let hourly_cutoff = now - Frequency::Hourly.interval();
        let daily_cutoff = now - Frequency::Daily.interval();

        let subs: Vec<Subscription> = sqlx::query_as(
            r#"
            SELECT id, email, city, frequency, confirmed, created_at, last_notified_at
            FROM subscriptions
            WHERE confirmed = true
              AND (
                last_notified_at IS NULL
                OR (frequency = 'hourly' AND last_notified_at <= $1)
                OR (frequency = 'daily' AND last_notified_at <= $2)
              )
            ORDER BY id
            "#,
        )
        .bind(hourly_cutoff)
        .bind(daily_cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(subs)
    }

    async fn begin(&self) -> Result<Box<dyn NotifyTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgNotifyTransaction { tx }))
    }
}

/// One worker's transaction, on its own pooled connection.
struct PgNotifyTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl NotifyTransaction for PgNotifyTransaction {
    async fn mark_notified(&mut self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE subscriptions SET last_notified_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::SubscriptionNotFound(id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
