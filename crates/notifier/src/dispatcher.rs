//! Bounded fan-out of one cycle's due subscriptions.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use weather_common::types::Subscription;

use crate::cache::WeatherCache;
use crate::worker::{self, DispatchContext, DispatchError, DispatchOutcome};

/// Default number of subscriptions processed concurrently.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Per-cycle outcome counts.
///
/// `due` always equals the sum of the other four fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub due: usize,
    pub delivered: usize,
    pub weather_failed: usize,
    pub delivery_failed: usize,
    /// Deleted between selection and update; no email was sent.
    pub unsubscribed: usize,
}

impl CycleSummary {
    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Delivered => self.delivered += 1,
            DispatchOutcome::WeatherFailed(_) => self.weather_failed += 1,
            DispatchOutcome::Failed(e) if e.is_unsubscribed() => self.unsubscribed += 1,
            DispatchOutcome::Failed(_) => self.delivery_failed += 1,
        }
    }

    pub fn failed(&self) -> usize {
        self.weather_failed + self.delivery_failed
    }
}

/// Runs every due subscription of a cycle with at most `concurrency` in flight.
#[derive(Clone)]
pub struct Dispatcher {
    ctx: DispatchContext,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(ctx: DispatchContext, concurrency: usize) -> Self {
        Self {
            ctx,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Dispatch all `subscriptions` and wait for every one of them to finish.
    ///
    /// A fresh [`WeatherCache`] is created for the call and dropped with it.
    pub async fn dispatch(&self, subscriptions: Vec<Subscription>) -> CycleSummary {
        let cache = Arc::new(WeatherCache::new());
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut summary = CycleSummary {
            due: subscriptions.len(),
            ..Default::default()
        };

        // Ids whose task has not reported back yet. Whatever is left after the
        // barrier belongs to tasks that panicked.
        let mut pending: HashSet<i64> = subscriptions.iter().map(|s| s.id).collect();

        let mut tasks = JoinSet::new();
        for subscription in subscriptions {
            let ctx = self.ctx.clone();
            let cache = Arc::clone(&cache);
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                // Held until the task ends, whatever the outcome. The semaphore is
                // never closed, so acquisition only waits.
                let _permit = permits.acquire_owned().await;
                let outcome = worker::dispatch(&ctx, &cache, &subscription).await;
                (subscription, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok((subscription, outcome)) => {
                    pending.remove(&subscription.id);
                    log_outcome(&subscription, &outcome);
                    outcome
                }
                Err(e) => DispatchOutcome::Failed(DispatchError::Aborted(e.to_string())),
            };
            summary.record(&outcome);
        }

        for subscription_id in pending {
            tracing::error!(
                subscription_id,
                "Dispatch task did not complete, will retry next cycle"
            );
        }

        tracing::debug!(cached_cities = cache.len(), "Dispatch barrier reached");
        summary
    }
}

fn log_outcome(subscription: &Subscription, outcome: &DispatchOutcome) {
    match outcome {
        DispatchOutcome::Delivered => {
            tracing::debug!(
                subscription_id = subscription.id,
                city = %subscription.city,
                "Notification delivered"
            );
        }
        DispatchOutcome::WeatherFailed(e) => {
            tracing::warn!(
                subscription_id = subscription.id,
                city = %subscription.city,
                error = %e,
                "Failed to get weather, will retry next cycle"
            );
        }
        DispatchOutcome::Failed(e) if e.is_unsubscribed() => {
            tracing::debug!(
                subscription_id = subscription.id,
                "Subscription removed before it could be notified"
            );
        }
        DispatchOutcome::Failed(e) => {
            tracing::error!(
                subscription_id = subscription.id,
                city = %subscription.city,
                error = %e,
                "Failed to process notification, will retry next cycle"
            );
        }
    }
}
