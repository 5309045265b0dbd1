//! Polling scheduler.
//!
//! Ticks on a fixed interval (the first cycle starts immediately), queries the
//! store for due subscriptions and runs them through the [`Dispatcher`]. Cycles
//! never overlap, and cancellation is only observed between cycles: a cycle that
//! has started always runs to its barrier.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use weather_common::error::StoreError;

use crate::clock::Clock;
use crate::dispatcher::{CycleSummary, DEFAULT_CONCURRENCY, Dispatcher};
use crate::store::SubscriptionStore;
use crate::worker::DispatchContext;

/// Default time between cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Querying,
    Dispatching,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

pub struct Scheduler {
    store: Arc<dyn SubscriptionStore>,
    clock: Arc<dyn Clock>,
    dispatcher: Dispatcher,
    interval: Duration,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(ctx: DispatchContext, config: SchedulerConfig) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            store: Arc::clone(&ctx.store),
            clock: Arc::clone(&ctx.clock),
            dispatcher: Dispatcher::new(ctx, config.concurrency),
            // `tokio::time::interval` panics on a zero period.
            interval: config.interval.max(Duration::from_millis(1)),
            state,
        }
    }

    /// Watch the scheduler move between states.
    pub fn state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Run cycles until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            concurrency = self.dispatcher.concurrency(),
            "Notification scheduler started"
        );

        loop {
            // Cancellation wins over a tick that is already due.
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.run_cycle().await {
                tracing::error!(
                    error = %e,
                    "Failed to select subscriptions to notify, retrying next tick"
                );
            }
        }

        self.state.send_replace(SchedulerState::Stopped);
        tracing::info!("Notification scheduler stopped");
    }

    /// Run one query + dispatch cycle.
    ///
    /// Returns `Err` only when the due query itself fails, in which case nothing
    /// was dispatched.
    pub async fn run_cycle(&self) -> Result<CycleSummary, StoreError> {
        let cycle_id = Uuid::new_v4();

        self.state.send_replace(SchedulerState::Querying);
        let due = match self.store.select_due(self.clock.now()).await {
            Ok(due) => due,
            Err(e) => {
                self.state.send_replace(SchedulerState::Idle);
                return Err(e);
            }
        };

        if due.is_empty() {
            tracing::info!(cycle_id = %cycle_id, "No subscriptions to notify, sleeping...");
            self.state.send_replace(SchedulerState::Idle);
            return Ok(CycleSummary::default());
        }

        tracing::info!(cycle_id = %cycle_id, due = due.len(), "Processing due notifications");
        self.state.send_replace(SchedulerState::Dispatching);
        let summary = self.dispatcher.dispatch(due).await;
        self.state.send_replace(SchedulerState::Idle);

        tracing::info!(
            cycle_id = %cycle_id,
            due = summary.due,
            delivered = summary.delivered,
            weather_failed = summary.weather_failed,
            delivery_failed = summary.delivery_failed,
            unsubscribed = summary.unsubscribed,
            "Notification cycle complete"
        );
        Ok(summary)
    }
}
