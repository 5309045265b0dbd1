//! Periodic weather notification dispatch.
//!
//! A [`scheduler::Scheduler`] wakes on a fixed interval, asks the
//! [`store::SubscriptionStore`] for due subscriptions and hands them to a
//! [`dispatcher::Dispatcher`], which runs one [`worker`] per subscription under a
//! concurrency cap. Weather lookups within a cycle go through a per-cycle
//! [`cache::WeatherCache`].

pub mod cache;
pub mod clock;
pub mod dispatcher;
pub mod mailer;
pub mod scheduler;
pub mod store;
pub mod weather;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;
