use chrono::{DateTime, SubsecRound, Utc};

/// Source of "now" for due-interval math and for the timestamp written on delivery.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock, truncated to microseconds so a written timestamp reads back
/// from Postgres unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}
