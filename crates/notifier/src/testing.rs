//! Fakes shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Semaphore;

use weather_common::error::{DeliveryError, StoreError, WeatherError};
use weather_common::types::{NotificationEmail, Subscription, WeatherSnapshot};

use crate::clock::Clock;
use crate::mailer::Notifier;
use crate::store::{InMemorySubscriptionStore, NotifyTransaction, SubscriptionStore};
use crate::weather::WeatherProvider;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Weather provider with per-city failures, an optional delay, an optional gate
/// that holds selected cities until released, and call accounting.
pub struct ScriptedWeather {
    delay: Option<Duration>,
    failing: Mutex<HashSet<String>>,
    gated: Mutex<HashSet<String>>,
    gate: Semaphore,
    calls: AtomicUsize,
    calls_by_city: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedWeather {
    pub fn new() -> Self {
        Self {
            delay: None,
            failing: Mutex::new(HashSet::new()),
            gated: Mutex::new(HashSet::new()),
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
            calls_by_city: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn snapshot_for(city: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            temperature: city.len() as f64,
            humidity: 55,
            condition: format!("Cloudy in {}", city),
        }
    }

    pub fn fail_city(&self, city: &str) {
        self.failing.lock().unwrap().insert(city.to_string());
    }

    /// Hold calls for `city` until [`release_gate`](Self::release_gate).
    pub fn gate_city(&self, city: &str) {
        self.gated.lock().unwrap().insert(city.to_string());
    }

    pub fn release_gate(&self) {
        self.gate.close();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, city: &str) -> usize {
        self.calls_by_city
            .lock()
            .unwrap()
            .get(city)
            .copied()
            .unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for ScriptedWeather {
    async fn current(&self, city: &str) -> Result<WeatherSnapshot, WeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls_by_city
            .lock()
            .unwrap()
            .entry(city.to_string())
            .or_insert(0) += 1;

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let gated = self.gated.lock().unwrap().contains(city);
        if gated {
            // Closed semaphore releases every waiter.
            let _ = self.gate.acquire().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(city) {
            return Err(WeatherError::CityNotFound(city.to_string()));
        }
        Ok(Self::snapshot_for(city))
    }
}

pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, NotificationEmail)>>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            panicking: Mutex::new(HashSet::new()),
        }
    }

    /// Make sends to `address` panic inside the worker task.
    pub fn panic_on(&self, address: &str) {
        self.panicking.lock().unwrap().insert(address.to_string());
    }

    pub fn fail_address(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub fn sent(&self) -> Vec<(String, NotificationEmail)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_notification(
        &self,
        to: &str,
        email: &NotificationEmail,
    ) -> Result<(), DeliveryError> {
        let panicking = self.panicking.lock().unwrap().contains(to);
        if panicking {
            panic!("notifier blew up for {}", to);
        }
        if self.failing.lock().unwrap().contains(to) {
            return Err(DeliveryError::Failed(format!("mailbox {} rejected", to)));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), email.clone()));
        Ok(())
    }
}

/// In-memory store whose `select_due` can be made to fail a number of times, and
/// whose transactions can be made to fail on update or commit for chosen ids.
pub struct FlakyStore {
    inner: InMemorySubscriptionStore,
    failures_left: AtomicUsize,
    select_calls: AtomicUsize,
    broken_updates: Mutex<HashSet<i64>>,
    broken_commits: Mutex<HashSet<i64>>,
}

impl FlakyStore {
    pub fn new(inner: InMemorySubscriptionStore, failures: usize) -> Self {
        Self {
            inner,
            failures_left: AtomicUsize::new(failures),
            select_calls: AtomicUsize::new(0),
            broken_updates: Mutex::new(HashSet::new()),
            broken_commits: Mutex::new(HashSet::new()),
        }
    }

    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    pub fn break_update(&self, id: i64) {
        self.broken_updates.lock().unwrap().insert(id);
    }

    pub fn break_commit(&self, id: i64) {
        self.broken_commits.lock().unwrap().insert(id);
    }
}

fn lost_connection() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl SubscriptionStore for FlakyStore {
    async fn select_due(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, StoreError> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(lost_connection());
        }
        self.inner.select_due(now).await
    }

    async fn begin(&self) -> Result<Box<dyn NotifyTransaction>, StoreError> {
        Ok(Box::new(FlakyTransaction {
            inner: self.inner.begin().await?,
            broken_updates: self.broken_updates.lock().unwrap().clone(),
            broken_commits: self.broken_commits.lock().unwrap().clone(),
            staged: Vec::new(),
        }))
    }
}

struct FlakyTransaction {
    inner: Box<dyn NotifyTransaction>,
    broken_updates: HashSet<i64>,
    broken_commits: HashSet<i64>,
    staged: Vec<i64>,
}

#[async_trait]
impl NotifyTransaction for FlakyTransaction {
    async fn mark_notified(&mut self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        if self.broken_updates.contains(&id) {
            return Err(lost_connection());
        }
        self.inner.mark_notified(id, at).await?;
        self.staged.push(id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        if this.staged.iter().any(|id| this.broken_commits.contains(id)) {
            // `inner` is dropped uncommitted.
            return Err(lost_connection());
        }
        this.inner.commit().await
    }
}

/// Poll `condition` until it holds, panicking after a generous timeout.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
