//! In-process subscription store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use weather_common::error::StoreError;
use weather_common::types::{Frequency, Subscription};

use super::{NotifyTransaction, SubscriptionStore};

#[derive(Debug, Default)]
struct Rows {
    by_id: BTreeMap<i64, Subscription>,
    next_id: i64,
}

/// Subscription store backed by a shared in-memory map.
///
/// Clones share the same rows. Writes made through a transaction become
/// visible only on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionStore {
    rows: Arc<Mutex<Rows>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> MutexGuard<'_, Rows> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an unconfirmed subscription and return its id.
    pub fn subscribe(
        &self,
        email: &str,
        city: &str,
        frequency: Frequency,
        created_at: DateTime<Utc>,
    ) -> i64 {
        let mut rows = self.rows();
        rows.next_id += 1;
        let id = rows.next_id;
        rows.by_id.insert(
            id,
            Subscription {
                id,
                email: email.to_string(),
                city: city.to_string(),
                frequency,
                confirmed: false,
                created_at,
                last_notified_at: None,
            },
        );
        id
    }

    /// Mark a subscription confirmed. Returns false if it does not exist or was
    /// already confirmed.
    pub fn confirm(&self, id: i64) -> bool {
        match self.rows().by_id.get_mut(&id) {
            Some(sub) if !sub.confirmed => {
                sub.confirmed = true;
                true
            }
            _ => false,
        }
    }

    /// Delete a subscription. Returns false if it did not exist.
    pub fn unsubscribe(&self, id: i64) -> bool {
        self.rows().by_id.remove(&id).is_some()
    }

    pub fn get(&self, id: i64) -> Option<Subscription> {
        self.rows().by_id.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn select_due(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, StoreError> {
        Ok(self
            .rows()
            .by_id
            .values()
            .filter(|sub| sub.is_due(now))
            .cloned()
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn NotifyTransaction>, StoreError> {
        Ok(Box::new(InMemoryTransaction {
            store: self.clone(),
            staged: Vec::new(),
        }))
    }
}

struct InMemoryTransaction {
    store: InMemorySubscriptionStore,
    staged: Vec<(i64, DateTime<Utc>)>,
}

#[async_trait]
impl NotifyTransaction for InMemoryTransaction {
    async fn mark_notified(&mut self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        if !self.store.rows().by_id.contains_key(&id) {
            return Err(StoreError::SubscriptionNotFound(id));
        }
        self.staged.push((id, at));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        let mut rows = this.store.rows();
        for (id, at) in this.staged {
            // A row deleted after staging stays deleted.
            if let Some(sub) = rows.by_id.get_mut(&id) {
                sub.last_notified_at = Some(at);
            }
        }
        Ok(())
    }
}
