//! Per-cycle weather cache.
//!
//! One instance is created for each dispatch cycle and dropped when the cycle
//! ends, so entries are never older than the cycle that fetched them.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use weather_common::types::WeatherSnapshot;

/// Read-through cache of city name → weather, shared by a cycle's workers.
#[derive(Debug, Default)]
pub struct WeatherCache {
    entries: Mutex<HashMap<String, WeatherSnapshot>>,
}

impl WeatherCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, city: &str) -> Option<WeatherSnapshot> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(city)
            .cloned()
    }

    /// Last write wins.
    pub fn set(&self, city: &str, snapshot: WeatherSnapshot) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(city.to_string(), snapshot);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
