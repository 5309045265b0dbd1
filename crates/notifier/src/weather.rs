//! Weather provider seam.

use async_trait::async_trait;

use weather_common::error::WeatherError;
use weather_common::types::WeatherSnapshot;

/// Capability to fetch current weather for a city.
///
/// Implementations own their own timeouts. The dispatcher trusts the provider's
/// match for the requested city and does not re-check the returned location.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, city: &str) -> Result<WeatherSnapshot, WeatherError>;
}

/// Provider that answers every non-empty city with the same conditions.
///
/// Used when no real weather backend is wired in.
#[derive(Debug, Clone)]
pub struct StaticWeatherProvider {
    snapshot: WeatherSnapshot,
}

impl StaticWeatherProvider {
    pub fn new(snapshot: WeatherSnapshot) -> Self {
        Self { snapshot }
    }
}

impl Default for StaticWeatherProvider {
    fn default() -> Self {
        Self::new(WeatherSnapshot {
            temperature: 20.1,
            humidity: 60,
            condition: "Sunny".to_string(),
        })
    }
}

#[async_trait]
impl WeatherProvider for StaticWeatherProvider {
    async fn current(&self, city: &str) -> Result<WeatherSnapshot, WeatherError> {
        if city.trim().is_empty() {
            return Err(WeatherError::CityNotFound(city.to_string()));
        }
        Ok(self.snapshot.clone())
    }
}
