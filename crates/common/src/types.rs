use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How often a subscriber wants a weather update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Hourly,
    Daily,
}

impl Frequency {
    /// Minimum time between two notifications for this frequency.
    pub fn interval(self) -> Duration {
        match self {
            Frequency::Hourly => Duration::hours(1),
            Frequency::Daily => Duration::hours(24),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frequency::Hourly => write!(f, "hourly"),
            Frequency::Daily => write!(f, "daily"),
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(Frequency::Hourly),
            "daily" => Ok(Frequency::Daily),
            other => Err(format!("unknown frequency '{}'", other)),
        }
    }
}

/// A user's weather subscription, as stored in the `subscriptions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: i64,
    pub email: String,
    /// Cache key for weather lookups; compared case-sensitively.
    pub city: String,
    pub frequency: Frequency,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
    /// `None` until the first successful delivery.
    pub last_notified_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Whether this subscription should receive a notification at `now`.
    ///
    /// Only confirmed subscriptions are ever due. A subscription that was never
    /// notified is due immediately; otherwise it becomes due once a full interval
    /// has elapsed (the boundary itself counts as due).
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.confirmed {
            return false;
        }
        match self.last_notified_at {
            None => true,
            Some(last) => now - last >= self.frequency.interval(),
        }
    }
}

/// Current weather conditions for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: u8,
    /// Free-text condition, e.g. "Partly cloudy"
    pub condition: String,
}

/// Contents of a periodic weather notification email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEmail {
    pub city: String,
    pub temperature: f64,
    pub description: String,
    pub humidity: u8,
    pub frequency: Frequency,
}

impl NotificationEmail {
    pub const SUBJECT: &'static str = "Weather App - Weather Notification";

    pub fn new(subscription: &Subscription, weather: &WeatherSnapshot) -> Self {
        Self {
            city: subscription.city.clone(),
            temperature: weather.temperature,
            description: weather.condition.clone(),
            humidity: weather.humidity,
            frequency: subscription.frequency,
        }
    }
}
