use thiserror::Error;

/// Errors raised by a subscription store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The row disappeared, usually because the user unsubscribed mid-cycle.
    #[error("Subscription {0} not found")]
    SubscriptionNotFound(i64),
}

/// Errors raised by a weather provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    #[error("City not found: {0}")]
    CityNotFound(String),

    #[error("Weather transport error: {0}")]
    Transport(String),
}

/// Errors raised while handing a notification to the delivery channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Delivery failed: {0}")]
    Failed(String),
}
