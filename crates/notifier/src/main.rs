//! Weather notifier binary entrypoint.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use weather_common::config::AppConfig;
use weather_common::db;
use weather_notifier::clock::SystemClock;
use weather_notifier::mailer::LogNotifier;
use weather_notifier::scheduler::{Scheduler, SchedulerConfig};
use weather_notifier::store::PgSubscriptionStore;
use weather_notifier::weather::StaticWeatherProvider;
use weather_notifier::worker::DispatchContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_notifier=info,weather_common=info".into()),
        )
        .json()
        .init();

    tracing::info!("Weather notifier starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let ctx = DispatchContext::new(
        Arc::new(PgSubscriptionStore::new(pool.clone())),
        Arc::new(StaticWeatherProvider::default()),
        Arc::new(LogNotifier),
        Arc::new(SystemClock),
    );
    let scheduler = Scheduler::new(
        ctx,
        SchedulerConfig {
            interval: config.notifier_interval(),
            concurrency: config.notifier_parallelism,
        },
    );

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    shutdown_signal().await;
    tracing::info!("Received shutdown signal, letting the current cycle finish...");
    cancel.cancel();

    if let Err(e) = handle.await {
        tracing::error!(error = %e, "Scheduler task exited abnormally");
    }

    if tokio::time::timeout(config.shutdown_grace(), pool.close())
        .await
        .is_err()
    {
        tracing::warn!(
            grace_ms = config.shutdown_grace_ms,
            "Database pool did not close within grace period"
        );
    }

    tracing::info!("Weather notifier stopped.");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
