use std::sync::Arc;

use anyhow::{Context, Result};
use sendiz_chats::{ChatEngine, ConnectionHub};
use sendiz_config::AppConfig;
use sendiz_database::{initialize_database, SqliteStore};
use sqlx::SqlitePool;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::TRACE)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Everything the transports need, wired from one configuration.
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub hub: ConnectionHub,
    pub engine: ChatEngine,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let mut delivery = config.delivery.clone();
        delivery.normalise();

        let hub = ConnectionHub::new();
        let engine = ChatEngine::new(
            Arc::new(SqliteStore::new(db_pool.clone())),
            hub.clone(),
            delivery,
        );

        info!(
            queue_capacity = engine.settings().outbound_queue_capacity,
            hydration_concurrency = engine.settings().hydration_concurrency,
            "chat engine ready"
        );

        Ok(Self {
            db_pool,
            hub,
            engine,
        })
    }

    /// Close every live session. Returns how many were open.
    pub async fn shutdown(&self) -> usize {
        let closed = self.hub.shutdown().await;
        info!(sessions = closed, "live sessions closed");
        closed
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
