//! Doorstep Orders HTTP service

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doorstep_orders::api::{router, AppState};
use doorstep_orders::bus::EventBus;
use doorstep_orders::catalog::{ChangeSource, PRODUCTS_CHANGED_SUBJECT};
use doorstep_orders::config::AppConfig;
use doorstep_orders::notify::{EmailSender, HttpEmailSender, LogEmailSender};
use doorstep_orders::store::{MemoryStore, PgStore, RecordStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = AppConfig::from_env()?;

    let store: Arc<dyn RecordStore> = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(10).connect(url).await.context("connecting to postgres")?;
            sqlx::migrate!("./migrations").run(&db).await?;
            Arc::new(PgStore::new(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, falling back to polling");
                None
            }
        },
        None => None,
    };

    let sender: Arc<dyn EmailSender> = match config.email.clone() {
        Some(email) => Arc::new(HttpEmailSender::new(email)?),
        None => {
            tracing::warn!("Email delivery not configured, notifications are logged only");
            Arc::new(LogEmailSender)
        }
    };

    let state = AppState::new(store, sender, EventBus::new(nats.clone()), &config);
    if let Err(e) = state.catalog.refresh().await {
        tracing::warn!(error = %e, "Initial catalog load failed");
    }
    let source = match &nats {
        Some(client) => ChangeSource::Nats(client.subscribe(PRODUCTS_CHANGED_SUBJECT.to_string()).await?),
        None => ChangeSource::Poll(config.catalog_poll),
    };
    state.catalog.clone().spawn_feed(source);
    state.sessions.clone().spawn_sweeper(config.session_sweep());

    let addr = config.socket_addr();
    tracing::info!("🚀 Doorstep Orders listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, router(state)).await?;
    Ok(())
}
