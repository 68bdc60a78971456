//! ==============================================================================
//! main.rs - sensor table host entry point
//! ==============================================================================
//!
//! purpose:
//!     serves a single page showing a static dataset of sensor readings as a
//!     filterable, sortable, paginated table.
//!
//! responsibilities:
//!     - load host.toml (or defaults) and set up tracing
//!     - build the load-once readings provider over the dataset file
//!     - preload the dataset so a bad file stops the host at startup
//!     - serve the dashboard, json api and live view sessions
//!
//! relationships:
//!     - uses: config.rs (host.toml), provider.rs (dataset), server.rs (routes)
//!     - reads: data/sensor_readings.json (path from config)
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                      host (this file)                         │
//!     │                                                              │
//!     │   sensor_readings.json ──► provider (load once, Arc<[..]>)    │
//!     │                                   │                          │
//!     │              ┌────────────────────┼───────────────────┐      │
//!     │              ▼                    ▼                   ▼      │
//!     │        GET / (page)     GET /api/readings      GET /ws       │
//!     │              │                    │          (TableView +    │
//!     │              └──── filter ► sort ► page ◄──  debounced input)│
//!     └──────────────────────────────────────────────────────────────┘
//!
//! ==============================================================================

mod config;
mod debounce;
mod domain;
mod error;
mod provider;
mod server;
mod table;
mod view;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::provider::{FileSource, SensorReadingsProvider};
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration (optional explicit path as first argument)
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let bootstrap = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || {
        config::HostConfig::load_or_default(config_path.as_deref())
    })?;

    // step 2: logging, RUST_LOG wins over the configured level
    init_tracing(&config.logging.level);
    tracing::info!("sensor table host v{}", env!("CARGO_PKG_VERSION"));
    config.log_summary();

    // step 3: dataset provider
    let provider = SensorReadingsProvider::new(FileSource::new(&config.data.path));
    if config.data.preload {
        let readings = provider
            .get()
            .await
            .with_context(|| format!("failed to load {}", config.data.path.display()))?;
        tracing::info!(count = readings.len(), "[STARTUP] dataset ready");
    } else {
        tracing::info!("[STARTUP] dataset will load on first request");
    }

    // step 4: web server
    let addr = config.server.addr()?;
    let app = server::router(AppState::new(provider, config.table.clone()));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("[STARTUP] Dashboard live at http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sensor_table_host={level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
