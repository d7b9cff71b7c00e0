mod config;
mod errors;
mod fields;
mod journal;
mod metrics;
mod routes;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, CONFIG_PATH};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::RecordStore;

// One operator, one writer: requests are served on a single thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Configuration errors are fatal before anything else starts
    let config = Config::load(CONFIG_PATH)?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.app.log_level))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting wellness journal v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Loaded {} blocks with {} fields from {CONFIG_PATH}",
        config.registry.blocks().len(),
        config.registry.field_count()
    );
    for block in config.registry.blocks() {
        let kinds: Vec<_> = block
            .fields
            .iter()
            .map(|f| format!("{}:{}", f.name, f.kind.type_name()))
            .collect();
        debug!("Block '{}': {}", block.id, kinds.join(", "));
    }

    let store = RecordStore::new(&config.app.data_file);
    info!("Journal table: {}", store.path().display());

    let addr: SocketAddr = format!("127.0.0.1:{}", config.app.port).parse()?;
    let state = AppState {
        config: Arc::new(config),
        store,
    };

    if let Some(origin) = &state.config.app.allowed_origin {
        info!("Cross-origin requests allowed from {origin}");
    }
    let app = build_router(state).layer(TraceLayer::new_for_http());

    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
