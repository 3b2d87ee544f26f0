use std::sync::Arc;
use tracing::info;

mod bus;
mod chat;
mod config;
mod provider;
mod report;
mod scoring;
mod server;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        // It's not fatal if .env doesn't exist, but good to know
        info!("No .env file found or failed to load: {}", e);
    }

    // Initialize logging with default filter if RUST_LOG is not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Pulsecheck daemon starting...");

    let settings = config::Settings::from_env();
    info!(
        "Thresholds: detractor <= {}, promoter >= {}",
        settings.thresholds.detractor, settings.thresholds.promoter
    );

    info!("Initializing store at {}", settings.db_path.display());
    let store = store::Store::new(&settings.db_path).await?;
    store.init().await?;

    let bus = Arc::new(bus::EventBus::new());

    let state = Arc::new(server::build_state(&settings, store, bus));
    let app = server::router(state);

    info!("Starting HTTP server on port {}", settings.port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", settings.port)).await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        res = axum::serve(listener, app) => {
            if let Err(e) = res {
                info!("Server stopped with error: {}", e);
            }
        }
    }

    Ok(())
}
