use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

mod app;
mod http;
mod ws;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearth_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("HEARTH_CONFIG").unwrap_or_else(|_| "hearth.toml".to_string());
    let config = hearth_core::config::HearthConfig::load(&config_path).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({e}), using defaults");
        figment::Figment::new().extract().expect("default config always extracts")
    });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let state = app::AppState::new(config)?;
    let router = app::build_router(state.clone());

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("hearth gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

/// Waits for Ctrl+C, then stops the scheduler engine's tick loop before
/// axum finishes draining in-flight connections.
async fn shutdown_signal(state: Arc<app::AppState>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    state.stop_scheduler();
}
