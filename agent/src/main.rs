//! Outbox Agent - durable offline capture and replay.
//!
//! Serves the local outbox surface over HTTP and WebSocket and drains queued
//! changes to the remote API on a timer.

use outbox_agent::config::Config;
use outbox_agent::{app, build_engine, scheduler, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "outbox_agent=debug,outbox_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        "Starting Outbox Agent on {}:{} (store: {}, remote: {})",
        config.host,
        config.port,
        config.store.kind(),
        config.remote_url
    );

    // Open the outbox
    let engine = build_engine(&config).await?;
    tracing::info!(pending = engine.status().pending_count, "outbox ready");

    // Periodic drain
    let drain_task = config
        .sync_interval
        .map(|every| scheduler::spawn_periodic_drain(engine.clone(), every, config.retention));

    let state = AppState {
        engine,
        config: Arc::new(config.clone()),
    };

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Agent listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = drain_task {
        task.abort();
    }
    tracing::info!("Agent stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
