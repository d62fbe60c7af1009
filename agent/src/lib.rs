//! Outbox Agent - on-device daemon around the outbox engine.
//!
//! Captures changes over a local HTTP surface while the remote data service is
//! unreachable, persists them in SQLite (or a JSON snapshot), and replays them
//! against the remote REST API on a timer or on demand.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod remote;
pub mod routes;
pub mod scheduler;
pub mod websocket;

use crate::config::{Config, StoreBackend};
use crate::remote::HttpRemote;
use axum::Router;
use outbox_engine::{CollectionApplier, Engine, FileStore, LocalStore};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Engine,
    pub config: Arc<Config>,
}

/// Build the router with tracing and CORS layers.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}

/// Open the configured local store.
pub async fn open_store(backend: &StoreBackend) -> Result<Arc<dyn LocalStore>, sqlx::Error> {
    match backend {
        StoreBackend::Sqlite(url) => {
            let pool = db::create_pool(url).await?;
            Ok(Arc::new(db::SqliteStore::new(pool)))
        }
        StoreBackend::Snapshot(path) => Ok(Arc::new(FileStore::new(path.clone()))),
    }
}

/// Wire store, HTTP transport and engine together, opening the store eagerly.
pub async fn build_engine(config: &Config) -> Result<Engine, Box<dyn std::error::Error>> {
    let store = open_store(&config.store).await?;
    let remote = HttpRemote::new(config.remote_url.clone(), config.remote_token.clone())?;
    let engine = Engine::with_config(
        store,
        Arc::new(CollectionApplier::new(remote)),
        config.engine.clone(),
    );
    engine.open().await?;
    Ok(engine)
}
