//! tagsync-server library interface
//!
//! Exposes the service pieces for the binary and for integration tests.

pub mod api;
pub mod auth;
pub mod bulk;
pub mod codec;
pub mod db;
pub mod error;
pub mod extract;
pub mod reconcile;
pub mod sync;
pub mod vendor;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tagsync_common::config::TomlConfig;
use tagsync_common::events::EventBus;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{Authenticator, TokenAuthenticator};
use crate::db::{SqliteTagStore, TagStore};
use crate::reconcile::ReconcileEngine;
use crate::sync::SyncHub;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub store: Arc<dyn TagStore>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub authenticator: Arc<dyn Authenticator>,
    /// Live sync context shared by every socket
    pub hub: Arc<SyncHub>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the SQLite store, token authenticator and sync hub
    pub fn new(db: SqlitePool, config: &TomlConfig) -> Self {
        let store: Arc<dyn TagStore> = Arc::new(SqliteTagStore::new(db.clone()));
        let authenticator: Arc<dyn Authenticator> =
            Arc::new(TokenAuthenticator::new(config.auth.clone(), Some(db.clone())));
        Self::with_parts(db, store, authenticator, config)
    }

    /// Same as [`AppState::new`] with the store and authenticator supplied
    pub fn with_parts(
        db: SqlitePool,
        store: Arc<dyn TagStore>,
        authenticator: Arc<dyn Authenticator>,
        config: &TomlConfig,
    ) -> Self {
        let event_bus = EventBus::new(config.sync.event_capacity);
        let engine = Arc::new(ReconcileEngine::new(store.clone()));
        let hub = Arc::new(SyncHub::new(
            engine,
            authenticator.clone(),
            event_bus.clone(),
            config.sync.clone(),
        ));

        Self {
            db,
            store,
            event_bus,
            authenticator,
            hub,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// `/api/*` sits behind the bearer-token middleware; `/health`, `/events`
/// and `/ws` do not (the socket authenticates itself).
pub fn build_router(state: AppState) -> Router {
    use axum::{middleware, routing::get};

    let protected = Router::new()
        .merge(api::tag_routes())
        .merge(api::bulk_routes())
        .merge(api::vendor_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    Router::new()
        .merge(protected)
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .route("/ws", get(api::sync_socket))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
