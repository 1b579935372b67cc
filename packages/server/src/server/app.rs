//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Config;
use crate::kernel::{BasePropertyStore, ServerDeps};
use crate::server::routes::{
    batch_enrich_handler, batch_status_handler, deep_search_handler, enrich_handler,
    health_handler, status_handler, unit_search_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Absent in tests that run against the in-memory store
    pub db_pool: Option<PgPool>,
    pub store: Arc<dyn BasePropertyStore>,
    /// `None` when the required credentials are missing; enrichment routes
    /// answer 503 instead of running partially.
    pub deps: Option<Arc<ServerDeps>>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn BasePropertyStore>,
        deps: Option<ServerDeps>,
        db_pool: Option<PgPool>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            db_pool,
            store,
            deps: deps.map(Arc::new),
        }
    }
}

/// Build the Axum application from configuration.
///
/// Missing credentials do not stop the server: status and health still
/// answer, enrichment routes report "not configured".
pub fn build_app(config: Config, store: Arc<dyn BasePropertyStore>, db_pool: Option<PgPool>) -> Router {
    let deps = match ServerDeps::from_config(&config, store.clone()) {
        Ok(deps) => Some(deps),
        Err(e) => {
            warn!(error = %e, "Enrichment services unavailable");
            None
        }
    };

    router(AppState::new(config, store, deps, db_pool))
}

/// Router over an already-built state
pub fn router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/property/status", get(status_handler))
        .route("/api/property/enrich", post(enrich_handler))
        .route(
            "/api/property/batch-enrich-v2",
            get(batch_status_handler).post(batch_enrich_handler),
        )
        .route("/api/property/deep-search", post(deep_search_handler))
        .route("/api/property/unit-search", post(unit_search_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(state))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
