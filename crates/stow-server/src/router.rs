use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use stow_store::StorageBackend;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all Stow endpoints.
///
/// Upload size is enforced by the backend while streaming, so axum's
/// buffered-body limit is disabled.
pub fn build_router(backend: Arc<dyn StorageBackend>) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route(
            "/store/*path",
            get(handler::retrieve_handler).post(handler::store_handler),
        )
        .route("/meta/*path", get(handler::meta_handler))
        .route("/hash/:digest", get(handler::hash_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { backend })
}
