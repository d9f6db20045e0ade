pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod git;
pub mod model;
pub mod provision;
pub mod registry;
pub mod service;
pub mod store;
pub mod validation;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::store::AppState;

/// The full HTTP surface: health check plus the configuration API.
pub fn router(state: AppState) -> Router {
    let max_upload = state.config.max_upload_bytes;
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(api::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(max_upload)),
        )
        .with_state(state)
}
