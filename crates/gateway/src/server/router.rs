//! Axum router construction.

use axum::{
    routing::{any, get},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, middleware, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/:table", any(handlers::collection))
        .route("/api/:table/:id", any(handlers::member))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(middleware::REQUEST_TIMEOUT))
        .layer(middleware::cors())
        .layer(middleware::allow_origin())
        .layer(middleware::allow_methods())
        .layer(middleware::allow_headers())
        .with_state(state)
}
