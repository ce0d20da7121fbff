//! Axum request handlers for all service endpoints.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::HealthResponse;
use tracing::debug;

use super::dispatch::{dispatch, ApiRequest};
use super::state::AppState;
use crate::error::ApiError;

/// `/api/{table}`: any method.
pub async fn collection(
    State(state): State<AppState>,
    method: Method,
    Path(table): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    debug!(%method, table, "api request");
    let req = ApiRequest {
        method: &method,
        table: &table,
        id: None,
        headers: &headers,
        body: &body,
    };
    dispatch(&state, req).await.into_response()
}

/// `/api/{table}/{id}`: any method.
pub async fn member(
    State(state): State<AppState>,
    method: Method,
    Path((table, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    debug!(%method, table, id, "api request");
    let req = ApiRequest {
        method: &method,
        table: &table,
        id: Some(&id),
        headers: &headers,
        body: &body,
    };
    dispatch(&state, req).await.into_response()
}

/// `GET /health`: readiness.
///
/// Returns `200 OK` when the registry holds at least one table and
/// `503 Service Unavailable` otherwise. The key and the pool are lazy, so their
/// readiness is reported but does not affect the status.
pub async fn health(State(state): State<AppState>) -> Response {
    let tables_registered = state.registry.len();
    let (status_code, status) = if tables_registered > 0 {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status: status.into(),
        key_ready: state.key_store.is_ready(),
        pool_ready: state.database.is_ready(),
        tables_registered,
    };
    (status_code, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> ApiError {
    ApiError::not_found("the requested resource does not exist")
}
