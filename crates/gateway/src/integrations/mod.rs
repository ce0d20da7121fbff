//! Side-integration namespaces under `/api/{namespace}/{action}`.
//!
//! Each handler answers with an [`IntegrationResponse`] and touches only the
//! tenant rows it names explicitly. Integrations never go through the generic
//! table dispatch.

pub mod quickbooks;
pub mod stripe;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use thiserror::Error;

use crate::db::{DbError, StatementError};

pub use stripe::SignatureError;

/// `{status_code, headers, body}` returned by an integration handler.
#[derive(Debug)]
pub struct IntegrationResponse {
    pub status_code: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl IntegrationResponse {
    pub fn json(status_code: StatusCode, body: Value) -> Self {
        Self {
            status_code,
            headers: HeaderMap::new(),
            body,
        }
    }
}

impl IntoResponse for IntegrationResponse {
    fn into_response(self) -> Response {
        (self.status_code, self.headers, Json(self.body)).into_response()
    }
}

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("{0} integration is not configured")]
    NotConfigured(&'static str),

    #[error("{namespace}/{action} is not available in this deployment")]
    NotImplemented {
        namespace: &'static str,
        action: String,
    },

    #[error("unknown {namespace} action: {action}")]
    UnknownAction {
        namespace: &'static str,
        action: String,
    },

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("invalid webhook signature: {0}")]
    Signature(#[from] SignatureError),

    #[error("invalid webhook payload: {0}")]
    Payload(String),

    #[error("table {0} is not registered")]
    Unregistered(&'static str),

    #[error(transparent)]
    Statement(#[from] StatementError),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<sqlx::Error> for IntegrationError {
    fn from(e: sqlx::Error) -> Self {
        IntegrationError::Database(DbError::Query(e))
    }
}
