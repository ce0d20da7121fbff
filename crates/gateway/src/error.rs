//! HTTP rendering of [`ServiceError`] and conversions from module errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{protocol::ErrorResponse, ServiceError};
use tracing::{error, warn};

use crate::crypto::CipherError;
use crate::db::{DbError, StatementError};
use crate::integrations::IntegrationError;
use crate::keystore::KeyError;
use crate::secrets::SecretError;

/// Error returned by every request path; renders as `{"error": "<message>"}`.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(ServiceError::BadRequest(msg.into()))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(ServiceError::NotFound(msg.into()))
    }

    pub fn method_not_allowed() -> Self {
        Self(ServiceError::MethodNotAllowed)
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "request rejected");
        }
        (status, Json(ErrorResponse::new(self.0.to_string()))).into_response()
    }
}

impl From<StatementError> for ApiError {
    fn from(e: StatementError) -> Self {
        Self(ServiceError::BadRequest(e.to_string()))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        Self(ServiceError::Database(e.to_string()))
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Secret(e) => e.into(),
            DbError::Connect(_) => Self(ServiceError::Database(e.to_string())),
            DbError::Query(e) => e.into(),
        }
    }
}

impl From<SecretError> for ApiError {
    fn from(e: SecretError) -> Self {
        Self(ServiceError::Configuration(e.to_string()))
    }
}

impl From<KeyError> for ApiError {
    fn from(e: KeyError) -> Self {
        Self(ServiceError::Configuration(e.to_string()))
    }
}

impl From<CipherError> for ApiError {
    fn from(e: CipherError) -> Self {
        Self(ServiceError::Internal(e.to_string()))
    }
}

impl From<IntegrationError> for ApiError {
    fn from(e: IntegrationError) -> Self {
        match e {
            IntegrationError::NotConfigured(_) | IntegrationError::NotImplemented { .. } => {
                Self(ServiceError::NotImplemented(e.to_string()))
            }
            IntegrationError::UnknownAction { .. } => Self(ServiceError::NotFound(e.to_string())),
            IntegrationError::MethodNotAllowed => Self(ServiceError::MethodNotAllowed),
            IntegrationError::Signature(_) | IntegrationError::Payload(_) => {
                Self(ServiceError::BadRequest(e.to_string()))
            }
            IntegrationError::Statement(e) => e.into(),
            IntegrationError::Database(e) => e.into(),
            IntegrationError::Unregistered(_) => Self(ServiceError::Configuration(e.to_string())),
        }
    }
}
