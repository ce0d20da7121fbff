//! Common error types shared across crates.

use thiserror::Error;

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::NotFound`] → 404
/// - [`ServiceError::MethodNotAllowed`] → 405
/// - [`ServiceError::NotImplemented`] → 501
/// - [`ServiceError::Configuration`], [`ServiceError::Database`],
///   [`ServiceError::Internal`] → 500
///
/// Callers only ever see the status code and the `Display` text; there are no
/// machine-readable error codes on the wire.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed: invalid JSON, unknown table or column, bad id.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No route or integration action matches the request.
    #[error("not found: {0}")]
    NotFound(String),

    /// The HTTP method is not supported for this resource.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The integration namespace exists but is not configured in this deployment.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// A secret or configuration value is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The database rejected the statement or could not be reached.
    #[error("database error: {0}")]
    Database(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::NotFound(_) => 404,
            ServiceError::MethodNotAllowed => 405,
            ServiceError::NotImplemented(_) => 501,
            ServiceError::Configuration(_) => 500,
            ServiceError::Database(_) => 500,
            ServiceError::Internal(_) => 500,
        }
    }
}
