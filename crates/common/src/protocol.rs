//! Request and response types exchanged between the gateway and its callers.
//!
//! Resource rows themselves are schema-free JSON objects and travel as
//! [`serde_json::Value`]; only the fixed-shape bodies live here.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
///
/// There is deliberately no error code: callers distinguish failures by HTTP
/// status and, where they need more, by matching on the message text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable description, including the underlying cause.
    pub error: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a message.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether the encryption key has been fetched and cached.
    pub key_ready: bool,
    /// Whether the database pool has been built.
    pub pool_ready: bool,
    /// Number of tables currently in the registry.
    pub tables_registered: usize,
}

// ---------------------------------------------------------------------------
// Tenant provisioning
// ---------------------------------------------------------------------------

/// Request body for `POST /api/provision`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// Column values for the new `daycares` row. `daycare_code` is generated
    /// when absent.
    pub daycare: serde_json::Map<String, serde_json::Value>,
    /// Initial password for the default admin account. A random one is
    /// generated (and returned once) when absent.
    #[serde(default)]
    pub admin_password: Option<String>,
}

/// Response body for `POST /api/provision`: the three rows created together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionResponse {
    pub daycare: serde_json::Value,
    pub admin_user: serde_json::Value,
    pub company_info: serde_json::Value,
    /// Present only when the admin password was generated by the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_password: Option<String>,
}

// ---------------------------------------------------------------------------
// Subscription access
// ---------------------------------------------------------------------------

/// How a daycare's subscription columns were interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessState {
    /// `subscription_status = 'active'`.
    Active,
    /// On trial with days remaining.
    Trial,
    /// On trial but the end date has passed.
    TrialExpired,
    /// `subscription_status = 'expired'`.
    Expired,
    /// The row predates the subscription columns entirely.
    Grandfathered,
    /// The columns exist but hold no usable value.
    Misconfigured,
}

/// Response body for `GET /api/access/{daycare_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessResponse {
    pub daycare_id: String,
    pub state: AccessState,
    pub allowed: bool,
    /// Whole days left on a trial; `None` when not on a dated trial.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_ends_at: Option<String>,
}
