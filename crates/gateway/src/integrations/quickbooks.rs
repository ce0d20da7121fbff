//! `/api/qbo/{action}`: QuickBooks Online OAuth and sync.
//!
//! The OAuth flow and the sync jobs are not part of this service; every known
//! action reports that, and anything else is a 404.

use super::{IntegrationError, IntegrationResponse};

pub const NAMESPACE: &str = "qbo";

/// Actions the web client calls.
const ACTIONS: &[&str] = &["status", "auth-url", "callback", "disconnect", "sync", "import"];

pub async fn handle(action: &str) -> Result<IntegrationResponse, IntegrationError> {
    if ACTIONS.contains(&action) {
        Err(IntegrationError::NotImplemented {
            namespace: NAMESPACE,
            action: action.to_owned(),
        })
    } else {
        Err(IntegrationError::UnknownAction {
            namespace: NAMESPACE,
            action: action.to_owned(),
        })
    }
}
