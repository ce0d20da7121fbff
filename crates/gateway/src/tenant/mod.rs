//! Tenant lifecycle: provisioning a daycare and deciding its subscription access.

pub mod access;
pub mod provision;

pub use access::{check, evaluate};
pub use provision::provision;

/// Table holding one row per tenant.
pub const DAYCARES: &str = "daycares";
