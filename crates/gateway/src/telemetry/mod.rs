//! Structured logging, plus OTLP span export when an endpoint is configured.
//!
//! # Telemetry invariants
//!
//! - **No PII, key material or secret values** in any span attribute or log
//!   field. Row contents are never logged; ids and table names are.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence when set.

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};
