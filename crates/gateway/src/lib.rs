//! Daycare resource gateway.
//!
//! One HTTP entry point maps `{method, table, id}` onto a single parameterised
//! Postgres statement against an allow-listed table, sealing the PII columns of
//! `children` with AES-256-GCM on the way in and opening them on the way out.

pub mod aws;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod integrations;
pub mod keystore;
pub mod registry;
pub mod resource;
pub mod secrets;
pub mod server;
pub mod telemetry;
pub mod tenant;

pub use error::ApiError;
pub use server::state::AppState;
