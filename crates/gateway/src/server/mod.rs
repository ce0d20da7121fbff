//! Axum HTTP server, routing, and middleware.
//!
//! # Responsibilities
//! - Define the Axum router with all routes and shared middleware.
//! - Dispatch `/api/{table}[/{id}]` to integrations, tenant routes, or generic CRUD.
//! - Inject the shared runtime context (`AppState`) into handlers.

pub mod dispatch;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
