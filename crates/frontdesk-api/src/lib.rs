//! Frontdesk API crate - axum HTTP server, staff routes, WebSocket transport.
//!
//! Serves the visitor and staff REST endpoints, the real-time `/ws` channel
//! that feeds the gateway, and health checks.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
