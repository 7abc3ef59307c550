//! HTTP surface of the service.
//!
//! Routes are nested under `/api/v1`. Patient and attachment endpoints
//! are open; user management requires a bearer token, admin role where
//! marked. The router is composable — `api_router()` returns a `Router`
//! that can be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server, ApiServer};
pub use types::ApiContext;
