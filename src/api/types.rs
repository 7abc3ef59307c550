//! Shared types for the API layer.

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::auth::AuthService;
use crate::config::JwtSettings;
use crate::models::Role;

/// Shared context for all routes and middleware.
///
/// Holds the paths every request needs plus the token service. Each
/// request opens its own database connection via [`ApiContext::connect`];
/// there is no cross-request shared mutable state.
#[derive(Clone)]
pub struct ApiContext {
    pub db_path: Arc<PathBuf>,
    pub uploads_dir: Arc<PathBuf>,
    pub auth: Arc<AuthService>,
}

impl ApiContext {
    pub fn new(db_path: PathBuf, uploads_dir: PathBuf, jwt: JwtSettings) -> Self {
        Self {
            db_path: Arc::new(db_path),
            uploads_dir: Arc::new(uploads_dir),
            auth: Arc::new(AuthService::new(jwt)),
        }
    }

    /// Open this request's database connection.
    pub fn connect(&self) -> Result<Connection, ApiError> {
        crate::db::sqlite::connect(&self.db_path)
            .map_err(|e| ApiError::Internal(format!("database: {e}")))
    }
}

/// Authenticated user context, injected into request extensions by the
/// auth middleware after token verification.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}
