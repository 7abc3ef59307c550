//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, verifies the signature and
//! expiry, and injects [`CurrentUser`] into request extensions for
//! downstream handlers. `require_admin` layers on top for the user
//! management routes.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CurrentUser};
use crate::models::Role;

/// Require a valid bearer token.
///
/// Accesses `ApiContext` from request extensions (injected by the
/// Extension layer). On success, injects `CurrentUser`.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    let claims = ctx
        .auth
        .verify_token(&token)
        .map_err(|_| ApiError::Unauthorized)?;

    let id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthorized)?;

    req.extensions_mut().insert(CurrentUser {
        id,
        username: claims.username,
        role: claims.role,
    });

    Ok(next.run(req).await)
}

/// Require the authenticated user to hold the admin role.
/// Must run inside `require_auth`, which injects `CurrentUser`.
pub async fn require_admin(req: Request<axum::body::Body>, next: Next) -> Response {
    match req.extensions().get::<CurrentUser>() {
        Some(user) if user.role == Role::Admin => next.run(req).await,
        Some(user) => {
            tracing::warn!(username = %user.username, "Non-admin attempted admin operation");
            ApiError::Forbidden.into_response()
        }
        None => ApiError::Unauthorized.into_response(),
    }
}
