//! Authentication endpoints: login and initial admin setup.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::auth::{LoginRequest, LoginResponse, RegisterRequest};

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `POST /api/v1/auth/login` — check credentials, return a signed token
/// with the user's profile, or 401.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let conn = ctx.connect()?;
    let response = ctx.auth.login(&conn, &request)?;
    Ok(Json(response))
}

/// `POST /api/v1/auth/create-admin` — create the initial administrator.
/// Open for first setup; duplicates are rejected.
pub async fn create_admin(
    State(ctx): State<ApiContext>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let conn = ctx.connect()?;
    ctx.auth.create_admin(&conn, &request)?;
    Ok(Json(MessageResponse {
        message: "Admin user created successfully".into(),
    }))
}
