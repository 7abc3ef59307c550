//! User management endpoints. All of these sit behind the auth
//! middleware; everything except `me` additionally requires the admin
//! role.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::api::endpoints::auth::MessageResponse;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CurrentUser};
use crate::auth::RegisterRequest;
use crate::models::{Role, User};

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub second_last_name: Option<String>,
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name(),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            middle_name: user.middle_name,
            last_name: user.last_name,
            second_last_name: user.second_last_name,
            role: user.role,
        }
    }
}

/// `POST /api/v1/users` — create a regular account (admin only).
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let conn = ctx.connect()?;
    let user = ctx.auth.create_user(&conn, &request)?;
    tracing::info!(
        username = %user.username,
        admin = %current.username,
        "User created by admin"
    );
    Ok(Json(user.into()))
}

/// `GET /api/v1/users` — all accounts (admin only).
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let conn = ctx.connect()?;
    let users = ctx.auth.list_users(&conn)?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// `GET /api/v1/users/{id}` (admin only).
pub async fn get(
    State(ctx): State<ApiContext>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let conn = ctx.connect()?;
    let user = ctx.auth.get_user(&conn, &user_id)?;
    Ok(Json(user.into()))
}

/// `PUT /api/v1/users/{id}` — update profile, optionally reset the
/// password (admin only).
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let conn = ctx.connect()?;
    let user = ctx.auth.update_user(&conn, &user_id, &request)?;
    Ok(Json(user.into()))
}

/// `DELETE /api/v1/users/{id}` (admin only).
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let conn = ctx.connect()?;
    ctx.auth.delete_user(&conn, &user_id)?;
    Ok(Json(MessageResponse {
        message: "User deleted successfully".into(),
    }))
}

/// `GET /api/v1/users/me` — profile of the token holder.
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<UserResponse>, ApiError> {
    let conn = ctx.connect()?;
    let user = ctx.auth.get_user(&conn, &current.id)?;
    Ok(Json(user.into()))
}
