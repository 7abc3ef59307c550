//! Route wiring for the `/api/v1` surface.
//!
//! Three groups share one context: open routes (patients, attachments,
//! auth), token-holder routes (`/users/me`), and admin routes (user
//! management). Middleware reads `ApiContext` from an Extension layer;
//! handlers get it via `State`.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::config::MAX_UPLOAD_BYTES;

/// Extra room on top of the upload cap so the 50 MiB check in the
/// attachment store is the one that rejects, with a proper 400.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Build the API router.
pub fn api_router(ctx: ApiContext) -> Router {
    let open = Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/patients",
            get(endpoints::patients::list)
                .post(endpoints::patients::create)
                .put(endpoints::patients::update),
        )
        .route(
            "/patient",
            get(endpoints::patients::get).delete(endpoints::patients::delete),
        )
        .route(
            "/patient/:patient_id/history",
            post(endpoints::patients::add_history),
        )
        .route(
            "/patient/:patient_id/attachments",
            post(endpoints::attachments::upload).get(endpoints::attachments::list),
        )
        .route(
            "/patient/:patient_id/attachments/:attachment_id",
            get(endpoints::attachments::info).delete(endpoints::attachments::delete),
        )
        .route(
            "/patient/:patient_id/attachments/:attachment_id/download",
            get(endpoints::attachments::download),
        )
        .route("/auth/login", post(endpoints::auth::login))
        .route("/auth/create-admin", post(endpoints::auth::create_admin))
        .with_state(ctx.clone());

    // Any valid token
    let authenticated = Router::new()
        .route("/users/me", get(endpoints::users::me))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_auth));

    // Admin role required; require_auth runs first (outermost) and
    // injects CurrentUser for require_admin.
    let admin = Router::new()
        .route(
            "/users",
            post(endpoints::users::create).get(endpoints::users::list),
        )
        .route(
            "/users/:user_id",
            get(endpoints::users::get)
                .put(endpoints::users::update)
                .delete(endpoints::users::delete),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_admin))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth));

    Router::new()
        .nest("/api/v1", open)
        .nest("/api/v1", authenticated)
        .nest("/api/v1", admin)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES as usize + BODY_LIMIT_SLACK))
        .layer(CorsLayer::permissive())
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx))
}
