//! Patient CRUD and history-note endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{Patient, PatientInput};
use crate::patients::{self, PaginatedList};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default = "default_page_number")]
    pub page_number: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default = "default_max_pages")]
    pub max_pages: i64,
}

fn default_page_number() -> i64 {
    patients::DEFAULT_PAGE
}

fn default_page_size() -> i64 {
    patients::DEFAULT_PAGE_SIZE
}

fn default_max_pages() -> i64 {
    patients::DEFAULT_MAX_PAGES
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct HistoryRequest {
    pub note: String,
}

/// `GET /api/v1/patients?pageNumber&pageSize&maxPages` — paginated list.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PaginatedList<Patient>>, ApiError> {
    let conn = ctx.connect()?;
    let page = patients::list_patients(&conn, query.page_number, query.page_size, query.max_pages)?;
    Ok(Json(page))
}

/// `GET /api/v1/patient?id={uuid}` — one patient with history and
/// attachments.
pub async fn get(
    State(ctx): State<ApiContext>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Patient>, ApiError> {
    let conn = ctx.connect()?;
    let patient = patients::get_patient(&conn, &query.id)?;
    Ok(Json(patient))
}

/// `POST /api/v1/patients` — create a patient; the record number is
/// assigned here and nowhere else.
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(input): Json<PatientInput>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let mut conn = ctx.connect()?;
    let patient = patients::create_patient(&mut conn, &input)?;
    Ok((StatusCode::CREATED, Json(patient)))
}

/// `PUT /api/v1/patients?id={uuid}` — overwrite mutable fields.
pub async fn update(
    State(ctx): State<ApiContext>,
    Query(query): Query<IdQuery>,
    Json(input): Json<PatientInput>,
) -> Result<Json<Patient>, ApiError> {
    let conn = ctx.connect()?;
    let patient = patients::update_patient(&conn, &query.id, &input)?;
    Ok(Json(patient))
}

/// `DELETE /api/v1/patient?id={uuid}` — 204 on success, 404 if absent.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Query(query): Query<IdQuery>,
) -> Result<StatusCode, ApiError> {
    let mut conn = ctx.connect()?;
    patients::delete_patient(&mut conn, &query.id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/v1/patient/{patient_id}/history` — append a note, return
/// the refreshed patient.
pub async fn add_history(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<HistoryRequest>,
) -> Result<Json<Patient>, ApiError> {
    let conn = ctx.connect()?;
    patients::add_history_note(&conn, &patient_id, &request.note)?;
    let patient = patients::get_patient(&conn, &patient_id)?;
    Ok(Json(patient))
}
