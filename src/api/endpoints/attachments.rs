//! Attachment endpoints: multipart upload, listing, metadata, download,
//! and deletion.

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::attachments::{self, Upload};
use crate::models::Attachment;

/// Attachment metadata as exposed to clients: the storage path stays
/// server-side, the download URL stands in for it.
#[derive(Debug, Serialize)]
pub struct AttachmentResponse {
    pub id: Uuid,
    pub name: String,
    pub size: String,
    pub upload_date: DateTime<Utc>,
    pub download_url: String,
}

impl From<&Attachment> for AttachmentResponse {
    fn from(attachment: &Attachment) -> Self {
        Self {
            id: attachment.id,
            name: attachment.file_name.clone(),
            size: attachment.size.clone(),
            upload_date: attachment.upload_date,
            download_url: format!(
                "/api/v1/patient/{}/attachments/{}/download",
                attachment.patient_id, attachment.id
            ),
        }
    }
}

/// `POST /api/v1/patient/{patient_id}/attachments` — validated multipart
/// upload. The first file field is taken; validation order and failure
/// modes live in [`attachments::add_attachment`].
pub async fn upload(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<AttachmentResponse>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.file_name().is_none() && field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Could not read file: {e}")))?;

        upload = Some(Upload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let upload =
        upload.ok_or_else(|| ApiError::BadRequest("No file provided or file is empty".into()))?;

    let conn = ctx.connect()?;
    let attachment = attachments::add_attachment(&conn, &patient_id, upload, &ctx.uploads_dir)?;

    Ok(Json(AttachmentResponse::from(&attachment)))
}

/// `GET /api/v1/patient/{patient_id}/attachments` — newest first.
pub async fn list(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<AttachmentResponse>>, ApiError> {
    let conn = ctx.connect()?;
    let attachments = attachments::list_attachments(&conn, &patient_id)?;
    Ok(Json(attachments.iter().map(AttachmentResponse::from).collect()))
}

/// `GET /api/v1/patient/{patient_id}/attachments/{id}` — metadata only.
pub async fn info(
    State(ctx): State<ApiContext>,
    Path((patient_id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AttachmentResponse>, ApiError> {
    let conn = ctx.connect()?;
    let attachment = attachments::get_attachment(&conn, &patient_id, &attachment_id)?
        .ok_or_else(|| ApiError::NotFound("Attachment not found".into()))?;
    Ok(Json(AttachmentResponse::from(&attachment)))
}

/// `GET /api/v1/patient/{patient_id}/attachments/{id}/download` — raw
/// bytes with the content type derived from the stored extension. Missing
/// metadata or a missing file both read as 404.
pub async fn download(
    State(ctx): State<ApiContext>,
    Path((patient_id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    let conn = ctx.connect()?;
    let file = attachments::get_attachment_file(&conn, &patient_id, &attachment_id)?
        .ok_or_else(|| ApiError::NotFound("Attachment not found or file not accessible".into()))?;

    let headers = [
        (header::CONTENT_TYPE, file.content_type),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file.file_name),
        ),
    ];

    Ok((headers, file.bytes).into_response())
}

/// `DELETE /api/v1/patient/{patient_id}/attachments/{id}` — 204 or 404.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path((patient_id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.connect()?;
    if attachments::delete_attachment(&conn, &patient_id, &attachment_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Attachment not found".into()))
    }
}
