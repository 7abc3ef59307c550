//! Attachment storage: validated upload, on-disk persistence, listing,
//! download, and deletion for patient files.
//!
//! A stored attachment is a row in `attachments` plus a file under
//! `<uploads>/patients/<patient_id>/`. The file is written first and the
//! row inserted second; if the insert fails the file stays behind with no
//! automatic rollback — a known gap, to be reclaimed by an offline sweep
//! rather than hidden here.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::config::MAX_UPLOAD_BYTES;
use crate::db::repository::{attachment as repo, patient as patient_repo};
use crate::db::DatabaseError;
use crate::models::Attachment;

/// Content types accepted for upload. Everything else is rejected before
/// any byte reaches the disk.
const ALLOWED_CONTENT_TYPES: [&str; 7] = [
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/gif",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Patient with id {0} not found")]
    PatientNotFound(Uuid),

    #[error("{0}")]
    InvalidUpload(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// An incoming file as decoded from the multipart request.
#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Resolved file content for a download response.
#[derive(Debug)]
pub struct FileDownload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

/// Validate and store an uploaded file for a patient.
///
/// Preconditions are checked in order, each with its own failure:
/// patient exists, file non-empty, size within the 50 MiB cap, content
/// type allow-listed. Only then is the per-patient directory created
/// (idempotently), the bytes written under a random collision-resistant
/// name, and the metadata row inserted.
pub fn add_attachment(
    conn: &Connection,
    patient_id: &Uuid,
    upload: Upload,
    uploads_dir: &Path,
) -> Result<Attachment, AttachmentError> {
    if !patient_repo::patient_exists(conn, patient_id)? {
        return Err(AttachmentError::PatientNotFound(*patient_id));
    }

    if upload.bytes.is_empty() {
        return Err(AttachmentError::InvalidUpload(
            "No file provided or file is empty".into(),
        ));
    }

    if upload.bytes.len() as u64 > MAX_UPLOAD_BYTES {
        return Err(AttachmentError::InvalidUpload(
            "File size exceeds the 50 MiB limit".into(),
        ));
    }

    let content_type = upload.content_type.to_lowercase();
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(AttachmentError::InvalidUpload(format!(
            "File type '{}' is not allowed",
            upload.content_type
        )));
    }

    let patient_dir = uploads_dir.join("patients").join(patient_id.to_string());
    fs::create_dir_all(&patient_dir)?;

    let stored_name = match Path::new(&upload.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
        None => Uuid::new_v4().to_string(),
    };
    let full_path = patient_dir.join(&stored_name);

    fs::write(&full_path, &upload.bytes)?;

    let attachment = Attachment {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        file_name: upload.file_name,
        file_path: full_path.to_string_lossy().into_owned(),
        size: format_file_size(upload.bytes.len() as u64),
        upload_date: Utc::now(),
    };

    // File write and row insert are two steps; a failure here orphans the
    // file just written (see module docs).
    repo::insert_attachment(conn, &attachment)?;

    tracing::info!(
        patient_id = %patient_id,
        attachment_id = %attachment.id,
        size = %attachment.size,
        "Attachment stored"
    );

    Ok(attachment)
}

/// All attachments for a patient, most recent upload first.
pub fn list_attachments(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Attachment>, AttachmentError> {
    if !patient_repo::patient_exists(conn, patient_id)? {
        return Err(AttachmentError::PatientNotFound(*patient_id));
    }
    Ok(repo::list_for_patient(conn, patient_id)?)
}

/// Metadata lookup scoped to the patient. `None` on a miss — stale links
/// are expected in normal operation.
pub fn get_attachment(
    conn: &Connection,
    patient_id: &Uuid,
    attachment_id: &Uuid,
) -> Result<Option<Attachment>, AttachmentError> {
    Ok(repo::get_attachment(conn, patient_id, attachment_id)?)
}

/// Resolve an attachment to raw bytes for download.
///
/// Returns `None` when either the metadata row or the file on disk is
/// missing; a file removed out-of-band makes the attachment unavailable,
/// not the request a server error.
pub fn get_attachment_file(
    conn: &Connection,
    patient_id: &Uuid,
    attachment_id: &Uuid,
) -> Result<Option<FileDownload>, AttachmentError> {
    let attachment = match repo::get_attachment(conn, patient_id, attachment_id)? {
        Some(attachment) => attachment,
        None => return Ok(None),
    };

    let path = Path::new(&attachment.file_path);
    if !path.exists() {
        tracing::warn!(
            attachment_id = %attachment.id,
            path = %attachment.file_path,
            "Attachment file missing from storage"
        );
        return Ok(None);
    }

    let bytes = fs::read(path)?;

    Ok(Some(FileDownload {
        bytes,
        content_type: content_type_for(path),
        file_name: attachment.file_name,
    }))
}

/// Delete an attachment's file and metadata row.
///
/// Returns `false` when no attachment matches for this patient (deleting
/// through another patient's id never succeeds). A file already gone from
/// disk is not an error — the end state is what was asked for.
pub fn delete_attachment(
    conn: &Connection,
    patient_id: &Uuid,
    attachment_id: &Uuid,
) -> Result<bool, AttachmentError> {
    let attachment = match repo::get_attachment(conn, patient_id, attachment_id)? {
        Some(attachment) => attachment,
        None => return Ok(false),
    };

    let path = PathBuf::from(&attachment.file_path);
    if path.exists() {
        fs::remove_file(&path)?;
    }

    repo::delete_attachment(conn, patient_id, attachment_id)?;

    tracing::info!(
        patient_id = %patient_id,
        attachment_id = %attachment_id,
        "Attachment deleted"
    );

    Ok(true)
}

/// Human-readable size in binary units, at most two decimals with trailing
/// zeros trimmed: 1536 → "1.5 KB", 1 GiB → "1 GB".
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut len = bytes as f64;
    let mut order = 0;
    while len >= 1024.0 && order < UNITS.len() - 1 {
        order += 1;
        len /= 1024.0;
    }
    let rounded = format!("{len:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[order])
}

/// Content type derived purely from the stored file's extension.
fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn insert_test_patient(conn: &Connection) -> Uuid {
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO patients (id, record_number, name, created_at, updated_at)
             VALUES (?1, ?2, 'Test Patient', datetime('now'), datetime('now'))",
            rusqlite::params![id.to_string(), format!("2026-{}", rand::random::<u32>())],
        )
        .unwrap();
        id
    }

    fn pdf_upload(bytes: Vec<u8>) -> Upload {
        Upload {
            file_name: "report.pdf".into(),
            content_type: "application/pdf".into(),
            bytes,
        }
    }

    #[test]
    fn upload_stores_file_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn);

        let attachment =
            add_attachment(&conn, &patient_id, pdf_upload(vec![1, 2, 3]), dir.path()).unwrap();

        assert_eq!(attachment.file_name, "report.pdf");
        assert_eq!(attachment.size, "3 B");
        assert!(Path::new(&attachment.file_path).exists());
        assert!(attachment.file_path.ends_with(".pdf"));

        let listed = list_attachments(&conn, &patient_id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, attachment.id);
    }

    #[test]
    fn upload_for_unknown_patient_fails() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory_database().unwrap();

        let result = add_attachment(&conn, &Uuid::new_v4(), pdf_upload(vec![1]), dir.path());
        assert!(matches!(result, Err(AttachmentError::PatientNotFound(_))));
    }

    #[test]
    fn empty_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn);

        let result = add_attachment(&conn, &patient_id, pdf_upload(Vec::new()), dir.path());
        assert!(matches!(result, Err(AttachmentError::InvalidUpload(_))));
        assert!(list_attachments(&conn, &patient_id).unwrap().is_empty());
    }

    #[test]
    fn oversized_upload_is_rejected_without_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn);

        // Don't allocate 50 MiB of real bytes; one over the cap is enough.
        let upload = Upload {
            file_name: "huge.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: vec![0; (MAX_UPLOAD_BYTES + 1) as usize],
        };

        let result = add_attachment(&conn, &patient_id, upload, dir.path());
        assert!(matches!(result, Err(AttachmentError::InvalidUpload(_))));
        assert!(list_attachments(&conn, &patient_id).unwrap().is_empty());
    }

    #[test]
    fn disallowed_content_type_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn);

        let upload = Upload {
            file_name: "script.sh".into(),
            content_type: "application/x-sh".into(),
            bytes: vec![1, 2, 3],
        };

        let result = add_attachment(&conn, &patient_id, upload, dir.path());
        assert!(matches!(result, Err(AttachmentError::InvalidUpload(_))));
        // No per-patient directory means no file was written.
        assert!(!dir
            .path()
            .join("patients")
            .join(patient_id.to_string())
            .exists());
    }

    #[test]
    fn content_type_check_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn);

        let upload = Upload {
            file_name: "scan.PDF".into(),
            content_type: "Application/PDF".into(),
            bytes: vec![1],
        };

        assert!(add_attachment(&conn, &patient_id, upload, dir.path()).is_ok());
    }

    #[test]
    fn listing_is_most_recent_first() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn);

        let first =
            add_attachment(&conn, &patient_id, pdf_upload(vec![1]), dir.path()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second =
            add_attachment(&conn, &patient_id, pdf_upload(vec![2]), dir.path()).unwrap();

        let listed = list_attachments(&conn, &patient_id).unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[test]
    fn download_round_trips_bytes_and_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn);

        let attachment =
            add_attachment(&conn, &patient_id, pdf_upload(vec![9, 8, 7]), dir.path()).unwrap();

        let download = get_attachment_file(&conn, &patient_id, &attachment.id)
            .unwrap()
            .expect("file should be available");
        assert_eq!(download.bytes, vec![9, 8, 7]);
        assert_eq!(download.content_type, "application/pdf");
        assert_eq!(download.file_name, "report.pdf");
    }

    #[test]
    fn download_of_externally_removed_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn);

        let attachment =
            add_attachment(&conn, &patient_id, pdf_upload(vec![1]), dir.path()).unwrap();
        fs::remove_file(&attachment.file_path).unwrap();

        let download = get_attachment_file(&conn, &patient_id, &attachment.id).unwrap();
        assert!(download.is_none());
    }

    #[test]
    fn delete_of_missing_attachment_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let _ = dir;
        let conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn);

        let deleted = delete_attachment(&conn, &patient_id, &Uuid::new_v4()).unwrap();
        assert!(!deleted);
    }

    #[test]
    fn delete_is_scoped_to_the_owning_patient() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory_database().unwrap();
        let owner = insert_test_patient(&conn);
        let other = insert_test_patient(&conn);

        let attachment = add_attachment(&conn, &owner, pdf_upload(vec![1]), dir.path()).unwrap();

        assert!(!delete_attachment(&conn, &other, &attachment.id).unwrap());
        assert!(Path::new(&attachment.file_path).exists());

        assert!(delete_attachment(&conn, &owner, &attachment.id).unwrap());
        assert!(!Path::new(&attachment.file_path).exists());
        assert!(get_attachment(&conn, &owner, &attachment.id).unwrap().is_none());
    }

    #[test]
    fn delete_succeeds_when_file_already_gone() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn);

        let attachment =
            add_attachment(&conn, &patient_id, pdf_upload(vec![1]), dir.path()).unwrap();
        fs::remove_file(&attachment.file_path).unwrap();

        assert!(delete_attachment(&conn, &patient_id, &attachment.id).unwrap());
    }

    #[test]
    fn format_file_size_uses_binary_units() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024), "1 MB");
        assert_eq!(format_file_size(1_073_741_824), "1 GB");
        assert_eq!(format_file_size(1_572_864), "1.5 MB");
    }

    #[test]
    fn content_type_mapping_matches_known_extensions() {
        assert_eq!(content_type_for(Path::new("a.pdf")), "application/pdf");
        assert_eq!(content_type_for(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.png")), "image/png");
        assert_eq!(content_type_for(Path::new("a.gif")), "image/gif");
        assert_eq!(content_type_for(Path::new("a.txt")), "text/plain");
        assert_eq!(
            content_type_for(Path::new("a.doc")),
            "application/msword"
        );
        assert_eq!(
            content_type_for(Path::new("a.docx")),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(
            content_type_for(Path::new("a.unknownext")),
            "application/octet-stream"
        );
    }
}
