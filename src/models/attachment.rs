use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Metadata for one stored file belonging to one patient.
///
/// `file_path` is the on-disk storage handle; it is never serialized to
/// clients, which address the file through the download endpoint instead.
#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Original display name as uploaded.
    pub file_name: String,
    #[serde(skip_serializing)]
    pub file_path: String,
    /// Human-readable size ("1.5 KB"), fixed at upload time.
    pub size: String,
    pub upload_date: DateTime<Utc>,
}
