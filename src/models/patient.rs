use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Attachment;

/// A parent or legal guardian recorded on the patient chart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Guardian {
    pub name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
}

/// A patient chart. The record number is assigned once at creation and
/// never changes afterwards; history and attachments are owned collections
/// that go away with the patient.
#[derive(Debug, Clone, Serialize)]
pub struct Patient {
    pub id: Uuid,
    pub record_number: String,

    pub name: String,
    pub diagnosis: String,
    pub birth_date: Option<NaiveDate>,
    pub age: String,
    pub sex: String,
    pub referred_by: String,
    pub consultation_date: Option<NaiveDate>,
    pub medical_insurance: String,

    pub mother: Guardian,
    pub father: Guardian,

    pub gestation: String,
    pub delivery: String,
    pub birth_weight: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub history: Vec<MedicalHistory>,
    pub attachments: Vec<Attachment>,
}

/// Client-supplied patient fields: everything except the identity, the
/// record number, and the audit stamps, which the service controls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientInput {
    pub name: String,
    pub diagnosis: String,
    pub birth_date: Option<NaiveDate>,
    pub age: String,
    pub sex: String,
    pub referred_by: String,
    pub consultation_date: Option<NaiveDate>,
    pub medical_insurance: String,

    pub mother: Guardian,
    pub father: Guardian,

    pub gestation: String,
    pub delivery: String,
    pub birth_weight: String,
}

/// A timestamped free-text clinical note on one patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalHistory {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub note: String,
    pub logged_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
