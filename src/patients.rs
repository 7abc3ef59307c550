//! Patient CRUD and history notes: the orchestration layer over the
//! record-number generator, the repositories, and attachment storage.

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository::{
    attachment as attachment_repo, medical_history as history_repo, patient as patient_repo,
};
use crate::db::DatabaseError;
use crate::expediente::{self, ExpedienteError};
use crate::models::{MedicalHistory, Patient, PatientInput};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_MAX_PAGES: i64 = 5;

#[derive(Debug, Error)]
pub enum PatientError {
    #[error("No patient found with id {0}")]
    NotFound(Uuid),

    #[error("Note content is required")]
    EmptyNote,

    #[error(transparent)]
    RecordNumber(#[from] ExpedienteError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// One page of results plus pagination metadata.
///
/// `total_pages` is capped at the requested display maximum while
/// `total_records` always reports the true count.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedList<T> {
    pub items: Vec<T>,
    pub total_records: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub page_size: i64,
}

/// List patients one page at a time. Page numbers and sizes of zero or
/// less fall back to the defaults.
pub fn list_patients(
    conn: &Connection,
    page_number: i64,
    page_size: i64,
    max_pages: i64,
) -> Result<PaginatedList<Patient>, PatientError> {
    let page_number = if page_number > 0 { page_number } else { DEFAULT_PAGE };
    let page_size = if page_size > 0 { page_size } else { DEFAULT_PAGE_SIZE };
    let max_pages = if max_pages > 0 { max_pages } else { DEFAULT_MAX_PAGES };

    let items = patient_repo::list_patients(conn, (page_number - 1) * page_size, page_size)?;
    let total_records = patient_repo::count_patients(conn)?;

    let total_pages = (total_records + page_size - 1) / page_size;
    let pages_to_display = total_pages.min(max_pages);

    Ok(PaginatedList {
        items,
        total_records,
        total_pages: pages_to_display,
        current_page: page_number,
        page_size,
    })
}

/// Fetch one patient with history and attachments eagerly loaded.
pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Patient, PatientError> {
    let mut patient =
        patient_repo::get_patient(conn, id)?.ok_or(PatientError::NotFound(*id))?;
    patient.history = history_repo::get_histories_for_patient(conn, id)?;
    patient.attachments = attachment_repo::list_for_patient(conn, id)?;
    Ok(patient)
}

/// Create a patient, assigning a fresh record number first.
///
/// Record-number generation failure aborts the whole creation — a patient
/// is never persisted with a blank or colliding number.
pub fn create_patient(
    conn: &mut Connection,
    input: &PatientInput,
) -> Result<Patient, PatientError> {
    let record_number = expediente::generate(conn)?;
    let now = Utc::now();

    let patient = Patient {
        id: Uuid::new_v4(),
        record_number,
        name: input.name.clone(),
        diagnosis: input.diagnosis.clone(),
        birth_date: input.birth_date,
        age: input.age.clone(),
        sex: input.sex.clone(),
        referred_by: input.referred_by.clone(),
        consultation_date: input.consultation_date,
        medical_insurance: input.medical_insurance.clone(),
        mother: input.mother.clone(),
        father: input.father.clone(),
        gestation: input.gestation.clone(),
        delivery: input.delivery.clone(),
        birth_weight: input.birth_weight.clone(),
        created_at: now,
        updated_at: now,
        history: Vec::new(),
        attachments: Vec::new(),
    };

    patient_repo::insert_patient(conn, &patient)?;

    tracing::info!(
        patient_id = %patient.id,
        record_number = %patient.record_number,
        "Patient created"
    );

    Ok(patient)
}

/// Overwrite all mutable fields of an existing patient. The record number
/// is not touched.
pub fn update_patient(
    conn: &Connection,
    id: &Uuid,
    input: &PatientInput,
) -> Result<Patient, PatientError> {
    if !patient_repo::update_patient(conn, id, input, Utc::now())? {
        return Err(PatientError::NotFound(*id));
    }
    get_patient(conn, id)
}

/// Delete a patient with all owned history and attachments.
///
/// Rows go first, in one transaction; attachment files are removed from
/// disk afterwards, best-effort — a failed unlink is logged, not fatal.
pub fn delete_patient(conn: &mut Connection, id: &Uuid) -> Result<(), PatientError> {
    if !patient_repo::patient_exists(conn, id)? {
        return Err(PatientError::NotFound(*id));
    }

    let file_paths = attachment_repo::list_paths_for_patient(conn, id)?;
    patient_repo::delete_patient_cascade(conn, id)?;

    for path in file_paths {
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path, error = %e, "Could not remove attachment file");
            }
        }
    }

    Ok(())
}

/// Append a free-text history note, stamping all timestamps at now.
pub fn add_history_note(
    conn: &Connection,
    patient_id: &Uuid,
    note: &str,
) -> Result<MedicalHistory, PatientError> {
    if note.trim().is_empty() {
        return Err(PatientError::EmptyNote);
    }
    if !patient_repo::patient_exists(conn, patient_id)? {
        return Err(PatientError::NotFound(*patient_id));
    }

    let now = Utc::now();
    let entry = MedicalHistory {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        note: note.to_string(),
        logged_at: now,
        created_at: now,
        updated_at: now,
    };

    history_repo::insert_history(conn, &entry)?;

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn sample_input(name: &str) -> PatientInput {
        PatientInput {
            name: name.to_string(),
            diagnosis: "Seasonal asthma".into(),
            age: "7".into(),
            sex: "F".into(),
            ..PatientInput::default()
        }
    }

    #[test]
    fn create_assigns_a_record_number() {
        let mut conn = open_memory_database().unwrap();
        let patient = create_patient(&mut conn, &sample_input("Ana Pérez")).unwrap();

        assert!(!patient.record_number.is_empty());
        assert!(patient.record_number.contains('-'));

        let fetched = get_patient(&conn, &patient.id).unwrap();
        assert_eq!(fetched.record_number, patient.record_number);
        assert_eq!(fetched.name, "Ana Pérez");
    }

    #[test]
    fn record_numbers_are_pairwise_distinct() {
        let mut conn = open_memory_database().unwrap();
        let mut seen = std::collections::HashSet::new();
        for i in 0..25 {
            let patient = create_patient(&mut conn, &sample_input(&format!("P{i}"))).unwrap();
            assert!(seen.insert(patient.record_number));
        }
    }

    #[test]
    fn get_missing_patient_is_not_found() {
        let conn = open_memory_database().unwrap();
        let result = get_patient(&conn, &Uuid::new_v4());
        assert!(matches!(result, Err(PatientError::NotFound(_))));
    }

    #[test]
    fn update_overwrites_fields_but_not_record_number() {
        let mut conn = open_memory_database().unwrap();
        let created = create_patient(&mut conn, &sample_input("Before")).unwrap();

        let mut input = sample_input("After");
        input.diagnosis = "Updated diagnosis".into();
        let updated = update_patient(&conn, &created.id, &input).unwrap();

        assert_eq!(updated.name, "After");
        assert_eq!(updated.diagnosis, "Updated diagnosis");
        assert_eq!(updated.record_number, created.record_number);
    }

    #[test]
    fn update_missing_patient_is_not_found() {
        let conn = open_memory_database().unwrap();
        let result = update_patient(&conn, &Uuid::new_v4(), &sample_input("X"));
        assert!(matches!(result, Err(PatientError::NotFound(_))));
    }

    #[test]
    fn note_round_trips_through_fetch() {
        let mut conn = open_memory_database().unwrap();
        let patient = create_patient(&mut conn, &sample_input("Ana")).unwrap();

        add_history_note(&conn, &patient.id, "Follow-up in two weeks").unwrap();

        let fetched = get_patient(&conn, &patient.id).unwrap();
        assert_eq!(fetched.history.len(), 1);
        assert_eq!(fetched.history[0].note, "Follow-up in two weeks");
    }

    #[test]
    fn blank_note_is_rejected() {
        let mut conn = open_memory_database().unwrap();
        let patient = create_patient(&mut conn, &sample_input("Ana")).unwrap();

        let result = add_history_note(&conn, &patient.id, "   ");
        assert!(matches!(result, Err(PatientError::EmptyNote)));
    }

    #[test]
    fn note_for_missing_patient_is_not_found() {
        let conn = open_memory_database().unwrap();
        let result = add_history_note(&conn, &Uuid::new_v4(), "note");
        assert!(matches!(result, Err(PatientError::NotFound(_))));
    }

    #[test]
    fn delete_removes_patient_and_owned_rows() {
        let mut conn = open_memory_database().unwrap();
        let patient = create_patient(&mut conn, &sample_input("Ana")).unwrap();
        add_history_note(&conn, &patient.id, "note").unwrap();

        delete_patient(&mut conn, &patient.id).unwrap();

        assert!(matches!(
            get_patient(&conn, &patient.id),
            Err(PatientError::NotFound(_))
        ));
        let orphaned: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM medical_histories WHERE patient_id = ?1",
                rusqlite::params![patient.id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphaned, 0);
    }

    #[test]
    fn delete_missing_patient_is_not_found() {
        let mut conn = open_memory_database().unwrap();
        let result = delete_patient(&mut conn, &Uuid::new_v4());
        assert!(matches!(result, Err(PatientError::NotFound(_))));
    }

    #[test]
    fn pagination_caps_total_pages_for_display() {
        let mut conn = open_memory_database().unwrap();
        for i in 0..95 {
            create_patient(&mut conn, &sample_input(&format!("P{i}"))).unwrap();
        }

        let page = list_patients(&conn, 1, 10, 5).unwrap();
        assert_eq!(page.total_records, 95);
        assert_eq!(page.total_pages, 5, "display cap applies");
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.current_page, 1);
    }

    #[test]
    fn pagination_defaults_apply_for_non_positive_values() {
        let mut conn = open_memory_database().unwrap();
        for i in 0..3 {
            create_patient(&mut conn, &sample_input(&format!("P{i}"))).unwrap();
        }

        let page = list_patients(&conn, 0, -1, 0).unwrap();
        assert_eq!(page.current_page, DEFAULT_PAGE);
        assert_eq!(page.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn pagination_pages_do_not_overlap() {
        let mut conn = open_memory_database().unwrap();
        for i in 0..15 {
            create_patient(&mut conn, &sample_input(&format!("P{i}"))).unwrap();
        }

        let first = list_patients(&conn, 1, 10, 5).unwrap();
        let second = list_patients(&conn, 2, 10, 5).unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(second.items.len(), 5);

        let mut ids: std::collections::HashSet<Uuid> = std::collections::HashSet::new();
        for patient in first.items.iter().chain(second.items.iter()) {
            assert!(ids.insert(patient.id));
        }
    }
}
