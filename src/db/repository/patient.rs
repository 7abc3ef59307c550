use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{Guardian, Patient, PatientInput};

const PATIENT_COLUMNS: &str = "id, record_number, name, diagnosis, birth_date, age, sex, \
     referred_by, consultation_date, medical_insurance, \
     mother_name, mother_middle_name, mother_last_name, \
     father_name, father_middle_name, father_last_name, \
     gestation, delivery, birth_weight, created_at, updated_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, record_number, name, diagnosis, birth_date, age, sex,
         referred_by, consultation_date, medical_insurance,
         mother_name, mother_middle_name, mother_last_name,
         father_name, father_middle_name, father_last_name,
         gestation, delivery, birth_weight, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                 ?17, ?18, ?19, ?20, ?21)",
        params![
            patient.id.to_string(),
            patient.record_number,
            patient.name,
            patient.diagnosis,
            patient.birth_date,
            patient.age,
            patient.sex,
            patient.referred_by,
            patient.consultation_date,
            patient.medical_insurance,
            patient.mother.name,
            patient.mother.middle_name,
            patient.mother.last_name,
            patient.father.name,
            patient.father.middle_name,
            patient.father.last_name,
            patient.gestation,
            patient.delivery,
            patient.birth_weight,
            patient.created_at,
            patient.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], patient_from_row);

    match result {
        Ok(patient) => Ok(Some(patient)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn patient_exists(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM patients WHERE id = ?1)",
        params![id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists != 0)
}

/// One page of patients in insertion order.
pub fn list_patients(
    conn: &Connection,
    offset: i64,
    limit: i64,
) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY created_at, id LIMIT ?1 OFFSET ?2"
    ))?;

    let rows = stmt.query_map(params![limit, offset], patient_from_row)?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(row?);
    }
    Ok(patients)
}

pub fn count_patients(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
    Ok(count)
}

/// Overwrite every mutable field. The record number is deliberately not in
/// the column list. Returns false when the patient does not exist.
pub fn update_patient(
    conn: &Connection,
    id: &Uuid,
    input: &PatientInput,
    updated_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE patients SET name = ?2, diagnosis = ?3, birth_date = ?4, age = ?5,
         sex = ?6, referred_by = ?7, consultation_date = ?8, medical_insurance = ?9,
         mother_name = ?10, mother_middle_name = ?11, mother_last_name = ?12,
         father_name = ?13, father_middle_name = ?14, father_last_name = ?15,
         gestation = ?16, delivery = ?17, birth_weight = ?18, updated_at = ?19
         WHERE id = ?1",
        params![
            id.to_string(),
            input.name,
            input.diagnosis,
            input.birth_date,
            input.age,
            input.sex,
            input.referred_by,
            input.consultation_date,
            input.medical_insurance,
            input.mother.name,
            input.mother.middle_name,
            input.mother.last_name,
            input.father.name,
            input.father.middle_name,
            input.father.last_name,
            input.gestation,
            input.delivery,
            input.birth_weight,
            updated_at,
        ],
    )?;
    Ok(rows > 0)
}

/// Delete a patient with all owned history and attachment rows in one
/// transaction. Attachment files on disk are the caller's concern — their
/// paths must be collected before this runs.
pub fn delete_patient_cascade(conn: &mut Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let id_str = id.to_string();
    let tx = conn.transaction()?;

    let deleted_notes = tx.execute(
        "DELETE FROM medical_histories WHERE patient_id = ?1",
        params![id_str],
    )?;
    let deleted_attachments = tx.execute(
        "DELETE FROM attachments WHERE patient_id = ?1",
        params![id_str],
    )?;
    let deleted = tx.execute("DELETE FROM patients WHERE id = ?1", params![id_str])?;

    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: id_str,
        });
    }

    tx.commit()?;

    tracing::info!(
        patient_id = %id,
        notes = deleted_notes,
        attachments = deleted_attachments,
        "Patient cascade-deleted with all owned records"
    );

    Ok(())
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    let id: String = row.get(0)?;
    Ok(Patient {
        id: Uuid::parse_str(&id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        record_number: row.get(1)?,
        name: row.get(2)?,
        diagnosis: row.get(3)?,
        birth_date: row.get::<_, Option<NaiveDate>>(4)?,
        age: row.get(5)?,
        sex: row.get(6)?,
        referred_by: row.get(7)?,
        consultation_date: row.get::<_, Option<NaiveDate>>(8)?,
        medical_insurance: row.get(9)?,
        mother: Guardian {
            name: row.get(10)?,
            middle_name: row.get(11)?,
            last_name: row.get(12)?,
        },
        father: Guardian {
            name: row.get(13)?,
            middle_name: row.get(14)?,
            last_name: row.get(15)?,
        },
        gestation: row.get(16)?,
        delivery: row.get(17)?,
        birth_weight: row.get(18)?,
        created_at: row.get(19)?,
        updated_at: row.get(20)?,
        history: Vec::new(),
        attachments: Vec::new(),
    })
}
