use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::MedicalHistory;

pub fn insert_history(conn: &Connection, entry: &MedicalHistory) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medical_histories (id, patient_id, note, logged_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.id.to_string(),
            entry.patient_id.to_string(),
            entry.note,
            entry.logged_at,
            entry.created_at,
            entry.updated_at,
        ],
    )?;
    Ok(())
}

/// All notes for a patient, oldest first.
pub fn get_histories_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<MedicalHistory>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, note, logged_at, created_at, updated_at
         FROM medical_histories WHERE patient_id = ?1 ORDER BY logged_at, id",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], history_from_row)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<MedicalHistory> {
    let id: String = row.get(0)?;
    let patient_id: String = row.get(1)?;
    Ok(MedicalHistory {
        id: parse_uuid(&id, 0)?,
        patient_id: parse_uuid(&patient_id, 1)?,
        note: row.get(2)?,
        logged_at: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn parse_uuid(value: &str, column: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}
