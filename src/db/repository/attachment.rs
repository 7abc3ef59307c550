use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::Attachment;

pub fn insert_attachment(conn: &Connection, attachment: &Attachment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO attachments (id, patient_id, file_name, file_path, size, upload_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            attachment.id.to_string(),
            attachment.patient_id.to_string(),
            attachment.file_name,
            attachment.file_path,
            attachment.size,
            attachment.upload_date,
        ],
    )?;
    Ok(())
}

/// Look up an attachment scoped to its patient. A miss is a normal outcome
/// (stale links), so this returns `None` instead of an error.
pub fn get_attachment(
    conn: &Connection,
    patient_id: &Uuid,
    attachment_id: &Uuid,
) -> Result<Option<Attachment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, file_name, file_path, size, upload_date
         FROM attachments WHERE id = ?1 AND patient_id = ?2",
    )?;

    let result = stmt.query_row(
        params![attachment_id.to_string(), patient_id.to_string()],
        attachment_from_row,
    );

    match result {
        Ok(attachment) => Ok(Some(attachment)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All attachments for a patient, most recent upload first.
pub fn list_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Attachment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, file_name, file_path, size, upload_date
         FROM attachments WHERE patient_id = ?1 ORDER BY upload_date DESC, id",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], attachment_from_row)?;

    let mut attachments = Vec::new();
    for row in rows {
        attachments.push(row?);
    }
    Ok(attachments)
}

/// Storage paths of every attachment owned by a patient. Collected before a
/// cascade delete so the files can be removed afterwards.
pub fn list_paths_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT file_path FROM attachments WHERE patient_id = ?1")?;
    let rows = stmt.query_map(params![patient_id.to_string()], |row| row.get(0))?;

    let mut paths = Vec::new();
    for row in rows {
        paths.push(row?);
    }
    Ok(paths)
}

/// Remove the metadata row. Returns false when no row matched.
pub fn delete_attachment(
    conn: &Connection,
    patient_id: &Uuid,
    attachment_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "DELETE FROM attachments WHERE id = ?1 AND patient_id = ?2",
        params![attachment_id.to_string(), patient_id.to_string()],
    )?;
    Ok(rows > 0)
}

fn attachment_from_row(row: &Row<'_>) -> rusqlite::Result<Attachment> {
    let id: String = row.get(0)?;
    let patient_id: String = row.get(1)?;
    Ok(Attachment {
        id: parse_uuid(&id, 0)?,
        patient_id: parse_uuid(&patient_id, 1)?,
        file_name: row.get(2)?,
        file_path: row.get(3)?,
        size: row.get(4)?,
        upload_date: row.get(5)?,
    })
}

fn parse_uuid(value: &str, column: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}
