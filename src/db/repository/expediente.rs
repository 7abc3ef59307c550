//! SQL for the per-year expediente counter and record-number lookups.
//!
//! These run inside the generator's write transaction; the functions take a
//! plain `&Connection` so they work on both connections and transactions.

use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// Current counter value for a year, if the year has been seen.
pub fn get_counter(conn: &Connection, year: i32) -> Result<Option<i64>, DatabaseError> {
    let result = conn.query_row(
        "SELECT counter FROM expediente_counters WHERE year = ?1",
        params![year],
        |row| row.get(0),
    );

    match result {
        Ok(counter) => Ok(Some(counter)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Create or overwrite the counter row for a year.
pub fn put_counter(conn: &Connection, year: i32, counter: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO expediente_counters (year, counter) VALUES (?1, ?2)
         ON CONFLICT(year) DO UPDATE SET counter = excluded.counter",
        params![year, counter],
    )?;
    Ok(())
}

pub fn record_number_exists(conn: &Connection, record_number: &str) -> Result<bool, DatabaseError> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM patients WHERE record_number = ?1)",
        params![record_number],
        |row| row.get(0),
    )?;
    Ok(exists != 0)
}

/// Highest numeric suffix among this year's assigned record numbers, or 0
/// when none exist. Suffixes are parsed in Rust; rows that do not match the
/// `{year}-{n}` shape are ignored.
pub fn max_suffix_for_year(conn: &Connection, year: i32) -> Result<i64, DatabaseError> {
    let prefix = format!("{year}-");
    let mut stmt =
        conn.prepare("SELECT record_number FROM patients WHERE record_number LIKE ?1")?;
    let rows = stmt.query_map(params![format!("{prefix}%")], |row| {
        row.get::<_, String>(0)
    })?;

    let mut max = 0i64;
    for row in rows {
        let number = row?;
        if let Some(suffix) = number.strip_prefix(&prefix) {
            if let Ok(n) = suffix.parse::<i64>() {
                max = max.max(n);
            }
        }
    }
    Ok(max)
}
