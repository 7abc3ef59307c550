//! Unique record-number (expediente) generation.
//!
//! Every patient gets a human-readable `"{year}-{n}"` identifier at
//! creation. The per-year counter row is the one piece of state mutated
//! under contention, so the whole fetch-increment-verify sequence runs
//! inside an IMMEDIATE transaction (SQLite's write lock). Writers that
//! lose the race see a busy error and retry with a short random pause.

use std::thread;
use std::time::Duration;

use chrono::{Datelike, Local};
use rand::Rng;
use rusqlite::{Connection, TransactionBehavior};
use thiserror::Error;

use crate::db::repository::expediente as repo;
use crate::db::DatabaseError;

/// Bound on full-sequence retries when the counter row is contended.
const MAX_ATTEMPTS: u32 = 10;
/// Randomized pause between attempts, in milliseconds.
const BACKOFF_MIN_MS: u64 = 10;
const BACKOFF_MAX_MS: u64 = 50;

#[derive(Debug, Error)]
pub enum ExpedienteError {
    #[error("Could not produce a unique record number after {MAX_ATTEMPTS} attempts")]
    Exhausted,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Produce a record number that no existing patient holds.
///
/// The year comes from the wall clock; the first call in a new year lazily
/// creates that year's counter row. Fails with [`ExpedienteError::Exhausted`]
/// when the write lock cannot be won within the retry bound — the caller
/// must not create a patient in that case.
pub fn generate(conn: &mut Connection) -> Result<String, ExpedienteError> {
    generate_for_year(conn, Local::now().year())
}

pub(crate) fn generate_for_year(
    conn: &mut Connection,
    year: i32,
) -> Result<String, ExpedienteError> {
    for attempt in 1..=MAX_ATTEMPTS {
        match try_generate(conn, year) {
            Ok(number) => return Ok(number),
            Err(ExpedienteError::Database(DatabaseError::Sqlite(ref e)))
                if is_write_conflict(e) && attempt < MAX_ATTEMPTS =>
            {
                let pause = rand::thread_rng().gen_range(BACKOFF_MIN_MS..=BACKOFF_MAX_MS);
                tracing::debug!(attempt, pause_ms = pause, "Counter row contended, retrying");
                thread::sleep(Duration::from_millis(pause));
            }
            Err(ExpedienteError::Database(DatabaseError::Sqlite(ref e)))
                if is_write_conflict(e) =>
            {
                return Err(ExpedienteError::Exhausted);
            }
            Err(other) => return Err(other),
        }
    }

    Err(ExpedienteError::Exhausted)
}

/// One full generation attempt under the write lock.
fn try_generate(conn: &mut Connection, year: i32) -> Result<String, ExpedienteError> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(DatabaseError::from)?;

    let mut counter = match repo::get_counter(&tx, year)? {
        Some(current) => current + 1,
        None => 1,
    };
    let mut candidate = format_record_number(year, counter);

    // The counter can lag behind the patient table (restored backup,
    // manually inserted records). Skip past the highest suffix in use.
    if repo::record_number_exists(&tx, &candidate)? {
        counter = repo::max_suffix_for_year(&tx, year)? + 1;
        candidate = format_record_number(year, counter);
        if repo::record_number_exists(&tx, &candidate)? {
            return Err(ExpedienteError::Exhausted);
        }
        tracing::warn!(year, counter, "Counter was stale, advanced past existing records");
    }

    repo::put_counter(&tx, year, counter)?;
    tx.commit().map_err(DatabaseError::from)?;

    Ok(candidate)
}

fn format_record_number(year: i32, counter: i64) -> String {
    format!("{year}-{counter}")
}

fn is_write_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked
    )
}
