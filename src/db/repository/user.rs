use std::str::FromStr;

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{Role, User};

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, middle_name, \
     last_name, second_last_name, role, created_at";

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, first_name, middle_name,
         last_name, second_last_name, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            user.id.to_string(),
            user.username,
            user.email,
            user.password_hash,
            user.first_name,
            user.middle_name,
            user.last_name,
            user.second_last_name,
            user.role.as_str(),
            user.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_user_by_id(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    query_optional(
        conn,
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        &id.to_string(),
    )
}

/// Username comparison is case-insensitive (column collation).
pub fn get_user_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<User>, DatabaseError> {
    query_optional(
        conn,
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
        username,
    )
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    query_optional(
        conn,
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
        email,
    )
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map([], user_from_row)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    Ok(users)
}

/// Update profile fields. Returns false when the user does not exist.
pub fn update_user(conn: &Connection, user: &User) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE users SET email = ?2, first_name = ?3, middle_name = ?4,
         last_name = ?5, second_last_name = ?6 WHERE id = ?1",
        params![
            user.id.to_string(),
            user.email,
            user.first_name,
            user.middle_name,
            user.last_name,
            user.second_last_name,
        ],
    )?;
    Ok(rows > 0)
}

pub fn update_password(
    conn: &Connection,
    id: &Uuid,
    password_hash: &str,
) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE users SET password_hash = ?2 WHERE id = ?1",
        params![id.to_string(), password_hash],
    )?;
    Ok(rows > 0)
}

pub fn delete_user(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
    Ok(rows > 0)
}

fn query_optional(
    conn: &Connection,
    sql: &str,
    param: &str,
) -> Result<Option<User>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    match stmt.query_row(params![param], user_from_row) {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let role: String = row.get(8)?;
    Ok(User {
        id: Uuid::parse_str(&id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        first_name: row.get(4)?,
        middle_name: row.get(5)?,
        last_name: row.get(6)?,
        second_last_name: row.get(7)?,
        role: Role::from_str(&role).unwrap_or(Role::User),
        created_at: row.get(9)?,
    })
}
