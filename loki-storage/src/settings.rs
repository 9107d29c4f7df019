//! Key/value settings stored alongside the knowledge tables

use anyhow::Result;
use loki_core::{Build, LokiError};
use rusqlite::{params, Connection, OptionalExtension};

pub const SCHEMA: &str = "schema";
pub const UCSCHG: &str = "ucschg";
pub const ZONE_SIZE: &str = "zone_size";
pub const OPTIMIZED: &str = "optimized";
pub const FINALIZED: &str = "finalized";

pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM setting WHERE setting = ?1",
            params![key],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?;
    Ok(value.flatten())
}

pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO setting (setting, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

fn flag(conn: &Connection, key: &str) -> Result<bool> {
    Ok(get(conn, key)?
        .and_then(|value| value.trim().parse::<i64>().ok())
        .map(|value| value != 0)
        .unwrap_or(false))
}

pub fn is_finalized(conn: &Connection) -> Result<bool> {
    flag(conn, FINALIZED)
}

pub fn is_optimized(conn: &Connection) -> Result<bool> {
    flag(conn, OPTIMIZED)
}

pub fn set_optimized(conn: &Connection, optimized: bool) -> Result<()> {
    set(conn, OPTIMIZED, if optimized { "1" } else { "0" })
}

/// Zone tile size; a missing or non-positive value is an error
pub fn zone_size(conn: &Connection) -> Result<i64> {
    let raw = get(conn, ZONE_SIZE)?
        .ok_or_else(|| LokiError::NotFound("setting 'zone_size'".to_string()))?;
    match raw.trim().parse::<i64>() {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(LokiError::InvalidInput(format!("zone_size must be positive, got '{}'", raw)).into()),
    }
}

/// The build every source's coordinates have been lifted to
pub fn target_build(conn: &Connection) -> Result<Option<Build>> {
    Ok(get(conn, UCSCHG)?.and_then(|value| value.parse::<Build>().ok()))
}
