//! Finalization, optimization and table statistics

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

use crate::schema::{Schema, Table};
use crate::settings;

/// Empty the loader staging tables and mark the store read-only for updates
pub fn finalize(conn: &Connection, schema: &Schema) -> Result<Vec<Table>> {
    let mut emptied = Vec::new();
    for def in schema.intermediate_tables() {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", def.table.ident()))?;
        conn.execute_batch(&def.create_sql())
            .with_context(|| format!("Failed to recreate table '{}'", def.table))?;
        schema.create_indexes(conn, def.table)?;
        emptied.push(def.table);
    }
    settings::set(conn, settings::FINALIZED, "1")?;
    settings::set_optimized(conn, false)?;
    info!("Finalized database; emptied {} intermediate tables", emptied.len());
    Ok(emptied)
}

/// Refresh planner statistics and compact the file
pub fn optimize(conn: &Connection) -> Result<()> {
    info!("Analyzing database tables");
    conn.execute_batch("ANALYZE").context("Failed to analyze database")?;
    info!("Compacting database file");
    conn.execute_batch("VACUUM").context("Failed to vacuum database")?;
    settings::set_optimized(conn, true)?;
    Ok(())
}

/// Row count for every table in the descriptor, in descriptor order
pub fn row_counts(conn: &Connection, schema: &Schema) -> Result<Vec<(Table, i64)>> {
    schema
        .tables()
        .iter()
        .map(|def| {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT() FROM {}", def.table.ident()),
                [],
                |row| row.get(0),
            )?;
            Ok((def.table, count))
        })
        .collect()
}
