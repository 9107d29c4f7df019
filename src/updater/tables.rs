/// Tracks which tables an update run has written and which have had their
/// secondary indexes dropped for bulk loading.
use std::collections::BTreeSet;

use anyhow::Result;
use loki_storage::rusqlite::Connection;
use loki_storage::{Schema, Table};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableTracker {
    updated: BTreeSet<Table>,
    deindexed: BTreeSet<Table>,
}

impl TableTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a table as written and drop its indexes the first time
    pub fn prepare_for_update(
        &mut self,
        conn: &Connection,
        schema: &Schema,
        table: Table,
    ) -> Result<()> {
        self.updated.insert(table);
        if !self.deindexed.contains(&table) && schema.drop_indexes(conn, table)? {
            debug!("Dropped indexes on '{}' for bulk load", table);
            self.deindexed.insert(table);
        }
        Ok(())
    }

    /// Rebuild a table's indexes if this run dropped them
    pub fn prepare_for_query(
        &mut self,
        conn: &Connection,
        schema: &Schema,
        table: Table,
    ) -> Result<()> {
        if self.deindexed.remove(&table) {
            debug!("Rebuilding indexes on '{}'", table);
            schema.create_indexes(conn, table)?;
        }
        Ok(())
    }

    pub fn flag_updated(&mut self, table: Table) {
        self.updated.insert(table);
    }

    pub fn is_updated(&self, table: Table) -> bool {
        self.updated.contains(&table)
    }

    pub fn any_updated(&self, tables: &[Table]) -> bool {
        tables.iter().any(|table| self.updated.contains(table))
    }

    pub fn updated(&self) -> impl Iterator<Item = Table> + '_ {
        self.updated.iter().copied()
    }

    pub fn deindexed(&self) -> impl Iterator<Item = Table> + '_ {
        self.deindexed.iter().copied()
    }

    /// Rebuild every index still dropped; returns the tables touched
    pub fn restore_indexes(&mut self, conn: &Connection, schema: &Schema) -> Result<Vec<Table>> {
        let tables: Vec<Table> = std::mem::take(&mut self.deindexed).into_iter().collect();
        for table in &tables {
            schema.create_indexes(conn, *table)?;
        }
        Ok(tables)
    }
}
