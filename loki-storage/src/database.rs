/// Knowledge store connection, schema creation and audit
use anyhow::{Context, Result};
use loki_core::LokiError;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::schema::{normalize_sql, Schema, Table, TableDef};
use crate::settings;

pub const DEFAULT_CACHE_SIZE_KIB: u32 = 32768;

/// What the schema audit changed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub tables_created: Vec<Table>,
    pub tables_repaired: Vec<Table>,
    pub indexes_created: Vec<String>,
    pub indexes_repaired: Vec<String>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.tables_created.is_empty()
            && self.tables_repaired.is_empty()
            && self.indexes_created.is_empty()
            && self.indexes_repaired.is_empty()
    }
}

/// An open knowledge store bound to the schema it was audited against
pub struct KnowledgeDb {
    conn: Connection,
    schema: Schema,
    path: Option<PathBuf>,
}

impl KnowledgeDb {
    /// Open (creating if needed) a store file and audit it against `schema`
    pub fn open<P: AsRef<Path>>(path: P, schema: Schema) -> Result<Self> {
        Self::open_with_cache(path, schema, DEFAULT_CACHE_SIZE_KIB)
    }

    pub fn open_with_cache<P: AsRef<Path>>(
        path: P,
        schema: Schema,
        cache_size_kib: u32,
    ) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open knowledge database {}", path.display()))?;
        let db = Self {
            conn,
            schema,
            path: Some(path.to_path_buf()),
        };
        db.initialize(cache_size_kib)?;
        Ok(db)
    }

    pub fn open_in_memory(schema: Schema) -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let db = Self {
            conn,
            schema,
            path: None,
        };
        db.initialize(DEFAULT_CACHE_SIZE_KIB)?;
        Ok(db)
    }

    fn initialize(&self, cache_size_kib: u32) -> Result<()> {
        configure(&self.conn, cache_size_kib)?;
        let report = audit_schema(&self.conn, &self.schema)?;
        if !report.is_clean() {
            info!(
                "Schema audit: {} tables created, {} repaired, {} indexes created, {} repaired",
                report.tables_created.len(),
                report.tables_repaired.len(),
                report.indexes_created.len(),
                report.indexes_repaired.len()
            );
        }
        self.check_schema_version()
    }

    fn check_schema_version(&self) -> Result<()> {
        let stored = settings::get(&self.conn, settings::SCHEMA)?
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(0);
        if stored > self.schema.version {
            return Err(LokiError::SchemaMismatch(format!(
                "database schema version {} is newer than supported version {}",
                stored, self.schema.version
            ))
            .into());
        }
        if stored < self.schema.version {
            debug!("Upgrading schema version {} -> {}", stored, self.schema.version);
            settings::set(&self.conn, settings::SCHEMA, &self.schema.version.to_string())?;
        }
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Split borrow: the schema alongside a mutable connection
    pub fn parts_mut(&mut self) -> (&mut Connection, &Schema) {
        (&mut self.conn, &self.schema)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Fail with [`LokiError::ReadOnly`] unless a write can be made
    pub fn ensure_writeable(&self) -> Result<()> {
        ensure_writeable(&self.conn, self.path.as_deref())
    }

    pub fn audit(&self) -> Result<AuditReport> {
        audit_schema(&self.conn, &self.schema)
    }
}

fn configure(conn: &Connection, cache_size_kib: u32) -> Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA page_size = 4096;
         PRAGMA cache_size = -{};
         PRAGMA synchronous = OFF;
         PRAGMA foreign_keys = OFF;",
        cache_size_kib
    ))
    .context("Failed to configure database")?;
    // journal_mode returns a row, so it cannot go through execute_batch
    let mode: String = conn.query_row("PRAGMA journal_mode = MEMORY", [], |row| row.get(0))?;
    debug!("Journal mode: {}", mode);
    Ok(())
}

pub fn ensure_writeable(conn: &Connection, path: Option<&Path>) -> Result<()> {
    let probe = conn.execute(
        "UPDATE setting SET value = value WHERE setting = ?1",
        params![settings::SCHEMA],
    );
    match probe {
        Ok(_) => Ok(()),
        Err(err) => {
            let target = path
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string());
            Err(LokiError::ReadOnly(format!("{}: {}", target, err)).into())
        }
    }
}

/// Create missing tables and indexes; rebuild ones whose definition drifted
pub fn audit_schema(conn: &Connection, schema: &Schema) -> Result<AuditReport> {
    let mut report = AuditReport::default();

    for def in schema.tables() {
        let stored = stored_sql(conn, "table", def.table.name())?;
        match stored {
            None => {
                create_table(conn, def)?;
                report.tables_created.push(def.table);
                continue;
            }
            Some(sql) if normalize_sql(&sql) != normalize_sql(&def.create_sql()) => {
                let rows: i64 = conn.query_row(
                    &format!("SELECT COUNT() FROM {}", def.table.ident()),
                    [],
                    |row| row.get(0),
                )?;
                if rows > 0 {
                    return Err(LokiError::SchemaMismatch(format!(
                        "table '{}' has {} rows and a different definition",
                        def.table, rows
                    ))
                    .into());
                }
                warn!("Rebuilding empty table '{}' with mismatched definition", def.table);
                conn.execute_batch(&format!("DROP TABLE {}", def.table.ident()))?;
                create_table(conn, def)?;
                report.tables_repaired.push(def.table);
                continue;
            }
            Some(_) => {}
        }

        seed_table(conn, def)?;

        for index in &def.indexes {
            let name = def.index_name(index);
            match stored_sql(conn, "index", &name)? {
                None => {
                    conn.execute_batch(&def.create_index_sql(index))?;
                    report.indexes_created.push(name);
                }
                Some(sql) if normalize_sql(&sql) != normalize_sql(&def.create_index_sql(index)) => {
                    conn.execute_batch(&format!("DROP INDEX \"{}\"", name))?;
                    conn.execute_batch(&def.create_index_sql(index))?;
                    report.indexes_repaired.push(name);
                }
                Some(_) => {}
            }
        }
    }

    Ok(report)
}

fn stored_sql(conn: &Connection, kind: &str, name: &str) -> Result<Option<String>> {
    let sql = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = ?1 AND name = ?2",
            params![kind, name],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?;
    Ok(sql.flatten())
}

fn create_table(conn: &Connection, def: &TableDef) -> Result<()> {
    conn.execute_batch(&def.create_sql())
        .with_context(|| format!("Failed to create table '{}'", def.table))?;
    for index in &def.indexes {
        conn.execute_batch(&def.create_index_sql(index))?;
    }
    seed_table(conn, def)
}

/// Insert seed rows whose leading key column is not yet present
fn seed_table(conn: &Connection, def: &TableDef) -> Result<()> {
    if def.seed.is_empty() {
        return Ok(());
    }
    let key_column = def
        .columns
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();
    for row in &def.seed {
        let Some(key) = row.first() else { continue };
        let exists = conn
            .query_row(
                &format!(
                    "SELECT 1 FROM {} WHERE {} = ?1",
                    def.table.ident(),
                    key_column
                ),
                [key],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            let placeholders = (1..=row.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            conn.execute(
                &format!("INSERT INTO {} VALUES ({})", def.table.ident(), placeholders),
                rusqlite::params_from_iter(row.iter()),
            )?;
        }
    }
    Ok(())
}
