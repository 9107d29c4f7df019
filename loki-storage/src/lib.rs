//! SQLite-backed storage for the Loki knowledge store

pub mod catalog;
pub mod database;
pub mod maintenance;
pub mod schema;
pub mod settings;

pub use catalog::{LdProfileSpec, NamespaceInfo, RoleSpec, SourceRecord};
pub use database::{audit_schema, ensure_writeable, AuditReport, KnowledgeDb, DEFAULT_CACHE_SIZE_KIB};
pub use schema::{IndexDef, Schema, Table, TableDef};

// Re-exported so dependants name one rusqlite version
pub use rusqlite;
