//! Explicit schema descriptor for the knowledge store
//!
//! The descriptor is a plain value: an ordered list of table definitions, each
//! with its secondary indexes and seed rows. It is constructed once and handed
//! to [`crate::KnowledgeDb::open`], which creates or audits the objects it names.

mod knowledge;

use rusqlite::types::Value;
use rusqlite::Connection;
use std::fmt;

/// Every table in the knowledge store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Setting,
    GrchUcschg,
    LdProfile,
    Namespace,
    Relationship,
    Role,
    Source,
    SourceOption,
    SourceFile,
    Type,
    Warning,
    SnpMerge,
    SnpLocus,
    SnpEntrezRole,
    SnpBiopolymerRole,
    Biopolymer,
    BiopolymerName,
    BiopolymerNameName,
    BiopolymerRegion,
    BiopolymerZone,
    Group,
    GroupName,
    GroupGroup,
    GroupBiopolymer,
    GroupMemberName,
    Gwas,
    Chain,
    ChainData,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Setting => "setting",
            Table::GrchUcschg => "grch_ucschg",
            Table::LdProfile => "ldprofile",
            Table::Namespace => "namespace",
            Table::Relationship => "relationship",
            Table::Role => "role",
            Table::Source => "source",
            Table::SourceOption => "source_option",
            Table::SourceFile => "source_file",
            Table::Type => "type",
            Table::Warning => "warning",
            Table::SnpMerge => "snp_merge",
            Table::SnpLocus => "snp_locus",
            Table::SnpEntrezRole => "snp_entrez_role",
            Table::SnpBiopolymerRole => "snp_biopolymer_role",
            Table::Biopolymer => "biopolymer",
            Table::BiopolymerName => "biopolymer_name",
            Table::BiopolymerNameName => "biopolymer_name_name",
            Table::BiopolymerRegion => "biopolymer_region",
            Table::BiopolymerZone => "biopolymer_zone",
            Table::Group => "group",
            Table::GroupName => "group_name",
            Table::GroupGroup => "group_group",
            Table::GroupBiopolymer => "group_biopolymer",
            Table::GroupMemberName => "group_member_name",
            Table::Gwas => "gwas",
            Table::Chain => "chain",
            Table::ChainData => "chain_data",
        }
    }

    /// Quoted identifier, safe for `group` and `type`
    pub fn ident(&self) -> String {
        format!("\"{}\"", self.name())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct IndexDef {
    /// Suffix; the stored index name is `<table>__<name>`
    pub name: &'static str,
    pub columns: &'static str,
}

#[derive(Debug, Clone)]
pub struct TableDef {
    pub table: Table,
    /// Column and constraint list, without the surrounding parentheses
    pub columns: &'static str,
    pub indexes: Vec<IndexDef>,
    /// Rows inserted (or ignored) whenever the table is created or audited
    pub seed: Vec<Vec<Value>>,
    /// Whether rows carry a `source_id` provenance column
    pub has_provenance: bool,
    /// Loader staging data that finalization empties
    pub intermediate: bool,
}

impl TableDef {
    pub fn create_sql(&self) -> String {
        format!("CREATE TABLE {} ({})", self.table.ident(), self.columns)
    }

    pub fn index_name(&self, index: &IndexDef) -> String {
        format!("{}__{}", self.table.name(), index.name)
    }

    pub fn create_index_sql(&self, index: &IndexDef) -> String {
        format!(
            "CREATE INDEX \"{}\" ON {} ({})",
            self.index_name(index),
            self.table.ident(),
            index.columns
        )
    }
}

/// Ordered set of table definitions
#[derive(Debug, Clone)]
pub struct Schema {
    /// Value stored in the `schema` setting
    pub version: u32,
    tables: Vec<TableDef>,
}

impl Schema {
    pub fn new(version: u32, tables: Vec<TableDef>) -> Self {
        Self { version, tables }
    }

    /// The full knowledge store layout
    pub fn knowledge() -> Self {
        knowledge::definition()
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    pub fn table(&self, table: Table) -> Option<&TableDef> {
        self.tables.iter().find(|def| def.table == table)
    }

    pub fn provenance_tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.iter().filter(|def| def.has_provenance)
    }

    pub fn intermediate_tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.iter().filter(|def| def.intermediate)
    }

    /// Drop a table's secondary indexes, returning whether it had any
    pub fn drop_indexes(&self, conn: &Connection, table: Table) -> anyhow::Result<bool> {
        let Some(def) = self.table(table) else {
            return Ok(false);
        };
        for index in &def.indexes {
            conn.execute_batch(&format!("DROP INDEX IF EXISTS \"{}\"", def.index_name(index)))?;
        }
        Ok(!def.indexes.is_empty())
    }

    /// Create any of a table's secondary indexes that are missing
    pub fn create_indexes(&self, conn: &Connection, table: Table) -> anyhow::Result<()> {
        let Some(def) = self.table(table) else {
            return Ok(());
        };
        for index in &def.indexes {
            conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS \"{}\" ON {} ({})",
                def.index_name(index),
                def.table.ident(),
                index.columns
            ))?;
        }
        Ok(())
    }
}

/// Collapse whitespace so stored and expected DDL compare structurally
pub(crate) fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("( ", "(")
        .replace(" )", ")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_knowledge_schema_is_ordered_and_unique() {
        let schema = Schema::knowledge();
        let names: Vec<_> = schema.tables().iter().map(|def| def.table.name()).collect();
        let unique: HashSet<_> = names.iter().collect();

        assert_eq!(names.len(), unique.len());
        assert_eq!(names.first(), Some(&"setting"));
        assert!(schema.table(Table::ChainData).is_some());
    }

    #[test]
    fn test_index_names_are_prefixed() {
        let schema = Schema::knowledge();
        let def = schema.table(Table::SnpLocus).unwrap();
        let names: Vec<_> = def.indexes.iter().map(|i| def.index_name(i)).collect();

        assert!(names.contains(&"snp_locus__rs_chr_pos".to_string()));
        assert!(names.contains(&"snp_locus__chr_pos_rs".to_string()));
    }

    #[test]
    fn test_group_table_is_quoted() {
        let schema = Schema::knowledge();
        let sql = schema.table(Table::Group).unwrap().create_sql();
        assert!(sql.starts_with("CREATE TABLE \"group\" ("));
    }

    #[test]
    fn test_intermediate_tables() {
        let schema = Schema::knowledge();
        let tables: Vec<_> = schema.intermediate_tables().map(|def| def.table).collect();
        assert_eq!(
            tables,
            vec![Table::SnpEntrezRole, Table::BiopolymerNameName, Table::GroupMemberName]
        );
    }

    #[test]
    fn test_normalize_sql() {
        assert_eq!(
            normalize_sql("CREATE TABLE \"x\" (\n  a INTEGER,\n  b TEXT\n)"),
            "CREATE TABLE \"x\" (a INTEGER, b TEXT)"
        );
    }
}
