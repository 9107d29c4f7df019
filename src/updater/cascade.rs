/// Post-processing passes run once all sources have been loaded
///
/// Each pass runs only when one of the tables it reads was written during
/// this run, and passes run in dependency order: merges settle first, then
/// builds, then names, then zones. Indexes dropped for bulk loading are
/// rebuilt before a pass queries a table and restored for good at the end.
use anyhow::{Context, Result};
use loki_storage::rusqlite::Connection;
use loki_storage::{settings, Schema, Table};
use tracing::{debug, info, info_span};

use super::builds::{update_builds, BuildReport, LiftSettings};
use super::tables::TableTracker;
use super::zones::{rebuild_zones, ZoneStats};
use crate::liftover::ChainStore;
use crate::merge;
use crate::names::{
    resolve_biopolymer_names, resolve_group_members, resolve_snp_roles, MemberResolutionStats,
    NameResolutionStats, RoleResolutionStats,
};

#[derive(Debug, Clone, Copy)]
pub struct CascadeSettings {
    pub hop_limit: usize,
    pub lift: LiftSettings,
    /// Re-derive the target build even if no coordinate table changed,
    /// e.g. because a source reported a different build
    pub check_builds: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeReport {
    pub merges_removed: usize,
    pub merges_flattened: usize,
    pub loci_propagated: usize,
    pub loci_removed: usize,
    pub roles_propagated: usize,
    pub roles_removed: usize,
    pub gwas_propagated: usize,
    pub builds: Option<BuildReport>,
    pub names: Option<NameResolutionStats>,
    pub snp_roles: Option<RoleResolutionStats>,
    pub members: Option<MemberResolutionStats>,
    pub zones: Option<ZoneStats>,
    pub reindexed: Vec<Table>,
}

pub fn run_cascade(
    conn: &Connection,
    schema: &Schema,
    tables: &mut TableTracker,
    chains: &mut ChainStore,
    cascade: CascadeSettings,
) -> Result<CascadeReport> {
    let _span = info_span!("cascade").entered();
    let mut report = CascadeReport::default();

    if tables.is_updated(Table::SnpMerge) {
        tables.prepare_for_query(conn, schema, Table::SnpMerge)?;
        report.merges_removed = merge::dedup_merges(conn)?;
        report.merges_flattened = merge::flatten_stored_merges(conn, cascade.hop_limit)?;
        info!(
            "{} duplicate SNP merges removed, {} merge chains flattened",
            report.merges_removed, report.merges_flattened
        );
    }

    if tables.any_updated(&[Table::SnpMerge, Table::SnpLocus]) {
        tables.prepare_for_query(conn, schema, Table::SnpMerge)?;
        tables.prepare_for_query(conn, schema, Table::SnpLocus)?;
        report.loci_propagated = merge::propagate_loci(conn).context("Failed to propagate SNP loci")?;
        if report.loci_propagated > 0 {
            tables.flag_updated(Table::SnpLocus);
        }
        info!("{} SNP loci added for merged SNPs", report.loci_propagated);
    }

    if tables.is_updated(Table::SnpLocus) {
        report.loci_removed = merge::dedup_loci(conn)?;
        info!("{} duplicate SNP loci removed", report.loci_removed);
    }

    if tables.any_updated(&[Table::SnpMerge, Table::SnpEntrezRole]) {
        tables.prepare_for_query(conn, schema, Table::SnpMerge)?;
        tables.prepare_for_query(conn, schema, Table::SnpEntrezRole)?;
        report.roles_propagated = merge::propagate_roles(conn).context("Failed to propagate SNP roles")?;
        if report.roles_propagated > 0 {
            tables.flag_updated(Table::SnpEntrezRole);
        }
        info!("{} SNP roles added for merged SNPs", report.roles_propagated);
    }

    if tables.is_updated(Table::SnpEntrezRole) {
        report.roles_removed = merge::dedup_roles(conn)?;
        info!("{} duplicate SNP roles removed", report.roles_removed);
    }

    if tables.any_updated(&[Table::SnpMerge, Table::Gwas]) {
        tables.prepare_for_query(conn, schema, Table::SnpMerge)?;
        tables.prepare_for_query(conn, schema, Table::Gwas)?;
        report.gwas_propagated = merge::propagate_gwas(conn).context("Failed to propagate GWAS annotations")?;
        if report.gwas_propagated > 0 {
            tables.flag_updated(Table::Gwas);
        }
        debug!("{} GWAS annotations added for merged SNPs", report.gwas_propagated);
    }

    if cascade.check_builds
        || tables.any_updated(&[
            Table::SnpLocus,
            Table::BiopolymerRegion,
            Table::GrchUcschg,
            Table::Chain,
            Table::ChainData,
        ])
    {
        tables.prepare_for_query(conn, schema, Table::Source)?;
        report.builds = Some(update_builds(conn, schema, tables, chains, cascade.lift)?);
    }

    if tables.any_updated(&[Table::BiopolymerName, Table::BiopolymerNameName]) {
        for table in [Table::BiopolymerNameName, Table::BiopolymerName, Table::Biopolymer] {
            tables.prepare_for_query(conn, schema, table)?;
        }
        report.names = Some(resolve_biopolymer_names(conn).context("Failed to resolve biopolymer names")?);
        tables.flag_updated(Table::BiopolymerName);
    }

    if tables.any_updated(&[Table::BiopolymerName, Table::SnpEntrezRole]) {
        tables.prepare_for_query(conn, schema, Table::SnpEntrezRole)?;
        tables.prepare_for_query(conn, schema, Table::BiopolymerName)?;
        report.snp_roles = Some(resolve_snp_roles(conn).context("Failed to resolve SNP roles")?);
        tables.flag_updated(Table::SnpBiopolymerRole);
    }

    if tables.any_updated(&[Table::BiopolymerName, Table::GroupMemberName]) {
        for table in [Table::GroupMemberName, Table::BiopolymerName, Table::GroupBiopolymer] {
            tables.prepare_for_query(conn, schema, table)?;
        }
        report.members = Some(resolve_group_members(conn).context("Failed to resolve group members")?);
        tables.flag_updated(Table::GroupBiopolymer);
    }

    if tables.is_updated(Table::BiopolymerRegion) {
        tables.prepare_for_query(conn, schema, Table::BiopolymerRegion)?;
        tables.prepare_for_update(conn, schema, Table::BiopolymerZone)?;
        report.zones = Some(rebuild_zones(conn)?);
    }

    report.reindexed = tables.restore_indexes(conn, schema)?;
    if !report.reindexed.is_empty() {
        debug!("Rebuilt indexes on {} tables", report.reindexed.len());
    }

    if tables.updated().next().is_some() {
        settings::set_optimized(conn, false)?;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loki_storage::rusqlite::params;
    use loki_storage::KnowledgeDb;
    use pretty_assertions::assert_eq;

    fn cascade() -> CascadeSettings {
        CascadeSettings {
            hop_limit: merge::DEFAULT_HOP_LIMIT,
            lift: LiftSettings { batch_size: 100, min_coverage: 0.95 },
            check_builds: false,
        }
    }

    #[test]
    fn test_nothing_updated_runs_nothing() {
        let mut db = KnowledgeDb::open_in_memory(Schema::knowledge()).unwrap();
        let (conn, schema) = db.parts_mut();
        settings::set_optimized(conn, true).unwrap();

        let mut tables = TableTracker::new();
        let report = run_cascade(conn, schema, &mut tables, &mut ChainStore::new(), cascade()).unwrap();

        assert_eq!(report, CascadeReport::default());
        assert!(settings::is_optimized(conn).unwrap());
    }

    #[test]
    fn test_merge_passes_and_index_restore() {
        let mut db = KnowledgeDb::open_in_memory(Schema::knowledge()).unwrap();
        let (conn, schema) = db.parts_mut();
        let mut tables = TableTracker::new();
        tables.prepare_for_update(conn, schema, Table::SnpMerge).unwrap();
        tables.prepare_for_update(conn, schema, Table::SnpLocus).unwrap();
        for (merged, current) in [(100, 105), (105, 110), (100, 999)] {
            conn.execute(
                "INSERT INTO snp_merge (rs_merged, rs_current, source_id) VALUES (?1, ?2, 1)",
                params![merged, current],
            )
            .unwrap();
        }
        conn.execute(
            "INSERT INTO snp_locus (rs, chr, pos, validated, source_id) VALUES (100, 1, 500, 1, 1)",
            [],
        )
        .unwrap();

        let report = run_cascade(conn, schema, &mut tables, &mut ChainStore::new(), cascade()).unwrap();
        assert_eq!(report.merges_removed, 1);
        assert_eq!(report.merges_flattened, 1);
        assert_eq!(report.loci_propagated, 1);
        // both tables were queried mid-cascade, so nothing was left to restore
        assert!(report.reindexed.is_empty());
        assert_eq!(tables.deindexed().count(), 0);
        assert!(!settings::is_optimized(conn).unwrap());

        let current: i64 = conn
            .query_row("SELECT rs_current FROM snp_merge WHERE rs_merged = 100", [], |row| row.get(0))
            .unwrap();
        assert_eq!(current, 110);
    }

    #[test]
    fn test_merge_cycle_aborts() {
        let mut db = KnowledgeDb::open_in_memory(Schema::knowledge()).unwrap();
        let (conn, schema) = db.parts_mut();
        let mut tables = TableTracker::new();
        tables.flag_updated(Table::SnpMerge);
        conn.execute_batch(
            "INSERT INTO snp_merge (rs_merged, rs_current, source_id) VALUES (1, 2, 1), (2, 1, 1);",
        )
        .unwrap();

        let err = run_cascade(conn, schema, &mut tables, &mut ChainStore::new(), cascade()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<loki_core::LokiError>(),
            Some(loki_core::LokiError::MergeCycle { .. })
        ));
    }
}
