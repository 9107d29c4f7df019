/// Genome-build bookkeeping and the liftover pass over stored coordinates
use std::collections::BTreeMap;

use anyhow::{Context, Result};
use loki_core::{Build, Chromosome, SourceId};
use loki_storage::rusqlite::{params, Connection};
use loki_storage::{settings, Schema, Table};
use tracing::{debug, error, info, warn};

use super::tables::TableTracker;
use crate::liftover::{ChainStore, LiftTally, LiftoverEngine, Region};

/// Tables whose change invalidates every previously lifted coordinate
const CHAIN_TABLES: [Table; 3] = [Table::GrchUcschg, Table::Chain, Table::ChainData];

#[derive(Debug, Clone, Copy)]
pub struct LiftSettings {
    pub batch_size: usize,
    pub min_coverage: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub target: Option<Build>,
    pub target_changed: bool,
    pub loci: LiftTally,
    pub regions: LiftTally,
    /// Old builds left unlifted for want of chains
    pub missing_chains: Vec<Build>,
}

/// Fill in whichever of `grch` / `ucschg` each source left out, and default
/// `current_ucschg` to the reported build
pub fn cross_map_builds(conn: &Connection) -> Result<()> {
    conn.execute(
        "UPDATE source SET grch = (SELECT g.grch FROM grch_ucschg AS g WHERE g.ucschg = source.ucschg) \
         WHERE grch IS NULL AND ucschg IS NOT NULL \
           AND EXISTS (SELECT 1 FROM grch_ucschg AS g WHERE g.ucschg = source.ucschg)",
        [],
    )?;
    conn.execute(
        "UPDATE source SET ucschg = (SELECT g.ucschg FROM grch_ucschg AS g WHERE g.grch = source.grch) \
         WHERE ucschg IS NULL AND grch IS NOT NULL \
           AND EXISTS (SELECT 1 FROM grch_ucschg AS g WHERE g.grch = source.grch)",
        [],
    )?;
    conn.execute(
        "UPDATE source SET current_ucschg = ucschg WHERE current_ucschg IS NULL AND ucschg IS NOT NULL",
        [],
    )?;

    let mut stmt = conn.prepare(
        "SELECT source, grch, ucschg FROM source WHERE (grch IS NULL) != (ucschg IS NULL)",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?, row.get::<_, Option<i64>>(2)?))
    })?;
    for row in rows {
        let (name, grch, ucschg) = row?;
        match (grch, ucschg) {
            (Some(grch), None) => warn!("Unrecognized GRCh{} reported by '{}'", grch, name),
            (None, Some(ucschg)) => warn!("Unrecognized hg{} reported by '{}'", ucschg, name),
            _ => {}
        }
    }
    Ok(())
}

/// The most common `current_ucschg` among sources; ties go to the newest
pub fn choose_target_build(conn: &Connection) -> Result<Option<Build>> {
    let mut stmt = conn.prepare(
        "SELECT current_ucschg, COUNT() AS n FROM source WHERE current_ucschg IS NOT NULL \
         GROUP BY current_ucschg ORDER BY n DESC, current_ucschg DESC LIMIT 1",
    )?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

/// Sources whose stored coordinates are not yet on `target`, by build
pub fn sources_behind(conn: &Connection, target: Build) -> Result<BTreeMap<Build, Vec<SourceId>>> {
    let mut stmt = conn.prepare(
        "SELECT current_ucschg, source_id FROM source \
         WHERE current_ucschg IS NOT NULL AND current_ucschg != ?1 ORDER BY source_id",
    )?;
    let rows = stmt.query_map(params![target], |row| Ok((row.get::<_, Build>(0)?, row.get(1)?)))?;
    let mut behind: BTreeMap<Build, Vec<SourceId>> = BTreeMap::new();
    for row in rows {
        let (build, source) = row?;
        behind.entry(build).or_default().push(source);
    }
    Ok(behind)
}

/// Settle the target build and lift every out-of-date source onto it
///
/// A build pair without chains is logged and its sources left where they
/// are; the rest of the pass continues.
pub fn update_builds(
    conn: &Connection,
    schema: &Schema,
    tables: &mut TableTracker,
    chains: &mut ChainStore,
    lift: LiftSettings,
) -> Result<BuildReport> {
    let mut report = BuildReport::default();
    cross_map_builds(conn)?;

    let Some(target) = choose_target_build(conn)? else {
        debug!("No source reported a genome build");
        return Ok(report);
    };
    report.target = Some(target);
    if settings::target_build(conn)? != Some(target) {
        info!("Target genome build is now {}", target);
        settings::set(conn, settings::UCSCHG, &target.value().to_string())?;
        report.target_changed = true;
    }

    let chains_changed = tables.any_updated(&CHAIN_TABLES);
    if chains_changed {
        chains.invalidate();
    }

    for (old_build, sources) in sources_behind(conn, target)? {
        if !ChainStore::has_chains(conn, old_build, target)? {
            error!("No chains available to lift {} to {}", old_build, target);
            report.missing_chains.push(old_build);
            continue;
        }
        for table in CHAIN_TABLES {
            tables.prepare_for_query(conn, schema, table)?;
        }
        let engine = LiftoverEngine::new(chains.get_or_load(conn, old_build, target)?)
            .with_min_coverage(lift.min_coverage);
        let rerun = report.target_changed || chains_changed;

        if rerun || tables.is_updated(Table::SnpLocus) {
            tables.prepare_for_update(conn, schema, Table::SnpLocus)?;
            let tally = lift_snp_loci(conn, &engine, &sources, lift.batch_size)
                .with_context(|| format!("Failed to lift SNP loci from {}", old_build))?;
            info!("{} loci lifted over from {}, {} dropped", tally.lifted, old_build, tally.dropped);
            report.loci.merge(tally);
        }
        if rerun || tables.is_updated(Table::BiopolymerRegion) {
            tables.prepare_for_update(conn, schema, Table::BiopolymerRegion)?;
            let tally = lift_biopolymer_regions(conn, &engine, &sources, lift.batch_size)
                .with_context(|| format!("Failed to lift regions from {}", old_build))?;
            info!("{} regions lifted over from {}, {} dropped", tally.lifted, old_build, tally.dropped);
            report.regions.merge(tally);
        }

        conn.execute(
            &format!(
                "UPDATE source SET current_ucschg = ?1 WHERE source_id IN ({})",
                id_list(&sources)
            ),
            params![target],
        )?;
    }
    Ok(report)
}

fn id_list(sources: &[SourceId]) -> String {
    sources
        .iter()
        .map(|id| id.value().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Inclusive rowid windows of at most `batch_size` rows covering `table`
fn rowid_batches(conn: &Connection, table: Table, batch_size: usize) -> Result<Vec<(i64, i64)>> {
    let (min, max): (Option<i64>, Option<i64>) = conn.query_row(
        &format!("SELECT MIN(rowid), MAX(rowid) FROM {}", table.ident()),
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let (Some(min), Some(max)) = (min, max) else {
        return Ok(Vec::new());
    };
    let step = batch_size.max(1) as i64;
    let mut batches = Vec::new();
    let mut low = min;
    while low <= max {
        batches.push((low, (low + step - 1).min(max)));
        low += step;
    }
    Ok(batches)
}

pub fn lift_snp_loci(
    conn: &Connection,
    engine: &LiftoverEngine,
    sources: &[SourceId],
    batch_size: usize,
) -> Result<LiftTally> {
    let select = format!(
        "SELECT rowid, chr, pos FROM snp_locus WHERE rowid BETWEEN ?1 AND ?2 AND source_id IN ({})",
        id_list(sources)
    );
    let mut tally = LiftTally::default();
    for (low, high) in rowid_batches(conn, Table::SnpLocus, batch_size)? {
        let rows: Vec<(i64, Chromosome, i64)> = {
            let mut stmt = conn.prepare_cached(&select)?;
            let rows = stmt.query_map(params![low, high], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
            rows.collect::<Result<_, _>>()?
        };
        let mut update = conn.prepare_cached("UPDATE OR REPLACE snp_locus SET chr = ?2, pos = ?3 WHERE rowid = ?1")?;
        let mut delete = conn.prepare_cached("DELETE FROM snp_locus WHERE rowid = ?1")?;
        for (rowid, chr, pos) in rows {
            match engine.lift_point(chr, pos) {
                Some(lifted) => {
                    update.execute(params![rowid, lifted.chr, lifted.start])?;
                    tally.lifted += 1;
                }
                None => {
                    delete.execute(params![rowid])?;
                    tally.dropped += 1;
                }
            }
        }
    }
    Ok(tally)
}

pub fn lift_biopolymer_regions(
    conn: &Connection,
    engine: &LiftoverEngine,
    sources: &[SourceId],
    batch_size: usize,
) -> Result<LiftTally> {
    let select = format!(
        "SELECT rowid, chr, pos_min, pos_max FROM biopolymer_region \
         WHERE rowid BETWEEN ?1 AND ?2 AND source_id IN ({})",
        id_list(sources)
    );
    let mut tally = LiftTally::default();
    for (low, high) in rowid_batches(conn, Table::BiopolymerRegion, batch_size)? {
        let rows: Vec<(i64, Region)> = {
            let mut stmt = conn.prepare_cached(&select)?;
            let rows = stmt.query_map(params![low, high], |row| {
                Ok((row.get(0)?, Region::new(row.get(1)?, row.get(2)?, row.get(3)?)))
            })?;
            rows.collect::<Result<_, _>>()?
        };
        let mut update = conn.prepare_cached(
            "UPDATE OR REPLACE biopolymer_region SET chr = ?2, pos_min = ?3, pos_max = ?4 WHERE rowid = ?1",
        )?;
        let mut delete = conn.prepare_cached("DELETE FROM biopolymer_region WHERE rowid = ?1")?;
        for (rowid, region) in rows {
            match engine.lift(region) {
                Some(lifted) => {
                    update.execute(params![rowid, lifted.chr, lifted.start, lifted.end])?;
                    tally.lifted += 1;
                }
                None => {
                    delete.execute(params![rowid])?;
                    tally.dropped += 1;
                }
            }
        }
    }
    Ok(tally)
}
