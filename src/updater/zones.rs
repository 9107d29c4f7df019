/// Fixed-size coordinate tiles over biopolymer regions
use std::ops::RangeInclusive;

use anyhow::{Context, Result};
use loki_core::{BiopolymerId, Chromosome};
use loki_storage::rusqlite::{params, Connection};
use loki_storage::settings;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneStats {
    pub zones: usize,
    pub biopolymers: usize,
    /// Regions whose bounds were stored reversed
    pub swapped: usize,
}

/// Tiles touched by `[pos_min, pos_max]`
pub fn zones_for(zone_size: i64, pos_min: i64, pos_max: i64) -> RangeInclusive<i64> {
    (pos_min / zone_size)..=(pos_max / zone_size)
}

/// Rebuild `biopolymer_zone` from `biopolymer_region`
///
/// One zone row per tile spanned by each biopolymer's overall extent on a
/// chromosome, across all of its regions and LD profiles.
pub fn rebuild_zones(conn: &Connection) -> Result<ZoneStats> {
    let zone_size = settings::zone_size(conn).context("Cannot calculate biopolymer zones")?;
    let mut stats = ZoneStats::default();

    stats.swapped = conn.execute(
        "UPDATE OR REPLACE biopolymer_region SET pos_min = pos_max, pos_max = pos_min \
         WHERE pos_min > pos_max",
        [],
    )?;
    conn.execute("DELETE FROM biopolymer_zone", [])?;

    let extents: Vec<(BiopolymerId, Chromosome, i64, i64)> = {
        let mut stmt = conn.prepare(
            "SELECT biopolymer_id, chr, MIN(pos_min), MAX(pos_max) FROM biopolymer_region \
             GROUP BY biopolymer_id, chr ORDER BY biopolymer_id, chr",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?;
        rows.collect::<Result<_, _>>()?
    };

    let mut insert = conn.prepare_cached(
        "INSERT OR IGNORE INTO biopolymer_zone (biopolymer_id, chr, zone) VALUES (?1, ?2, ?3)",
    )?;
    let mut last = None;
    for (biopolymer, chr, pos_min, pos_max) in extents {
        if last != Some(biopolymer) {
            stats.biopolymers += 1;
            last = Some(biopolymer);
        }
        for zone in zones_for(zone_size, pos_min, pos_max) {
            stats.zones += insert.execute(params![biopolymer, chr, zone])?;
        }
    }

    info!("{} zones for {} biopolymers", stats.zones, stats.biopolymers);
    Ok(stats)
}
