/// Carrying SNP records forward to current rs numbers, and deduplication
///
/// Propagation copies rows keyed by a merged rs under its current rs. Each
/// copy is skipped if an identical row already exists, so running a pass
/// twice adds nothing the second time.
use anyhow::Result;
use loki_core::{Chromosome, Rs};
use loki_storage::rusqlite::{params, Connection};

use crate::names::{LookupTally, MatchBounds};

/// Drop all but the first merge recorded for each merged rs
pub fn dedup_merges(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM snp_merge WHERE rowid NOT IN ( \
           SELECT MIN(rowid) FROM snp_merge GROUP BY rs_merged)",
        [],
    )?)
}

pub fn propagate_loci(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(
        "INSERT INTO snp_locus (rs, chr, pos, validated, source_id) \
         SELECT sm.rs_current, sl.chr, sl.pos, sl.validated, sl.source_id \
         FROM snp_locus AS sl \
         JOIN snp_merge AS sm ON sm.rs_merged = sl.rs \
         WHERE NOT EXISTS ( \
           SELECT 1 FROM snp_locus AS x \
           WHERE x.rs = sm.rs_current AND x.chr = sl.chr AND x.pos = sl.pos \
             AND x.source_id = sl.source_id)",
        [],
    )?)
}

/// Collapse duplicate `(rs, chr, pos)` loci, keeping the row validated if
/// any duplicate was
pub fn dedup_loci(conn: &Connection) -> Result<usize> {
    conn.execute(
        "UPDATE snp_locus SET validated = 1 WHERE validated = 0 AND rowid IN ( \
           SELECT MIN(rowid) FROM snp_locus GROUP BY rs, chr, pos \
           HAVING COUNT() > 1 AND MAX(validated) > 0)",
        [],
    )?;
    Ok(conn.execute(
        "DELETE FROM snp_locus WHERE rowid NOT IN ( \
           SELECT MIN(rowid) FROM snp_locus GROUP BY rs, chr, pos)",
        [],
    )?)
}

pub fn propagate_roles(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(
        "INSERT INTO snp_entrez_role (rs, entrez_id, role_id, source_id) \
         SELECT sm.rs_current, ser.entrez_id, ser.role_id, ser.source_id \
         FROM snp_entrez_role AS ser \
         JOIN snp_merge AS sm ON sm.rs_merged = ser.rs \
         WHERE NOT EXISTS ( \
           SELECT 1 FROM snp_entrez_role AS x \
           WHERE x.rs = sm.rs_current AND x.entrez_id = ser.entrez_id \
             AND x.role_id = ser.role_id AND x.source_id = ser.source_id)",
        [],
    )?)
}

pub fn dedup_roles(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM snp_entrez_role WHERE rowid NOT IN ( \
           SELECT MIN(rowid) FROM snp_entrez_role GROUP BY rs, entrez_id, role_id)",
        [],
    )?)
}

pub fn propagate_gwas(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(
        "INSERT INTO gwas (rs, chr, pos, trait, snps, orbeta, allele95ci, risk_afreq, pubmed_id, source_id) \
         SELECT sm.rs_current, w.chr, w.pos, w.trait, w.snps, w.orbeta, w.allele95ci, \
                w.risk_afreq, w.pubmed_id, w.source_id \
         FROM gwas AS w \
         JOIN snp_merge AS sm ON sm.rs_merged = w.rs \
         WHERE NOT EXISTS ( \
           SELECT 1 FROM gwas AS x \
           WHERE x.rs = sm.rs_current AND x.trait = w.trait \
             AND x.pubmed_id IS w.pubmed_id AND x.snps IS w.snps \
             AND x.source_id = w.source_id)",
        [],
    )?)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurrentRsTally {
    pub merged: usize,
    pub unchanged: usize,
}

/// Map each rs to its current rs through the stored merges
pub fn current_rs(conn: &Connection, rses: &[Rs]) -> Result<(Vec<(Rs, Rs)>, CurrentRsTally)> {
    let mut stmt = conn.prepare_cached(
        "SELECT COALESCE((SELECT rs_current FROM snp_merge WHERE rs_merged = ?1), ?1)",
    )?;
    let mut tally = CurrentRsTally::default();
    let mut results = Vec::with_capacity(rses.len());
    for &rs in rses {
        let current: Rs = stmt.query_row(params![rs], |row| row.get(0))?;
        if current != rs {
            tally.merged += 1;
        } else {
            tally.unchanged += 1;
        }
        results.push((rs, current));
    }
    Ok((results, tally))
}

/// Loci for each rs, position ordered
///
/// Inputs whose locus count falls outside `bounds` go to `on_miss` as
/// `(index, rs, matches)` and are left out of the result.
pub fn snp_loci_by_rs<F>(
    conn: &Connection,
    rses: &[Rs],
    bounds: MatchBounds,
    validated: Option<bool>,
    mut on_miss: F,
) -> Result<(Vec<(Rs, Vec<(Chromosome, i64)>)>, LookupTally)>
where
    F: FnMut(usize, Rs, usize),
{
    let mut stmt = conn.prepare_cached(
        "SELECT chr, pos FROM snp_locus WHERE rs = ?1 AND (?2 IS NULL OR validated = ?2) \
         ORDER BY chr, pos",
    )?;
    let validated = validated.map(i64::from);
    let mut tally = LookupTally::default();
    let mut results = Vec::new();
    for (index, &rs) in rses.iter().enumerate() {
        let rows = stmt.query_map(params![rs, validated], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut loci: Vec<(Chromosome, i64)> = Vec::new();
        for row in rows {
            let locus = row?;
            if !loci.contains(&locus) {
                loci.push(locus);
            }
        }
        tally.record(loci.len());
        if bounds.contains(loci.len()) {
            results.push((rs, loci));
        } else {
            on_miss(index, rs, loci.len());
        }
    }
    Ok((results, tally))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{GwasAnnotation, SnpLocus, SourceWriter};
    use crate::updater::TableTracker;
    use loki_storage::{catalog, KnowledgeDb, Schema};
    use pretty_assertions::assert_eq;

    fn chr(code: i64) -> Chromosome {
        Chromosome::from_code(code).unwrap()
    }

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    fn seeded() -> KnowledgeDb {
        let db = KnowledgeDb::open_in_memory(Schema::knowledge()).unwrap();
        {
            let conn = db.connection();
            let source = catalog::add_source(conn, "snps").unwrap();
            let mut tracker = TableTracker::new();
            let mut writer = SourceWriter::new(conn, db.schema(), &mut tracker, source, "snps");
            writer.add_snp_merges(&[(100, 110), (100, 120), (200, 210)]).unwrap();
            writer
                .add_snp_loci(&[
                    SnpLocus { rs: 100, chr: chr(1), pos: 5000, validated: false },
                    SnpLocus { rs: 110, chr: chr(1), pos: 6000, validated: true },
                    SnpLocus { rs: 300, chr: chr(2), pos: 10, validated: false },
                ])
                .unwrap();
            writer
                .add_gwas_annotations(&[GwasAnnotation {
                    rs: Some(200),
                    trait_name: "height".to_string(),
                    pubmed_id: Some(1),
                    ..Default::default()
                }])
                .unwrap();
        }
        db
    }

    #[test]
    fn test_dedup_merges_keeps_first() {
        let db = seeded();
        let conn = db.connection();
        assert_eq!(dedup_merges(conn).unwrap(), 1);
        let (results, tally) = current_rs(conn, &[100, 200, 300]).unwrap();
        assert_eq!(results, vec![(100, 110), (200, 210), (300, 300)]);
        assert_eq!(tally, CurrentRsTally { merged: 2, unchanged: 1 });
    }

    #[test]
    fn test_propagation_is_idempotent() {
        let db = seeded();
        let conn = db.connection();
        dedup_merges(conn).unwrap();

        assert_eq!(propagate_loci(conn).unwrap(), 1);
        assert_eq!(propagate_loci(conn).unwrap(), 0);
        assert_eq!(propagate_gwas(conn).unwrap(), 1);
        assert_eq!(propagate_gwas(conn).unwrap(), 0);
    }

    #[test]
    fn test_dedup_loci_keeps_validated() {
        let db = seeded();
        let conn = db.connection();
        dedup_merges(conn).unwrap();
        propagate_loci(conn).unwrap();
        conn.execute(
            "INSERT INTO snp_locus (rs, chr, pos, validated, source_id) VALUES (300, 2, 10, 1, 1)",
            [],
        )
        .unwrap();

        assert_eq!(dedup_loci(conn).unwrap(), 1);
        assert_eq!(count(conn, "SELECT COUNT() FROM snp_locus WHERE rs = 300"), 1);
        assert_eq!(count(conn, "SELECT validated FROM snp_locus WHERE rs = 300"), 1);
    }

    #[test]
    fn test_snp_loci_by_rs() {
        let db = seeded();
        let conn = db.connection();
        let mut misses = Vec::new();

        let (found, tally) = snp_loci_by_rs(
            conn,
            &[100, 999],
            MatchBounds::EXACTLY_ONE,
            None,
            |index, rs, n| misses.push((index, rs, n)),
        )
        .unwrap();
        assert_eq!(found, vec![(100, vec![(chr(1), 5000)])]);
        assert_eq!(tally, LookupTally { zero: 1, one: 1, many: 0 });
        assert_eq!(misses, vec![(1, 999, 0)]);

        let (found, _) =
            snp_loci_by_rs(conn, &[100], MatchBounds::ANY, Some(true), |_, _, _| {}).unwrap();
        assert_eq!(found, vec![(100, vec![])]);
    }
}
