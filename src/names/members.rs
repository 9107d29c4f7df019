/// Resolution of group member hints into scored group-biopolymer links
///
/// Each member of a group arrives as one or more `(namespace, name)` hints.
/// Hints are matched against stored biopolymer names and every candidate
/// biopolymer is scored:
///
/// - implication: how many of the member's hints point at the candidate
/// - quality: hints weighted by `1000 / fan-out`, so a name shared by many
///   biopolymers counts for less; polygenic members use `1000 * implication`
/// - specificity: based on how many candidates (or distinct implication
///   levels, for polygenic members) compete for the member
///
/// Scores are normalized to 0..=100. When a member has hints in a polygenic
/// namespace that matched anything, only those hints are considered.
use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use loki_core::{BiopolymerId, EntityTypeId, GroupId, NamespaceId, SourceId};
use loki_storage::rusqlite::{params, Connection};
use tracing::info;

/// Matches for one hint of a member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberHint {
    pub polygenic: bool,
    pub biopolymers: BTreeSet<BiopolymerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberScore {
    pub biopolymer: BiopolymerId,
    pub specificity: i64,
    pub implication: i64,
    pub quality: i64,
    /// Scored from polygenic hints
    pub polygenic: bool,
}

impl MemberScore {
    /// Whether the candidate deserves a stored link
    pub fn is_link(&self) -> bool {
        self.polygenic || self.implication > 0 || self.quality > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberResolutionStats {
    /// Stored links to real biopolymers
    pub total: usize,
    /// Links written by sources
    pub explicit: usize,
    /// Inferred links with full confidence
    pub definite: usize,
    /// Inferred links with any score below 100
    pub conditional: usize,
    /// Members that matched nothing
    pub unrecognized: usize,
}

/// Score every candidate biopolymer of one member
pub fn score_member(hints: &[MemberHint]) -> Vec<MemberScore> {
    let polynames = hints
        .iter()
        .filter(|h| h.polygenic && !h.biopolymers.is_empty())
        .count() as i64;
    let kept: Vec<&MemberHint> = hints
        .iter()
        .filter(|h| !h.biopolymers.is_empty() && (h.polygenic || polynames == 0))
        .collect();

    let mut raw: BTreeMap<BiopolymerId, (i64, i64)> = BTreeMap::new();
    for hint in &kept {
        let fan_out = hint.biopolymers.len() as i64;
        for biopolymer in &hint.biopolymers {
            let entry = raw.entry(*biopolymer).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += 1000 / fan_out;
        }
    }
    if polynames > 0 {
        for (implication, quality) in raw.values_mut() {
            *quality = 1000 * *implication;
        }
    }
    if raw.is_empty() {
        return Vec::new();
    }

    let member_implication = raw.values().map(|(i, _)| *i).max().unwrap_or(0);
    let member_quality = raw.values().map(|(_, q)| *q).max().unwrap_or(0);
    let variance = raw.values().map(|(i, _)| *i).collect::<BTreeSet<_>>().len() as i64;
    let match_basic = raw.len() as i64;
    let match_implication = raw.values().filter(|(i, _)| *i >= member_implication).count() as i64;
    let match_quality = raw.values().filter(|(_, q)| *q >= member_quality).count() as i64;

    raw.into_iter()
        .map(|(biopolymer, (implication, quality))| {
            if polynames > 0 {
                MemberScore {
                    biopolymer,
                    specificity: 100 / variance,
                    implication: ratio(implication, member_implication),
                    quality: ratio(quality, member_quality),
                    polygenic: true,
                }
            } else {
                MemberScore {
                    biopolymer,
                    specificity: 100 / match_basic,
                    implication: if implication == member_implication {
                        100 / match_implication
                    } else {
                        0
                    },
                    quality: if quality == member_quality {
                        100 / match_quality
                    } else {
                        0
                    },
                    polygenic: false,
                }
            }
        })
        .collect()
}

fn ratio(value: i64, best: i64) -> i64 {
    if best > 0 {
        100 * value / best
    } else {
        0
    }
}

type MemberKey = (GroupId, i64);
/// One `group_member_name` row within a member
type HintKey = (EntityTypeId, NamespaceId, String);

fn load_hints(conn: &Connection) -> Result<BTreeMap<MemberKey, BTreeMap<HintKey, MemberHint>>> {
    let mut stmt = conn.prepare(
        "SELECT gmn.group_id, gmn.member, gmn.type_id, gmn.namespace_id, gmn.name, \
                COALESCE(n.polygenic, 0), b.biopolymer_id \
         FROM group_member_name AS gmn \
         JOIN biopolymer_name AS bn ON bn.name = gmn.name \
         JOIN biopolymer AS b ON b.biopolymer_id = bn.biopolymer_id \
         LEFT JOIN namespace AS n ON n.namespace_id = gmn.namespace_id \
         WHERE gmn.namespace_id IN (0, bn.namespace_id) \
           AND gmn.type_id IN (0, b.type_id)",
    )?;
    let mut rows = stmt.query([])?;

    let mut members: BTreeMap<MemberKey, BTreeMap<HintKey, MemberHint>> = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let member: MemberKey = (row.get(0)?, row.get(1)?);
        let hint: HintKey = (row.get(2)?, row.get(3)?, row.get(4)?);
        let polygenic = row.get::<_, i64>(5)? != 0;
        let biopolymer: BiopolymerId = row.get(6)?;
        members
            .entry(member)
            .or_default()
            .entry(hint)
            .or_insert_with(|| MemberHint {
                polygenic,
                biopolymers: BTreeSet::new(),
            })
            .biopolymers
            .insert(biopolymer);
    }
    Ok(members)
}

/// Replace all inferred group memberships with a fresh resolution pass
pub fn resolve_group_members(conn: &Connection) -> Result<MemberResolutionStats> {
    conn.execute(
        "DELETE FROM group_biopolymer WHERE source_id = ?1",
        params![SourceId::DERIVED],
    )?;

    let members = load_hints(conn).context("Failed to match group member names")?;

    let mut links: BTreeMap<(GroupId, BiopolymerId), (i64, i64, i64)> = BTreeMap::new();
    for (&(group, _), hints) in &members {
        let hints: Vec<MemberHint> = hints.values().cloned().collect();
        for score in score_member(&hints).into_iter().filter(MemberScore::is_link) {
            let entry = links.entry((group, score.biopolymer)).or_insert((0, 0, 0));
            entry.0 = entry.0.max(score.specificity);
            entry.1 = entry.1.max(score.implication);
            entry.2 = entry.2.max(score.quality);
        }
    }

    let mut insert = conn.prepare_cached(
        "INSERT OR IGNORE INTO group_biopolymer \
         (group_id, biopolymer_id, specificity, implication, quality, source_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for ((group, biopolymer), (specificity, implication, quality)) in &links {
        insert.execute(params![
            group,
            biopolymer,
            specificity,
            implication,
            quality,
            SourceId::DERIVED
        ])?;
    }

    // one placeholder per group counting the members nothing matched
    let mut unrecognized: BTreeMap<GroupId, i64> = BTreeMap::new();
    {
        let mut stmt = conn.prepare("SELECT DISTINCT group_id, member FROM group_member_name")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, GroupId>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let key = row?;
            if !members.contains_key(&key) {
                *unrecognized.entry(key.0).or_default() += 1;
            }
        }
    }
    for (group, count) in &unrecognized {
        insert.execute(params![group, 0, count, 0, 0, SourceId::DERIVED])?;
    }

    let stats = conn.query_row(
        "SELECT \
           COALESCE(SUM(CASE WHEN biopolymer_id > 0 THEN 1 ELSE 0 END), 0), \
           COALESCE(SUM(CASE WHEN biopolymer_id > 0 AND source_id > 0 THEN 1 ELSE 0 END), 0), \
           COALESCE(SUM(CASE WHEN biopolymer_id > 0 AND source_id = 0 \
             AND specificity >= 100 AND implication >= 100 AND quality >= 100 THEN 1 ELSE 0 END), 0), \
           COALESCE(SUM(CASE WHEN biopolymer_id > 0 AND source_id = 0 \
             AND (specificity < 100 OR implication < 100 OR quality < 100) THEN 1 ELSE 0 END), 0), \
           COALESCE(SUM(CASE WHEN biopolymer_id = 0 AND source_id = 0 THEN specificity ELSE 0 END), 0) \
         FROM group_biopolymer",
        [],
        |row| {
            Ok(MemberResolutionStats {
                total: row.get::<_, i64>(0)? as usize,
                explicit: row.get::<_, i64>(1)? as usize,
                definite: row.get::<_, i64>(2)? as usize,
                conditional: row.get::<_, i64>(3)? as usize,
                unrecognized: row.get::<_, i64>(4)? as usize,
            })
        },
    )?;

    info!(
        "{} group associations ({} explicit, {} definite, {} conditional, {} unrecognized)",
        stats.total, stats.explicit, stats.definite, stats.conditional, stats.unrecognized
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hint(polygenic: bool, ids: &[i64]) -> MemberHint {
        MemberHint {
            polygenic,
            biopolymers: ids.iter().copied().map(BiopolymerId).collect(),
        }
    }

    fn by_id(scores: &[MemberScore], id: i64) -> MemberScore {
        *scores.iter().find(|s| s.biopolymer == BiopolymerId(id)).unwrap()
    }

    #[test]
    fn test_single_unambiguous_member() {
        let scores = score_member(&[hint(false, &[7]), hint(false, &[7])]);
        assert_eq!(
            scores,
            vec![MemberScore {
                biopolymer: BiopolymerId(7),
                specificity: 100,
                implication: 100,
                quality: 100,
                polygenic: false,
            }]
        );
    }

    #[test]
    fn test_corroborated_candidate_wins() {
        // symbol matches 1 and 2, entrez id matches only 1
        let scores = score_member(&[hint(false, &[1, 2]), hint(false, &[1])]);

        let winner = by_id(&scores, 1);
        assert_eq!((winner.specificity, winner.implication, winner.quality), (50, 100, 100));

        let loser = by_id(&scores, 2);
        assert_eq!((loser.implication, loser.quality), (0, 0));
        assert!(!loser.is_link());
    }

    #[test]
    fn test_tied_candidates_share_score() {
        let scores = score_member(&[hint(false, &[1, 2])]);
        for id in [1, 2] {
            let score = by_id(&scores, id);
            assert_eq!((score.specificity, score.implication, score.quality), (50, 50, 50));
        }
    }

    #[test]
    fn test_polygenic_hints_take_priority() {
        let scores = score_member(&[hint(true, &[1, 2, 3]), hint(false, &[9])]);

        assert_eq!(scores.len(), 3);
        assert!(scores.iter().all(|s| s.polygenic && s.is_link()));
        assert!(scores.iter().all(|s| s.implication == 100 && s.specificity == 100));
    }

    #[test]
    fn test_polygenic_specificity_uses_variance() {
        let scores = score_member(&[hint(true, &[1, 2]), hint(true, &[1])]);
        assert_eq!(by_id(&scores, 1).specificity, 50);
        assert_eq!(by_id(&scores, 2).implication, 50);
        assert_eq!(by_id(&scores, 2).quality, 50);
    }

    #[test]
    fn test_hints_differing_in_type_count_separately() {
        let db = loki_storage::KnowledgeDb::open_in_memory(loki_storage::Schema::knowledge()).unwrap();
        let conn = db.connection();
        conn.execute_batch(
            "INSERT INTO namespace (namespace_id, namespace) VALUES (1, 'symbol'); \
             INSERT INTO biopolymer (biopolymer_id, type_id, label, source_id) VALUES (1, 1, 'GENEA', 1); \
             INSERT INTO biopolymer_name (biopolymer_id, namespace_id, name, source_id) VALUES (1, 1, 'GENEA', 1); \
             INSERT INTO group_member_name (group_id, member, type_id, namespace_id, name, source_id) \
               VALUES (10, 1, 0, 1, 'GENEA', 2), (10, 1, 1, 1, 'GENEA', 2);",
        )
        .unwrap();

        let members = load_hints(conn).unwrap();

        let hints = &members[&(GroupId(10), 1)];
        assert_eq!(hints.len(), 2);
        assert!(hints.values().all(|h| h.biopolymers == BTreeSet::from([BiopolymerId(1)])));
    }

    #[test]
    fn test_unmatched_member() {
        assert!(score_member(&[hint(false, &[])]).is_empty());
        assert!(score_member(&[]).is_empty());
    }
}
