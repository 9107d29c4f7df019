/// Inference of new biopolymer names from name-translation hints
///
/// Every `(new_namespace, new_name)` implied by a translation row is scored
/// against the biopolymers its old name already points at. The implication
/// score of a candidate is the number of joined name rows supporting it. A
/// name is adopted when its namespace is polygenic (all candidates) or when a
/// single candidate holds the best score. Names that already have an explicit
/// record are never inferred.
use std::collections::BTreeMap;

use anyhow::{Context, Result};
use loki_core::{BiopolymerId, NamespaceId, SourceId};
use loki_storage::rusqlite::{params, Connection};
use tracing::info;

/// One possible biopolymer for a translated name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCandidate {
    pub namespace: NamespaceId,
    pub name: String,
    pub biopolymer: BiopolymerId,
    pub polygenic: bool,
    pub implication: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NameResolutionStats {
    /// Distinct translated names
    pub total: usize,
    /// Names adopted as inferred records
    pub matched: usize,
    /// Names left unresolved because the best score was tied
    pub ambiguous: usize,
    /// Names that matched no biopolymer at all
    pub unrecognized: usize,
    /// Names skipped because a source already names them explicitly
    pub explicit: usize,
}

/// Pick the accepted candidates for one translated name
///
/// `candidates` must all share the same `(namespace, name)`.
pub fn select_candidates(candidates: &[NameCandidate]) -> Vec<&NameCandidate> {
    let Some(best) = candidates.iter().map(|c| c.implication).max() else {
        return Vec::new();
    };
    if candidates.iter().any(|c| c.polygenic) {
        return candidates.iter().collect();
    }
    let mut leaders = candidates.iter().filter(|c| c.implication >= best);
    match (leaders.next(), leaders.next()) {
        (Some(winner), None) => vec![winner],
        _ => Vec::new(),
    }
}

fn load_candidates(conn: &Connection) -> Result<BTreeMap<(NamespaceId, String), Vec<NameCandidate>>> {
    let mut stmt = conn.prepare(
        "SELECT bnn.new_namespace_id, bnn.new_name, bn.biopolymer_id, \
                COALESCE(n.polygenic, 0), COUNT() \
         FROM biopolymer_name_name AS bnn \
         JOIN biopolymer_name AS bn ON bn.name = bnn.name \
         JOIN biopolymer AS b ON b.biopolymer_id = bn.biopolymer_id \
         LEFT JOIN namespace AS n ON n.namespace_id = bnn.new_namespace_id \
         WHERE bnn.namespace_id IN (0, bn.namespace_id) \
           AND bnn.type_id IN (0, b.type_id) \
         GROUP BY bnn.new_namespace_id, bnn.new_name, bn.biopolymer_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(NameCandidate {
            namespace: row.get(0)?,
            name: row.get(1)?,
            biopolymer: row.get(2)?,
            polygenic: row.get::<_, i64>(3)? != 0,
            implication: row.get(4)?,
        })
    })?;

    let mut grouped: BTreeMap<(NamespaceId, String), Vec<NameCandidate>> = BTreeMap::new();
    for row in rows {
        let candidate = row?;
        grouped
            .entry((candidate.namespace, candidate.name.clone()))
            .or_default()
            .push(candidate);
    }
    Ok(grouped)
}

/// Replace all inferred biopolymer names with a fresh resolution pass
pub fn resolve_biopolymer_names(conn: &Connection) -> Result<NameResolutionStats> {
    conn.execute(
        "DELETE FROM biopolymer_name WHERE source_id = ?1",
        params![SourceId::DERIVED],
    )?;

    let total: i64 = conn.query_row(
        "SELECT COUNT() FROM (SELECT 1 FROM biopolymer_name_name GROUP BY new_namespace_id, new_name)",
        [],
        |row| row.get(0),
    )?;
    let grouped = load_candidates(conn).context("Failed to score translated names")?;

    let mut stats = NameResolutionStats {
        total: total as usize,
        unrecognized: (total as usize).saturating_sub(grouped.len()),
        ..Default::default()
    };

    let mut explicit = conn.prepare_cached(
        "SELECT EXISTS(SELECT 1 FROM biopolymer_name WHERE namespace_id = ?1 AND name = ?2)",
    )?;
    let mut insert = conn.prepare_cached(
        "INSERT OR IGNORE INTO biopolymer_name (biopolymer_id, namespace_id, name, source_id) \
         VALUES (?1, ?2, ?3, ?4)",
    )?;

    for ((namespace, name), candidates) in &grouped {
        let exists: i64 = explicit.query_row(params![namespace, name], |row| row.get(0))?;
        if exists != 0 {
            stats.explicit += 1;
            continue;
        }
        let accepted = select_candidates(candidates);
        if accepted.is_empty() {
            continue;
        }
        for candidate in accepted {
            insert.execute(params![candidate.biopolymer, namespace, name, SourceId::DERIVED])?;
        }
        stats.matched += 1;
    }
    stats.ambiguous = stats.total - stats.unrecognized - stats.matched - stats.explicit;

    info!(
        "Resolved {} identifiers ({} ambiguous, {} unrecognized, {} already named)",
        stats.matched, stats.ambiguous, stats.unrecognized, stats.explicit
    );
    Ok(stats)
}
