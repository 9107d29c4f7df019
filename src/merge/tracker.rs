/// SNP accession merge graph
use std::collections::HashMap;

use anyhow::{Context, Result};
use loki_core::{LokiError, Rs};
use loki_storage::rusqlite::{params, Connection};
use tracing::debug;

/// Longest merge chain followed before giving up
pub const DEFAULT_HOP_LIMIT: usize = 64;

/// Maps each merged rs number to the rs it was merged into
///
/// Merges may chain (100 -> 105 -> 110); [`MergeTracker::resolve`] always
/// follows the chain to its end. A cycle, or a chain longer than the hop
/// limit, is an error.
#[derive(Debug, Clone)]
pub struct MergeTracker {
    targets: HashMap<Rs, Rs>,
    hop_limit: usize,
}

impl Default for MergeTracker {
    fn default() -> Self {
        Self {
            targets: HashMap::new(),
            hop_limit: DEFAULT_HOP_LIMIT,
        }
    }
}

impl MergeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hop_limit(mut self, hop_limit: usize) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    /// Build from raw pairs; the first pair seen for a merged rs wins
    pub fn from_pairs<I: IntoIterator<Item = (Rs, Rs)>>(pairs: I) -> Self {
        let mut tracker = Self::new();
        for (merged, current) in pairs {
            tracker.insert(merged, current);
        }
        tracker
    }

    /// Record a merge; returns false for duplicates and self-merges
    pub fn insert(&mut self, merged: Rs, current: Rs) -> bool {
        if merged == current || self.targets.contains_key(&merged) {
            return false;
        }
        self.targets.insert(merged, current);
        true
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Direct target of one merge, without following the chain
    pub fn target(&self, merged: Rs) -> Option<Rs> {
        self.targets.get(&merged).copied()
    }

    /// Final current rs for `rs`; unmerged ids resolve to themselves
    pub fn resolve(&self, rs: Rs) -> Result<Rs, LokiError> {
        let mut current = rs;
        let mut seen = Vec::new();
        while let Some(&next) = self.targets.get(&current) {
            seen.push(current);
            if next == rs || seen.contains(&next) {
                return Err(LokiError::MergeCycle { id: rs });
            }
            if seen.len() > self.hop_limit {
                return Err(LokiError::MergeHopLimit {
                    id: rs,
                    limit: self.hop_limit,
                });
            }
            current = next;
        }
        Ok(current)
    }

    /// Point every merge directly at its final target
    ///
    /// Returns the `(merged, final)` pairs whose target changed.
    pub fn flatten(&mut self) -> Result<Vec<(Rs, Rs)>, LokiError> {
        let mut changed = Vec::new();
        let mut keys: Vec<Rs> = self.targets.keys().copied().collect();
        keys.sort_unstable();
        for merged in keys {
            let resolved = self.resolve(merged)?;
            if self.targets.get(&merged) != Some(&resolved) {
                changed.push((merged, resolved));
            }
        }
        for (merged, resolved) in &changed {
            self.targets.insert(*merged, *resolved);
        }
        Ok(changed)
    }

    pub fn load(conn: &Connection) -> Result<Self> {
        let mut stmt = conn.prepare("SELECT rs_merged, rs_current FROM snp_merge ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, Rs>(0)?, row.get::<_, Rs>(1)?)))?;
        let mut tracker = Self::new();
        for row in rows {
            let (merged, current) = row?;
            tracker.insert(merged, current);
        }
        debug!("Loaded {} SNP merges", tracker.len());
        Ok(tracker)
    }
}

/// Rewrite stored merges so each points at its final target
///
/// Fails without writing anything if the merge graph has a cycle.
pub fn flatten_stored_merges(conn: &Connection, hop_limit: usize) -> Result<usize> {
    let mut tracker = MergeTracker::load(conn)?.with_hop_limit(hop_limit);
    let changed = tracker.flatten()?;
    let mut stmt = conn.prepare_cached("UPDATE snp_merge SET rs_current = ?2 WHERE rs_merged = ?1")?;
    for (merged, resolved) in &changed {
        stmt.execute(params![merged, resolved])
            .with_context(|| format!("Failed to rewrite merge of rs{}", merged))?;
    }
    Ok(changed.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_transitive_resolution() {
        let tracker = MergeTracker::from_pairs([(100, 105), (105, 110)]);
        assert_eq!(tracker.resolve(100).unwrap(), 110);
        assert_eq!(tracker.resolve(105).unwrap(), 110);
        assert_eq!(tracker.resolve(42).unwrap(), 42);
    }

    #[test]
    fn test_cycle_is_error() {
        let tracker = MergeTracker::from_pairs([(100, 105), (105, 100)]);
        assert!(matches!(tracker.resolve(100), Err(LokiError::MergeCycle { id: 100 })));
    }

    #[test]
    fn test_cycle_reached_from_outside() {
        let tracker = MergeTracker::from_pairs([(1, 2), (2, 3), (3, 2)]);
        assert!(matches!(tracker.resolve(1), Err(LokiError::MergeCycle { .. })));
    }

    #[test]
    fn test_hop_limit() {
        let tracker = MergeTracker::from_pairs((0..10).map(|i| (i, i + 1))).with_hop_limit(4);
        assert!(matches!(
            tracker.resolve(0),
            Err(LokiError::MergeHopLimit { id: 0, limit: 4 })
        ));
        assert_eq!(tracker.resolve(7).unwrap(), 10);
    }

    #[test]
    fn test_duplicates_and_self_merges_ignored() {
        let mut tracker = MergeTracker::new();
        assert!(tracker.insert(1, 2));
        assert!(!tracker.insert(1, 3));
        assert!(!tracker.insert(5, 5));
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.target(1), Some(2));
    }

    #[test]
    fn test_flatten_reports_changes() {
        let mut tracker = MergeTracker::from_pairs([(100, 105), (105, 110), (7, 8)]);
        let changed = tracker.flatten().unwrap();
        assert_eq!(changed, vec![(100, 110)]);
        assert_eq!(tracker.target(100), Some(110));
        assert!(tracker.flatten().unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_chain_resolves_to_end(len in 1i64..40) {
            let tracker = MergeTracker::from_pairs((0..len).map(|i| (i, i + 1)));
            for start in 0..len {
                prop_assert_eq!(tracker.resolve(start).unwrap(), len);
            }
        }

        #[test]
        fn prop_flatten_is_single_hop(pairs in proptest::collection::vec((0i64..50, 50i64..100), 1..40)) {
            // targets never appear as merged ids, so no cycles
            let mut tracker = MergeTracker::from_pairs(pairs);
            tracker.flatten().unwrap();
            for (merged, _) in tracker.targets.clone() {
                let target = tracker.target(merged).unwrap();
                prop_assert_eq!(tracker.target(target), None);
            }
        }
    }
}
