/// Alignment chains between two genome builds
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use loki_core::{Build, ChainId, Chromosome};
use loki_storage::rusqlite::{params, Connection};
use tracing::debug;

/// One gap-free block of a chain, 1-based closed on the old build
///
/// `new_start` is the new-build coordinate of `old_start`. On a reverse chain
/// new coordinates count down from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSegment {
    pub old_start: i64,
    pub old_end: i64,
    pub new_start: i64,
}

impl ChainSegment {
    pub fn new(old_start: i64, old_end: i64, new_start: i64) -> Self {
        Self {
            old_start,
            old_end,
            new_start,
        }
    }

    /// Distance from first to last base; a one-base block has span 0
    pub fn span(&self) -> i64 {
        self.old_end - self.old_start
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub id: ChainId,
    pub score: i64,
    pub old_chr: Chromosome,
    pub old_start: i64,
    pub old_end: i64,
    pub new_chr: Chromosome,
    pub is_forward: bool,
    /// Sorted by `old_start`, never overlapping
    pub segments: Vec<ChainSegment>,
}

impl Chain {
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        self.old_start <= end && self.old_end >= start
    }

    /// Segments touching `[start, end]`, left to right
    pub fn segments_in(&self, start: i64, end: i64) -> &[ChainSegment] {
        let first = self.segments.partition_point(|s| s.old_end < start);
        let len = self.segments[first..]
            .iter()
            .take_while(|s| s.old_start <= end)
            .count();
        &self.segments[first..first + len]
    }
}

/// Every chain from one build to another, grouped by old chromosome
#[derive(Debug, Clone)]
pub struct ChainSet {
    old_build: Build,
    new_build: Build,
    by_chr: HashMap<Chromosome, Vec<Chain>>,
}

impl ChainSet {
    pub fn new(old_build: Build, new_build: Build, chains: Vec<Chain>) -> Self {
        let mut by_chr: HashMap<Chromosome, Vec<Chain>> = HashMap::new();
        for mut chain in chains {
            chain.segments.sort_by_key(|s| s.old_start);
            by_chr.entry(chain.old_chr).or_default().push(chain);
        }
        for chains in by_chr.values_mut() {
            chains.sort_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then(a.old_start.cmp(&b.old_start))
                    .then(a.id.cmp(&b.id))
            });
        }
        Self {
            old_build,
            new_build,
            by_chr,
        }
    }

    pub fn old_build(&self) -> Build {
        self.old_build
    }

    pub fn new_build(&self) -> Build {
        self.new_build
    }

    /// Chains on `chr` in preference order
    pub fn chains(&self, chr: Chromosome) -> &[Chain] {
        self.by_chr.get(&chr).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_chr.is_empty()
    }

    pub fn chain_count(&self) -> usize {
        self.by_chr.values().map(Vec::len).sum()
    }

    /// Load every chain and segment for one build pair
    pub fn load(conn: &Connection, old_build: Build, new_build: Build) -> Result<Self> {
        let mut chains: HashMap<ChainId, Chain> = HashMap::new();
        let mut stmt = conn.prepare(
            "SELECT chain_id, score, old_chr, old_start, old_end, new_chr, is_fwd \
             FROM chain WHERE old_ucschg = ?1 AND new_ucschg = ?2",
        )?;
        let rows = stmt.query_map(params![old_build, new_build], |row| {
            Ok(Chain {
                id: row.get(0)?,
                score: row.get(1)?,
                old_chr: row.get(2)?,
                old_start: row.get(3)?,
                old_end: row.get(4)?,
                new_chr: row.get(5)?,
                is_forward: row.get::<_, i64>(6)? != 0,
                segments: Vec::new(),
            })
        })?;
        for chain in rows {
            let chain = chain?;
            chains.insert(chain.id, chain);
        }

        let mut stmt = conn.prepare(
            "SELECT cd.chain_id, cd.old_start, cd.old_end, cd.new_start \
             FROM chain_data AS cd JOIN chain AS c USING (chain_id) \
             WHERE c.old_ucschg = ?1 AND c.new_ucschg = ?2",
        )?;
        let mut rows = stmt.query(params![old_build, new_build])?;
        let mut segments = 0usize;
        while let Some(row) = rows.next()? {
            let id: ChainId = row.get(0)?;
            if let Some(chain) = chains.get_mut(&id) {
                chain
                    .segments
                    .push(ChainSegment::new(row.get(1)?, row.get(2)?, row.get(3)?));
                segments += 1;
            }
        }

        debug!(
            "Loaded {} chains with {} segments for {} -> {}",
            chains.len(),
            segments,
            old_build,
            new_build
        );
        Ok(Self::new(old_build, new_build, chains.into_values().collect()))
    }
}

/// In-memory cache of chain sets, loaded on first use per build pair
#[derive(Debug, Default)]
pub struct ChainStore {
    sets: HashMap<(Build, Build), Arc<ChainSet>>,
}

impl ChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(
        &mut self,
        conn: &Connection,
        old_build: Build,
        new_build: Build,
    ) -> Result<Arc<ChainSet>> {
        if let Some(set) = self.sets.get(&(old_build, new_build)) {
            return Ok(Arc::clone(set));
        }
        let set = Arc::new(
            ChainSet::load(conn, old_build, new_build)
                .with_context(|| format!("Failed to load chains {} -> {}", old_build, new_build))?,
        );
        self.sets.insert((old_build, new_build), Arc::clone(&set));
        Ok(set)
    }

    /// Forget cached sets, e.g. after the chain tables were rewritten
    pub fn invalidate(&mut self) {
        self.sets.clear();
    }

    /// Whether any chain exists for the build pair
    pub fn has_chains(conn: &Connection, old_build: Build, new_build: Build) -> Result<bool> {
        let found: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM chain WHERE old_ucschg = ?1 AND new_ucschg = ?2)",
            params![old_build, new_build],
            |row| row.get(0),
        )?;
        Ok(found != 0)
    }
}
