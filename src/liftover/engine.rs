/// Coordinate mapping between genome builds
use std::sync::Arc;

use loki_core::Chromosome;

use super::chain::{Chain, ChainSegment, ChainSet};

pub const DEFAULT_MIN_COVERAGE: f64 = 0.95;

/// A 1-based closed interval on one chromosome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub chr: Chromosome,
    pub start: i64,
    pub end: i64,
}

impl Region {
    pub fn new(chr: Chromosome, start: i64, end: i64) -> Self {
        Self { chr, start, end }
    }

    pub fn point(chr: Chromosome, pos: i64) -> Self {
        Self::new(chr, pos, pos)
    }

    pub fn len(&self) -> i64 {
        (self.end - self.start).abs() + 1
    }

    pub fn is_point(&self) -> bool {
        self.start == self.end
    }
}

/// Batch outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiftTally {
    pub lifted: usize,
    pub dropped: usize,
}

impl LiftTally {
    pub fn total(&self) -> usize {
        self.lifted + self.dropped
    }

    pub fn merge(&mut self, other: LiftTally) {
        self.lifted += other.lifted;
        self.dropped += other.dropped;
    }
}

/// Maps regions through one [`ChainSet`]
///
/// Chains on the query chromosome are tried in preference order (score
/// descending). For each chain the segments overlapping the query are
/// measured; the first chain whose segments cover at least `min_coverage` of
/// the query wins. A region no chain covers well enough is unmappable, which
/// is a normal outcome rather than an error.
#[derive(Debug, Clone)]
pub struct LiftoverEngine {
    chains: Arc<ChainSet>,
    min_coverage: f64,
}

impl LiftoverEngine {
    pub fn new(chains: Arc<ChainSet>) -> Self {
        Self {
            chains,
            min_coverage: DEFAULT_MIN_COVERAGE,
        }
    }

    pub fn with_min_coverage(mut self, min_coverage: f64) -> Self {
        self.min_coverage = min_coverage;
        self
    }

    pub fn min_coverage(&self) -> f64 {
        self.min_coverage
    }

    pub fn chains(&self) -> &ChainSet {
        &self.chains
    }

    /// Lift `[start, end]`; reversed bounds are swapped first
    pub fn lift_region(&self, chr: Chromosome, start: i64, end: i64) -> Option<Region> {
        let (start, end) = if start > end { (end, start) } else { (start, end) };

        for chain in self.chains.chains(chr) {
            if !chain.overlaps(start, end) {
                continue;
            }
            let segments = chain.segments_in(start, end);
            if segments.is_empty() {
                continue;
            }
            if let Some(region) = self.try_chain(chain, segments, start, end) {
                return Some(region);
            }
        }
        None
    }

    /// Lift a single position; the result is always a single position
    pub fn lift_point(&self, chr: Chromosome, pos: i64) -> Option<Region> {
        self.lift_region(chr, pos, pos)
            .map(|region| Region::point(region.chr, region.start))
    }

    /// Lift a region, keeping a point a point
    pub fn lift(&self, region: Region) -> Option<Region> {
        if region.is_point() {
            self.lift_point(region.chr, region.start)
        } else {
            self.lift_region(region.chr, region.start, region.end)
        }
    }

    /// Lift a batch; `on_unmapped` sees each input that could not be mapped
    pub fn lift_regions<I, F>(&self, regions: I, mut on_unmapped: F) -> (Vec<(Region, Region)>, LiftTally)
    where
        I: IntoIterator<Item = Region>,
        F: FnMut(&Region),
    {
        let mut tally = LiftTally::default();
        let mut lifted = Vec::new();
        for region in regions {
            match self.lift(region) {
                Some(new_region) => {
                    tally.lifted += 1;
                    lifted.push((region, new_region));
                }
                None => {
                    tally.dropped += 1;
                    on_unmapped(&region);
                }
            }
        }
        (lifted, tally)
    }

    fn try_chain(
        &self,
        chain: &Chain,
        segments: &[ChainSegment],
        start: i64,
        end: i64,
    ) -> Option<Region> {
        let (first, last) = (segments.first()?, segments.last()?);

        let front_diff = (start - first.old_start).clamp(0, first.span());
        let end_diff = (end - last.old_start).clamp(0, last.span());
        let total: i64 = segments.iter().map(|s| s.span() + 1).sum();
        let mapped = total - front_diff - (last.span() - end_diff);

        let query_len = end - start + 1;
        if (mapped as f64) / (query_len as f64) < self.min_coverage {
            return None;
        }

        let (new_start, new_end) = if chain.is_forward {
            (first.new_start + front_diff, last.new_start + end_diff)
        } else {
            (last.new_start - end_diff, first.new_start - front_diff)
        };
        let (new_start, new_end) = if new_start > new_end {
            (new_end, new_start)
        } else {
            (new_start, new_end)
        };
        Some(Region::new(chain.new_chr, new_start, new_end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loki_core::{Build, ChainId};
    use proptest::prelude::*;
    use test_case::test_case;

    fn chr1() -> Chromosome {
        Chromosome::from_code(1).unwrap()
    }

    fn chain(id: i64, score: i64, is_forward: bool, segments: Vec<ChainSegment>) -> Chain {
        Chain {
            id: ChainId(id),
            score,
            old_chr: chr1(),
            old_start: segments.first().map(|s| s.old_start).unwrap_or(0),
            old_end: segments.last().map(|s| s.old_end).unwrap_or(0),
            new_chr: chr1(),
            is_forward,
            segments,
        }
    }

    fn engine(chains: Vec<Chain>) -> LiftoverEngine {
        LiftoverEngine::new(Arc::new(ChainSet::new(Build(18), Build(19), chains)))
    }

    #[test]
    fn test_single_forward_segment() {
        let e = engine(vec![chain(1, 100, true, vec![ChainSegment::new(100, 199, 1100)])]);

        assert_eq!(e.lift_region(chr1(), 150, 160), Some(Region::new(chr1(), 1150, 1160)));
        assert_eq!(e.lift_point(chr1(), 155), Some(Region::point(chr1(), 1155)));
    }

    #[test]
    fn test_swapped_bounds() {
        let e = engine(vec![chain(1, 100, true, vec![ChainSegment::new(100, 199, 1100)])]);
        assert_eq!(e.lift_region(chr1(), 160, 150), Some(Region::new(chr1(), 1150, 1160)));
    }

    // query [100, 299] is 200 bases long
    #[test_case(289, true ; "190 of 200 bases accepted")]
    #[test_case(288, false ; "189 of 200 bases rejected")]
    fn test_coverage_threshold(segment_end: i64, accepted: bool) {
        let e = engine(vec![chain(
            1,
            100,
            true,
            vec![ChainSegment::new(100, segment_end, 1100)],
        )]);
        assert_eq!(e.lift_region(chr1(), 100, 299).is_some(), accepted);
    }

    #[test]
    fn test_partial_overlap_uses_overlapping_segments() {
        // chain covers [100, 199] and [210, 400]; query [150, 399] misses 10 bases
        let e = engine(vec![chain(
            1,
            100,
            true,
            vec![
                ChainSegment::new(100, 199, 1100),
                ChainSegment::new(210, 400, 1200),
            ],
        )]);
        let lifted = e.lift_region(chr1(), 150, 399).unwrap();
        assert_eq!(lifted, Region::new(chr1(), 1150, 1389));
    }

    #[test]
    fn test_region_past_chain_end_is_rejected_below_threshold() {
        let e = engine(vec![chain(1, 100, true, vec![ChainSegment::new(100, 199, 1100)])]);
        assert_eq!(e.lift_region(chr1(), 150, 249), None);
    }

    #[test]
    fn test_reverse_chain() {
        // old 100 maps to 1199, old 199 maps to 1100
        let e = engine(vec![chain(1, 100, false, vec![ChainSegment::new(100, 199, 1199)])]);

        assert_eq!(e.lift_region(chr1(), 150, 160), Some(Region::new(chr1(), 1139, 1149)));
        assert_eq!(e.lift_point(chr1(), 100), Some(Region::point(chr1(), 1199)));
    }

    #[test]
    fn test_higher_score_wins() {
        let e = engine(vec![
            chain(1, 10, true, vec![ChainSegment::new(100, 199, 5100)]),
            chain(2, 50, true, vec![ChainSegment::new(100, 199, 9100)]),
        ]);
        assert_eq!(e.lift_region(chr1(), 120, 130).unwrap().start, 9120);
    }

    #[test]
    fn test_falls_through_rejected_chains() {
        // three overlapping chains; the two best cover too little of the query
        let e = engine(vec![
            chain(1, 90, true, vec![ChainSegment::new(100, 150, 1100)]),
            chain(2, 80, true, vec![ChainSegment::new(140, 180, 2140)]),
            chain(3, 70, true, vec![ChainSegment::new(1, 1000, 3001)]),
            chain(4, 60, true, vec![ChainSegment::new(1, 1000, 4001)]),
        ]);
        assert_eq!(e.lift_region(chr1(), 100, 199), Some(Region::new(chr1(), 3100, 3199)));
    }

    #[test]
    fn test_all_chains_rejected() {
        let e = engine(vec![
            chain(1, 90, true, vec![ChainSegment::new(100, 150, 1100)]),
            chain(2, 80, true, vec![ChainSegment::new(140, 180, 2140)]),
        ]);
        assert_eq!(e.lift_region(chr1(), 100, 199), None);
        assert_eq!(e.lift_region(Chromosome::X, 100, 199), None);
    }

    #[test]
    fn test_lift_regions_tallies_and_reports() {
        let e = engine(vec![chain(1, 100, true, vec![ChainSegment::new(100, 199, 1100)])]);
        let mut unmapped = Vec::new();

        let (lifted, tally) = e.lift_regions(
            vec![
                Region::new(chr1(), 110, 120),
                Region::point(chr1(), 500),
                Region::point(chr1(), 101),
            ],
            |region| unmapped.push(*region),
        );

        assert_eq!(tally, LiftTally { lifted: 2, dropped: 1 });
        assert_eq!(unmapped, vec![Region::point(chr1(), 500)]);
        assert_eq!(lifted[1].1, Region::point(chr1(), 1101));
    }

    proptest! {
        #[test]
        fn prop_identity_chain_maps_in_place(start in 1i64..10_000, len in 0i64..500) {
            let e = engine(vec![chain(1, 1, true, vec![ChainSegment::new(1, 20_000, 1)])]);
            let lifted = e.lift_region(chr1(), start, start + len).unwrap();
            prop_assert_eq!(lifted, Region::new(chr1(), start, start + len));
        }

        #[test]
        fn prop_point_never_widens(pos in 1i64..2_000, forward in any::<bool>()) {
            let new_start = if forward { 5_001 } else { 7_000 };
            let e = engine(vec![chain(1, 1, forward, vec![ChainSegment::new(1, 2_000, new_start)])]);
            let lifted = e.lift_point(chr1(), pos).unwrap();
            prop_assert!(lifted.is_point());
        }

        #[test]
        fn prop_lifted_length_bounded(start in 1i64..900, len in 0i64..100) {
            let e = engine(vec![chain(
                1,
                1,
                true,
                vec![ChainSegment::new(1, 400, 1), ChainSegment::new(405, 1_000, 410)],
            )]);
            if let Some(lifted) = e.lift_region(chr1(), start, start + len) {
                prop_assert!(lifted.len() <= len + 1 + 10);
            }
        }
    }
}
