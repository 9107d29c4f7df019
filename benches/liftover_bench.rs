use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use loki::liftover::{Chain, ChainSegment, ChainSet, LiftoverEngine, Region};
use loki_core::{Build, ChainId, Chromosome};
use std::hint::black_box;
use std::sync::Arc;

/// `count` chains per chromosome, each with `segments` blocks separated by
/// 10 base gaps and shifted by 1000 bases
fn generate_chains(count: usize, segments: usize) -> ChainSet {
    let mut chains = Vec::new();
    let mut id = 0;
    for chr in Chromosome::all() {
        for c in 0..count as i64 {
            let base = c * 1_000_000 + 1;
            let blocks: Vec<ChainSegment> = (0..segments as i64)
                .map(|s| {
                    let start = base + s * 1_010;
                    ChainSegment::new(start, start + 999, start + 1_000)
                })
                .collect();
            id += 1;
            chains.push(Chain {
                id: ChainId(id),
                score: 1_000 - c,
                old_chr: chr,
                old_start: blocks[0].old_start,
                old_end: blocks[blocks.len() - 1].old_end,
                new_chr: chr,
                is_forward: true,
                segments: blocks,
            });
        }
    }
    ChainSet::new(Build(18), Build(19), chains)
}

fn generate_regions(count: usize, width: i64) -> Vec<Region> {
    let chromosomes: Vec<Chromosome> = Chromosome::all().collect();
    (0..count)
        .map(|i| {
            let chr = chromosomes[i % chromosomes.len()];
            let start = (i as i64 * 7_919) % 5_000_000 + 1;
            Region::new(chr, start, start + width)
        })
        .collect()
}

fn bench_lift_points(c: &mut Criterion) {
    let mut group = c.benchmark_group("liftover/points");
    let engine = LiftoverEngine::new(Arc::new(generate_chains(5, 500)));

    for count in [1_000, 10_000, 100_000].iter() {
        let points = generate_regions(*count, 0);
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                let (lifted, tally) = engine.lift_regions(black_box(points.iter().copied()), |_| {});
                black_box((lifted, tally));
            });
        });
    }

    group.finish();
}

fn bench_lift_regions_by_width(c: &mut Criterion) {
    let mut group = c.benchmark_group("liftover/regions_by_width");
    let engine = LiftoverEngine::new(Arc::new(generate_chains(5, 500)));

    for width in [100, 10_000, 100_000].iter() {
        let regions = generate_regions(10_000, *width);
        group.bench_with_input(BenchmarkId::from_parameter(width), width, |b, _| {
            b.iter(|| {
                let (lifted, tally) = engine.lift_regions(black_box(regions.iter().copied()), |_| {});
                black_box((lifted, tally));
            });
        });
    }

    group.finish();
}

fn bench_chain_density(c: &mut Criterion) {
    let mut group = c.benchmark_group("liftover/chain_density");
    let regions = generate_regions(10_000, 500);

    for segments in [10, 100, 1_000].iter() {
        let engine = LiftoverEngine::new(Arc::new(generate_chains(5, *segments)));
        group.bench_with_input(BenchmarkId::from_parameter(segments), segments, |b, _| {
            b.iter(|| black_box(engine.lift_regions(regions.iter().copied(), |_| {})));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_lift_points,
    bench_lift_regions_by_width,
    bench_chain_density
);
criterion_main!(benches);
