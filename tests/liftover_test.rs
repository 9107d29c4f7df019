/// Coordinate liftover against chains loaded through the update run
mod common;

use loki::liftover::{ChainSegment, ChainStore, LiftoverEngine, Region};
use loki::sources::{ChainRecord, SourceRegistry};
use loki_core::{Build, Chromosome};
use loki_storage::settings;
use loki_test::{ChainFixture, GeneFixture, GeneSpec, SnpFixture, TestEnvironment};
use pretty_assertions::assert_eq;

const HG18: Build = Build(18);
const HG19: Build = Build(19);

fn chr(code: i64) -> Chromosome {
    Chromosome::from_code(code).unwrap()
}

/// Two sources on hg18, two on hg19; hg19 wins the tie as the newer build
fn mixed_build_registry() -> SourceRegistry {
    SourceRegistry::builder()
        .register(ChainFixture::new("chains", HG18, HG19).offset(1, 1, 1_000_000, 100, 5000))
        .register(
            SnpFixture::new("snps")
                .with_build(HG18)
                .locus(1, 1, 500)
                .locus(2, 2, 500),
        )
        .register(
            GeneFixture::new("genes_old")
                .with_build(HG18)
                .gene(GeneSpec::new("OLD1", 11, 1, 1_000, 2_000)),
        )
        .register(
            GeneFixture::new("genes_a")
                .with_build(HG19)
                .gene(GeneSpec::new("GENEA", 1, 1, 5_000, 6_000)),
        )
        .register(
            GeneFixture::new("genes_b")
                .with_build(HG19)
                .gene(GeneSpec::new("GENEB", 2, 1, 7_000, 8_000)),
        )
        .build()
        .unwrap()
}

#[test]
fn test_update_lifts_sources_onto_target_build() {
    let env = TestEnvironment::new().unwrap();
    let report = env.update(&mixed_build_registry()).unwrap();

    let builds = report.cascade.as_ref().unwrap().builds.as_ref().unwrap();
    assert_eq!(builds.target, Some(HG19));
    assert_eq!(builds.loci.lifted, 1);
    assert_eq!(builds.loci.dropped, 1);
    assert_eq!(builds.regions.lifted, 1);

    assert_eq!(common::loci_of(&env, 1), vec![(1, 600)]);
    assert!(common::loci_of(&env, 2).is_empty());
    assert_eq!(
        env.query_i64("SELECT pos_min FROM biopolymer_region AS r JOIN biopolymer AS b USING (biopolymer_id) WHERE b.label = 'OLD1'")
            .unwrap(),
        1_100
    );
    assert_eq!(
        env.query_i64("SELECT pos_min FROM biopolymer_region AS r JOIN biopolymer AS b USING (biopolymer_id) WHERE b.label = 'GENEA'")
            .unwrap(),
        5_000
    );

    let db = env.open_db().unwrap();
    assert_eq!(settings::target_build(db.connection()).unwrap(), Some(HG19));
    let snps = loki_storage::catalog::source(db.connection(), "snps").unwrap().unwrap();
    assert_eq!(snps.ucschg, Some(HG18));
    assert_eq!(snps.current_ucschg, Some(HG19));
}

#[test]
fn test_rerun_does_not_lift_twice() {
    let env = TestEnvironment::new().unwrap();
    let registry = mixed_build_registry();
    env.update(&registry).unwrap();

    let report = env.update(&registry).unwrap();

    assert_eq!(report.processed().count(), 0);
    assert!(report.cascade.as_ref().unwrap().builds.is_none());
    assert_eq!(common::loci_of(&env, 1), vec![(1, 600)]);
}

#[test]
fn test_missing_chains_leave_coordinates_untouched() {
    let env = TestEnvironment::new().unwrap();
    let registry = SourceRegistry::builder()
        .register(SnpFixture::new("snps").with_build(HG18).locus(1, 1, 500))
        .register(GeneFixture::new("genes").with_build(HG19).gene(GeneSpec::new("GENEA", 1, 1, 10, 20)))
        .register(GeneFixture::new("more_genes").with_build(HG19).gene(GeneSpec::new("GENEB", 2, 1, 30, 40)))
        .build()
        .unwrap();

    let report = env.update(&registry).unwrap();

    let builds = report.cascade.as_ref().unwrap().builds.as_ref().unwrap();
    assert_eq!(builds.missing_chains, vec![HG18]);
    assert_eq!(common::loci_of(&env, 1), vec![(1, 500)]);
    let db = env.open_db().unwrap();
    let snps = loki_storage::catalog::source(db.connection(), "snps").unwrap().unwrap();
    assert_eq!(snps.current_ucschg, Some(HG18));
}

#[test]
fn test_engine_over_stored_chains() {
    let env = TestEnvironment::new().unwrap();
    // forward chain with a 10 base gap, and a reverse chain on chr2
    let gapped = ChainRecord {
        old_chr: chr(1),
        old_start: 100,
        old_end: 400,
        new_chr: chr(1),
        new_start: 1_100,
        new_end: 1_390,
        score: 900,
        is_forward: true,
    };
    let reversed = ChainRecord {
        old_chr: chr(2),
        old_start: 100,
        old_end: 199,
        new_chr: chr(2),
        new_start: 1_100,
        new_end: 1_199,
        score: 500,
        is_forward: false,
    };
    let fixture = ChainFixture::new("chains", HG18, HG19)
        .chain(
            gapped,
            vec![ChainSegment::new(100, 199, 1_100), ChainSegment::new(210, 400, 1_200)],
        )
        .chain(reversed, vec![ChainSegment::new(100, 199, 1_199)]);
    env.update(&common::single(fixture)).unwrap();

    let db = env.open_db().unwrap();
    let conn = db.connection();
    assert!(ChainStore::has_chains(conn, HG18, HG19).unwrap());
    assert!(!ChainStore::has_chains(conn, HG19, HG18).unwrap());

    let mut store = ChainStore::new();
    let chains = store.get_or_load(conn, HG18, HG19).unwrap();
    assert_eq!(chains.chain_count(), 2);
    let engine = LiftoverEngine::new(chains);

    assert_eq!(engine.lift_region(chr(1), 150, 399), Some(Region::new(chr(1), 1_150, 1_389)));
    assert_eq!(engine.lift_point(chr(1), 205), None);
    assert_eq!(engine.lift_region(chr(2), 150, 160), Some(Region::new(chr(2), 1_139, 1_149)));
    assert_eq!(engine.lift_point(chr(3), 150), None);
}
