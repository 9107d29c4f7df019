/// End-to-end update runs: skipping unchanged sources, per-source rollback,
/// option handling and finalized stores
mod common;

use std::collections::BTreeMap;

use loki::sources::{SourceOptions, SourceRegistry};
use loki::updater::{is_fatal, SourceStage, UpdateOptions};
use loki_core::LokiError;
use loki_storage::settings;
use loki_test::{FailPoint, GeneFixture, GeneSpec, MockSource, TestEnvironment};
use pretty_assertions::assert_eq;

fn two_sources() -> SourceRegistry {
    SourceRegistry::builder()
        .register(MockSource::new("alpha").with_rows(1, 2))
        .register(MockSource::new("beta").with_rows(100, 3))
        .build()
        .unwrap()
}

#[test]
fn test_first_run_processes_every_source() {
    let env = TestEnvironment::new().unwrap();
    let report = env.update(&two_sources()).unwrap();

    assert!(report.is_success());
    assert_eq!(report.processed().count(), 2);
    assert_eq!(report.source("alpha").unwrap().stage, SourceStage::Committed);
    assert_eq!(report.source("beta").unwrap().stage, SourceStage::Committed);
    assert_eq!(report.source("alpha").unwrap().files, 1);
    assert_eq!(env.count("snp_merge").unwrap(), 5);
    assert_eq!(env.count("source_file").unwrap(), 2);
}

#[test]
fn test_unchanged_rerun_is_skipped() {
    let env = TestEnvironment::new().unwrap();
    let alpha = MockSource::new("alpha").with_rows(1, 2);
    let alpha_calls = alpha.calls();
    let registry = SourceRegistry::builder()
        .register(alpha)
        .register(MockSource::new("beta").with_rows(100, 3))
        .register(
            GeneFixture::new("genes")
                .with_zone_size(5_000)
                .gene(GeneSpec::new("GENEA", 1, 1, 1_000, 12_000)),
        )
        .build()
        .unwrap();

    let first = env.update(&registry).unwrap();
    assert!(first.cascade.as_ref().unwrap().zones.is_some());
    {
        let db = env.open_db().unwrap();
        settings::set_optimized(db.connection(), true).unwrap();
    }
    let updated = common::source_updated(&env, "alpha");
    let merges = env.count("snp_merge").unwrap();
    let stored_settings = common::settings_of(&env);
    let zones = common::zones_of(&env);

    let report = env.update(&registry).unwrap();

    assert!(report.is_success());
    assert_eq!(report.skipped().count(), 3);
    assert_eq!(report.processed().count(), 0);
    assert_eq!(alpha_calls.downloads(), 2);
    assert_eq!(alpha_calls.transforms(), 1);
    assert_eq!(common::source_updated(&env, "alpha"), updated);
    assert_eq!(env.count("snp_merge").unwrap(), merges);

    // nothing in the store moves: the source's zone size and the optimized flag survive
    let cascade = report.cascade.as_ref().unwrap();
    assert!(cascade.zones.is_none());
    assert!(cascade.reindexed.is_empty());
    assert_eq!(common::settings_of(&env), stored_settings);
    assert_eq!(zones, vec![(1, 1, 0), (1, 1, 1), (1, 1, 2)]);
    assert_eq!(common::zones_of(&env), zones);
    let db = env.open_db().unwrap();
    assert_eq!(settings::zone_size(db.connection()).unwrap(), 5_000);
    assert!(settings::is_optimized(db.connection()).unwrap());
}

#[test]
fn test_configured_zone_size_replaces_stored_one() {
    let env = TestEnvironment::new().unwrap();
    let registry = common::single(GeneFixture::new("genes").gene(GeneSpec::new("GENEA", 1, 1, 1_000, 12_000)));
    env.update(&registry).unwrap();
    assert_eq!(common::zones_of(&env).len(), 1);

    let options = UpdateOptions {
        zone_size: Some(5_000),
        ..env.update_options()
    };
    let report = env.update_with(&registry, options, None, &BTreeMap::new()).unwrap();

    assert_eq!(report.skipped().count(), 1);
    assert!(report.cascade.as_ref().unwrap().zones.is_some());
    assert_eq!(common::zones_of(&env).len(), 3);
}

#[test]
fn test_changed_file_is_reprocessed() {
    let env = TestEnvironment::new().unwrap();
    env.update(&common::single(MockSource::new("alpha"))).unwrap();

    let changed = common::single(MockSource::new("alpha").with_payload("alpha data, revised\n"));
    let report = env.update(&changed).unwrap();

    assert_eq!(report.source("alpha").unwrap().stage, SourceStage::Committed);
}

#[test]
fn test_new_loader_version_is_reprocessed() {
    let env = TestEnvironment::new().unwrap();
    env.update(&common::single(MockSource::new("alpha"))).unwrap();

    let report = env
        .update(&common::single(MockSource::new("alpha").with_version("2")))
        .unwrap();

    assert_eq!(report.source("alpha").unwrap().stage, SourceStage::Committed);
    let db = env.open_db().unwrap();
    let source = loki_storage::catalog::source(db.connection(), "alpha").unwrap().unwrap();
    assert_eq!(source.version.as_deref(), Some("2"));
}

#[test]
fn test_force_reprocesses_unchanged_sources() {
    let env = TestEnvironment::new().unwrap();
    let source = MockSource::new("alpha");
    let calls = source.calls();
    let registry = common::single(source);
    env.update(&registry).unwrap();

    let options = UpdateOptions {
        force: true,
        ..env.update_options()
    };
    let report = env.update_with(&registry, options, None, &BTreeMap::new()).unwrap();

    assert_eq!(report.source("alpha").unwrap().stage, SourceStage::Committed);
    assert_eq!(calls.transforms(), 2);
    assert_eq!(env.count("snp_merge").unwrap(), 1);
}

#[test]
fn test_cache_only_skips_downloads() {
    let env = TestEnvironment::new().unwrap();
    let source = MockSource::new("alpha");
    let calls = source.calls();
    env.write_source_file("alpha", "data.txt", "cached copy\n").unwrap();

    let options = UpdateOptions {
        cache_only: true,
        ..env.update_options()
    };
    let report = env
        .update_with(&common::single(source), options, None, &BTreeMap::new())
        .unwrap();

    assert!(report.is_success());
    assert_eq!(calls.downloads(), 0);
    assert_eq!(report.source("alpha").unwrap().files, 1);
}

#[test]
fn test_failed_transform_leaves_other_sources_committed() {
    let env = TestEnvironment::new().unwrap();
    let registry = SourceRegistry::builder()
        .register(MockSource::new("alpha").with_rows(1, 2))
        .register(MockSource::new("beta").with_rows(100, 5).failing_at(FailPoint::Transform))
        .register(MockSource::new("gamma").with_rows(200, 1))
        .build()
        .unwrap();

    let report = env.update(&registry).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed.iter().collect::<Vec<_>>(), vec!["beta"]);
    let beta = report.source("beta").unwrap();
    assert_eq!(beta.stage, SourceStage::FailedRolledBack);
    assert!(beta.error.as_deref().unwrap().contains("truncated beta input"));
    assert_eq!(report.source("gamma").unwrap().stage, SourceStage::Committed);
    assert_eq!(env.count("snp_merge").unwrap(), 3);
    assert_eq!(env.query_i64("SELECT COUNT() FROM snp_merge WHERE rs_merged >= 100 AND rs_merged < 200").unwrap(), 0);
}

#[test]
fn test_failed_source_keeps_previous_rows() {
    let env = TestEnvironment::new().unwrap();
    env.update(&common::single(MockSource::new("beta").with_rows(100, 2)))
        .unwrap();

    let broken = MockSource::new("beta")
        .with_version("2")
        .with_rows(100, 9)
        .failing_at(FailPoint::Transform);
    let report = env.update(&common::single(broken)).unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(env.count("snp_merge").unwrap(), 2);
    let db = env.open_db().unwrap();
    let source = loki_storage::catalog::source(db.connection(), "beta").unwrap().unwrap();
    assert_eq!(source.version.as_deref(), Some("1"));
}

#[test]
fn test_download_failure_never_transforms() {
    let env = TestEnvironment::new().unwrap();
    let source = MockSource::new("alpha").failing_at(FailPoint::Download);
    let calls = source.calls();

    let report = env.update(&common::single(source)).unwrap();

    assert_eq!(report.source("alpha").unwrap().stage, SourceStage::FailedRolledBack);
    assert_eq!(calls.transforms(), 0);
    assert_eq!(env.count("snp_merge").unwrap(), 0);
}

#[test]
fn test_fatal_error_rolls_back_the_whole_run() {
    let env = TestEnvironment::new().unwrap();
    let registry = SourceRegistry::builder()
        .register(MockSource::new("alpha").with_rows(1, 2))
        .register(MockSource::new("omega").failing_at(FailPoint::Fatal))
        .build()
        .unwrap();

    let err = env.update(&registry).unwrap_err();

    assert!(is_fatal(&err));
    assert_eq!(env.count("snp_merge").unwrap(), 0);
    assert_eq!(env.count("source").unwrap(), 0);
}

#[test]
fn test_source_options_and_selection() {
    let env = TestEnvironment::new().unwrap();
    let mut source_options = BTreeMap::new();
    source_options.insert("alpha".to_string(), SourceOptions::new().with("rows", "4"));
    source_options.insert("beta".to_string(), SourceOptions::new().with("rows", "many"));

    let report = env
        .update_with(
            &two_sources(),
            env.update_options(),
            Some(&["Alpha", "beta", "delta"]),
            &source_options,
        )
        .unwrap();

    assert_eq!(report.unknown, vec!["delta".to_string()]);
    assert_eq!(report.source("alpha").unwrap().stage, SourceStage::Committed);
    let beta = report.source("beta").unwrap();
    assert_eq!(beta.stage, SourceStage::FailedRolledBack);
    assert!(beta.error.as_deref().unwrap().contains("many"));
    assert_eq!(env.count("snp_merge").unwrap(), 4);
}

#[test]
fn test_changed_options_are_reprocessed() {
    let env = TestEnvironment::new().unwrap();
    let registry = common::single(MockSource::new("alpha"));
    env.update(&registry).unwrap();

    let mut source_options = BTreeMap::new();
    source_options.insert("alpha".to_string(), SourceOptions::new().with("rows", "3"));
    let report = env
        .update_with(&registry, env.update_options(), None, &source_options)
        .unwrap();

    assert_eq!(report.source("alpha").unwrap().stage, SourceStage::Committed);
    assert_eq!(env.count("snp_merge").unwrap(), 3);
    assert_eq!(env.count("source_option").unwrap(), 1);
}

#[test]
fn test_finalized_store_is_rejected() {
    let env = TestEnvironment::new().unwrap();
    {
        let db = env.open_db().unwrap();
        settings::set(db.connection(), settings::FINALIZED, "1").unwrap();
    }

    let err = env.update(&two_sources()).unwrap_err();

    assert!(matches!(err.downcast_ref::<LokiError>(), Some(LokiError::Finalized)));
    assert_eq!(env.count("source").unwrap(), 0);
}
