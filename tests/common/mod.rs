//! Shared helpers for the integration tests
#![allow(dead_code)]

use loki::names::NameLookup;
use loki::sources::{SourceLoader, SourceRegistry};
use loki_core::Rs;
use loki_test::TestEnvironment;

pub fn single<L: SourceLoader + 'static>(loader: L) -> SourceRegistry {
    SourceRegistry::builder().register(loader).build().expect("valid registry")
}

/// Labels of the biopolymers `name` resolves to in `namespace`
pub fn labels_for(env: &TestEnvironment, namespace: &str, name: &str) -> Vec<String> {
    let db = env.open_db().expect("open store");
    let conn = db.connection();
    let ids = NameLookup::biopolymers(conn)
        .lookup(namespace, name)
        .expect("lookup");
    let mut labels: Vec<String> = ids
        .iter()
        .map(|id| {
            conn.query_row(
                "SELECT label FROM biopolymer WHERE biopolymer_id = ?1",
                [id],
                |row| row.get(0),
            )
            .expect("label")
        })
        .collect();
    labels.sort();
    labels
}

/// Every `(chr, pos)` stored for `rs`, sorted
pub fn loci_of(env: &TestEnvironment, rs: Rs) -> Vec<(i64, i64)> {
    let db = env.open_db().expect("open store");
    let mut stmt = db
        .connection()
        .prepare("SELECT chr, pos FROM snp_locus WHERE rs = ?1 ORDER BY chr, pos")
        .expect("prepare");
    let rows = stmt
        .query_map([rs], |row| Ok((row.get(0)?, row.get(1)?)))
        .expect("query");
    rows.collect::<Result<_, _>>().expect("rows")
}

pub fn source_updated(env: &TestEnvironment, name: &str) -> Option<String> {
    let db = env.open_db().expect("open store");
    loki_storage::catalog::source(db.connection(), name)
        .expect("source lookup")
        .and_then(|source| source.updated)
}

/// Every stored setting, sorted by key
pub fn settings_of(env: &TestEnvironment) -> Vec<(String, Option<String>)> {
    let db = env.open_db().expect("open store");
    let mut stmt = db
        .connection()
        .prepare("SELECT setting, value FROM setting ORDER BY setting")
        .expect("prepare");
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .expect("query");
    rows.collect::<Result<_, _>>().expect("rows")
}

/// Every `(biopolymer_id, chr, zone)` row, sorted
pub fn zones_of(env: &TestEnvironment) -> Vec<(i64, i64, i64)> {
    let db = env.open_db().expect("open store");
    let mut stmt = db
        .connection()
        .prepare("SELECT biopolymer_id, chr, zone FROM biopolymer_zone ORDER BY 1, 2, 3")
        .expect("prepare");
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .expect("query");
    rows.collect::<Result<_, _>>().expect("rows")
}
