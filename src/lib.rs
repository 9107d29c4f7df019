//! Loki: a genomic knowledge store
//!
//! Source loaders write provenance-tagged rows into a SQLite store; an
//! update run then settles SNP merges, lifts coordinates onto one genome
//! build, resolves names to biopolymers and groups, and rebuilds the zone
//! index used for range queries.

pub mod cli;
pub mod liftover;
pub mod merge;
pub mod names;
pub mod sources;
pub mod updater;

pub use liftover::{ChainSet, ChainStore, LiftoverEngine, Region};
pub use merge::MergeTracker;
pub use names::NameLookup;
pub use sources::{SourceLoader, SourceOptions, SourceRegistry, SourceWriter};
pub use updater::{UpdateOptions, UpdateReport, Updater};

pub use loki_core::{Config, LokiError, LokiResult};
pub use loki_storage::{KnowledgeDb, Schema};
