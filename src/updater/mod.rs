/// Update orchestration: per-source loading and the post-processing cascade
pub mod builds;
pub mod cascade;
pub mod fingerprint;
pub mod orchestrator;
pub mod report;
pub mod stage;
pub mod tables;
pub mod zones;

pub use builds::{choose_target_build, cross_map_builds, update_builds, BuildReport, LiftSettings};
pub use cascade::{run_cascade, CascadeReport, CascadeSettings};
pub use fingerprint::{fingerprint_dir, fingerprint_file, FileFingerprint, LastRun};
pub use orchestrator::{is_fatal, UpdateOptions, Updater};
pub use report::{SourceReport, UpdateReport};
pub use stage::SourceStage;
pub use tables::TableTracker;
pub use zones::{rebuild_zones, zones_for, ZoneStats};
