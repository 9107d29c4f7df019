//! Core utilities and types shared across all Loki crates

pub mod config;
pub mod error;
pub mod system;
pub mod types;

pub use config::{load_config, save_config, Config};
pub use error::{LokiError, LokiResult};

pub use types::{
    BiopolymerId, Build, ChainId, Chromosome, EntityTypeId, GroupId, LdProfileId, NamespaceId,
    RelationshipId, RoleId, Rs, SourceId,
};

pub use system::{generate_utc_timestamp, loki_cache_dir, loki_home, source_work_dir};

/// Version information for the Loki project
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
