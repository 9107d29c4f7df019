/// Core types shared across all Loki modules
pub mod build;
pub mod chromosome;
pub mod ids;

pub use build::Build;
pub use chromosome::Chromosome;
pub use ids::{
    BiopolymerId, ChainId, EntityTypeId, GroupId, LdProfileId, NamespaceId, RelationshipId,
    RoleId, SourceId,
};

/// SNP accession number (the integer part of an `rs` identifier)
pub type Rs = i64;
