/// SNP merge tracking and forward propagation
pub mod propagate;
pub mod tracker;

pub use propagate::{
    current_rs, dedup_loci, dedup_merges, dedup_roles, propagate_gwas, propagate_loci,
    propagate_roles, snp_loci_by_rs, CurrentRsTally,
};
pub use tracker::{flatten_stored_merges, MergeTracker, DEFAULT_HOP_LIMIT};
