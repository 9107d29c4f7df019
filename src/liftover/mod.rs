pub mod chain;
pub mod engine;

pub use chain::{Chain, ChainSegment, ChainSet, ChainStore};
pub use engine::{LiftTally, LiftoverEngine, Region, DEFAULT_MIN_COVERAGE};
