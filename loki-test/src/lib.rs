//! Test utilities for the Loki workspace
//!
//! Shared infrastructure for integration tests and benches:
//!
//! - **Test Environment**: a temporary store file plus download cache, cleaned up on drop
//! - **Fixtures**: small synthetic sources (genes, SNPs, chains, groups) built in code
//! - **Mock Implementations**: a source loader with failure injection and call counters

pub mod environment;
pub mod fixtures;
pub mod mock;

pub use environment::TestEnvironment;
pub use fixtures::{ChainFixture, GeneFixture, GeneSpec, GroupFixture, SnpFixture};
pub use mock::{FailPoint, MockCalls, MockSource};

pub use anyhow::{Context, Result};
pub use tempfile;

/// Route `tracing` output through the test harness (call once per test module)
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .try_init();
}

/// Run a test with a clean environment
pub fn with_test_env<F, R>(f: F) -> Result<R>
where
    F: FnOnce(&TestEnvironment) -> Result<R>,
{
    let env = TestEnvironment::new()?;
    f(&env)
}
