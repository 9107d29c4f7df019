use std::path::Path;

use super::options::{OptionError, OptionSpec, SourceOptions};
use super::writer::SourceWriter;

/// One external data provider
///
/// The update run calls these in order: `validate`, `download` (unless in
/// cache-only mode), then `transform` inside the source's own transaction
/// scope. `download` may run on a worker thread alongside other sources, so
/// it must not touch the knowledge store.
pub trait SourceLoader: Send + Sync {
    /// Unique, lowercase source name; also the provenance label in the store
    fn name(&self) -> &str;

    /// Version string recorded with each successful run
    fn version(&self) -> String;

    /// Options this loader accepts
    fn options(&self) -> Vec<OptionSpec> {
        Vec::new()
    }

    /// Check option values before any I/O
    fn validate(&self, options: &SourceOptions) -> Result<(), OptionError> {
        options.reject_unknown(&self.options())
    }

    /// Fetch raw files into `workdir`
    fn download(&self, _options: &SourceOptions, _workdir: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    /// Parse files from `workdir` and write rows; should begin by deleting
    /// the rows this source wrote previously
    fn transform(
        &self,
        options: &SourceOptions,
        workdir: &Path,
        writer: &mut SourceWriter<'_>,
    ) -> anyhow::Result<()>;
}
