//! Mock source loader with failure injection

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use loki::sources::{OptionError, OptionSpec, SourceLoader, SourceOptions, SourceWriter};
use loki_core::{LokiError, Rs};

/// Where a [`MockSource`] should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Download,
    /// After its rows are written, so the rollback has something to undo
    Transform,
    /// With an error that aborts the whole run
    Fatal,
}

/// How often each loader step ran
#[derive(Debug, Default)]
pub struct MockCalls {
    pub downloads: AtomicUsize,
    pub transforms: AtomicUsize,
}

impl MockCalls {
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn transforms(&self) -> usize {
        self.transforms.load(Ordering::SeqCst)
    }
}

/// A source that writes `rows` SNP merges (`rs{base + i}` into
/// `rs{base + i + 1_000_000}`) and downloads one small file
///
/// Accepts a single option, `rows`, overriding the row count.
pub struct MockSource {
    name: String,
    version: String,
    base: Rs,
    rows: usize,
    payload: String,
    fail: Option<FailPoint>,
    calls: Arc<MockCalls>,
}

impl MockSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: "1".to_string(),
            base: 1,
            rows: 1,
            payload: format!("{} data\n", name),
            fail: None,
            calls: Arc::new(MockCalls::default()),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_rows(mut self, base: Rs, rows: usize) -> Self {
        self.base = base;
        self.rows = rows;
        self
    }

    /// Contents of the file written by `download`
    pub fn with_payload(mut self, payload: &str) -> Self {
        self.payload = payload.to_string();
        self
    }

    pub fn failing_at(mut self, point: FailPoint) -> Self {
        self.fail = Some(point);
        self
    }

    /// Shared counters; keep a handle before registering the source
    pub fn calls(&self) -> Arc<MockCalls> {
        Arc::clone(&self.calls)
    }

    fn row_count(&self, options: &SourceOptions) -> Result<usize, OptionError> {
        match options.get("rows") {
            Some(value) => value
                .parse()
                .map_err(|_| OptionError::invalid("rows", value, "expected a count")),
            None => Ok(self.rows),
        }
    }
}

impl SourceLoader for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    fn options(&self) -> Vec<OptionSpec> {
        vec![OptionSpec::new("rows", "number of merge rows to write")]
    }

    fn validate(&self, options: &SourceOptions) -> Result<(), OptionError> {
        options.reject_unknown(&self.options())?;
        self.row_count(options).map(|_| ())
    }

    fn download(&self, _options: &SourceOptions, workdir: &Path) -> Result<()> {
        self.calls.downloads.fetch_add(1, Ordering::SeqCst);
        if self.fail == Some(FailPoint::Download) {
            bail!("connection reset while fetching {}", self.name);
        }
        fs::write(workdir.join("data.txt"), &self.payload)?;
        Ok(())
    }

    fn transform(&self, options: &SourceOptions, _: &Path, writer: &mut SourceWriter<'_>) -> Result<()> {
        self.calls.transforms.fetch_add(1, Ordering::SeqCst);
        writer.delete_all()?;
        let rows = self.row_count(options)?;
        let merges: Vec<(Rs, Rs)> = (0..rows as Rs)
            .map(|i| (self.base + i, self.base + i + 1_000_000))
            .collect();
        writer.add_snp_merges(&merges)?;

        match self.fail {
            Some(FailPoint::Transform) => bail!("truncated {} input", self.name),
            Some(FailPoint::Fatal) => Err(LokiError::ReadOnly("store went read-only".to_string()).into()),
            _ => Ok(()),
        }
    }
}
