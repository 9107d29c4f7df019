/// Outcome of an update run
use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use super::cascade::CascadeReport;
use super::stage::SourceStage;

#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub name: String,
    pub stage: SourceStage,
    pub error: Option<String>,
    /// When the skipped source last changed
    pub last_updated: Option<String>,
    pub files: usize,
}

impl SourceReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage: SourceStage::Pending,
            error: None,
            last_updated: None,
            files: 0,
        }
    }

    pub fn advance(&mut self, next: SourceStage) {
        debug_assert!(
            self.stage.can_transition_to(next),
            "{}: {} -> {}",
            self.name,
            self.stage,
            next
        );
        debug!("{}: {} -> {}", self.name, self.stage, next);
        self.stage = next;
    }

    pub fn fail(&mut self, error: &anyhow::Error) {
        self.advance(SourceStage::FailedRolledBack);
        self.error = Some(format!("{:#}", error));
    }

    pub fn skipped(&self) -> bool {
        self.stage == SourceStage::Skipped
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    pub sources: Vec<SourceReport>,
    pub failed: BTreeSet<String>,
    /// Requested names with no registered loader
    pub unknown: Vec<String>,
    pub cascade: Option<CascadeReport>,
}

impl UpdateReport {
    /// False when any source failed, even though the run committed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|source| source.name == name)
    }

    pub fn processed(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|source| source.stage == SourceStage::Committed)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|source| source.skipped())
    }

    pub(crate) fn record(&mut self, source: SourceReport) {
        if source.stage.is_failed() {
            self.failed.insert(source.name.clone());
        }
        self.sources.push(source);
    }

    pub fn log_summary(&self) {
        info!(
            "Update finished: {} processed, {} skipped, {} failed",
            self.processed().count(),
            self.skipped().count(),
            self.failed.len()
        );
        if !self.failed.is_empty() {
            let names: Vec<&str> = self.failed.iter().map(String::as_str).collect();
            warn!("Some data sources failed to update: {}", names.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_source_marks_run() {
        let mut report = UpdateReport::default();
        assert!(report.is_success());

        let mut ok = SourceReport::new("genes");
        ok.advance(SourceStage::ValidatingOptions);
        ok.advance(SourceStage::AnalyzingFiles);
        ok.advance(SourceStage::Skipped);
        report.record(ok);

        let mut bad = SourceReport::new("snps");
        bad.advance(SourceStage::ValidatingOptions);
        bad.fail(&anyhow::anyhow!("bad header"));
        report.record(bad);

        assert!(!report.is_success());
        assert_eq!(report.skipped().count(), 1);
        assert_eq!(report.processed().count(), 0);
        assert_eq!(report.source("snps").and_then(|s| s.error.as_deref()), Some("bad header"));
    }
}
