/// Lifecycle of one source within an update run
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceStage {
    Pending,
    ValidatingOptions,
    Downloading,
    AnalyzingFiles,
    Skipped,
    Processing,
    Committed,
    FailedRolledBack,
}

impl SourceStage {
    pub fn name(&self) -> &'static str {
        match self {
            SourceStage::Pending => "pending",
            SourceStage::ValidatingOptions => "validating-options",
            SourceStage::Downloading => "downloading",
            SourceStage::AnalyzingFiles => "analyzing-files",
            SourceStage::Skipped => "skipped",
            SourceStage::Processing => "processing",
            SourceStage::Committed => "committed",
            SourceStage::FailedRolledBack => "failed-rolled-back",
        }
    }

    /// Skipped and committed sources both count as successful
    pub fn is_complete(&self) -> bool {
        matches!(self, SourceStage::Skipped | SourceStage::Committed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SourceStage::FailedRolledBack)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_complete() || self.is_failed()
    }

    /// Whether a source in this stage may move to `next`
    ///
    /// Any non-terminal stage may fail. Downloading is optional, so
    /// validation may lead straight to file analysis.
    pub fn can_transition_to(&self, next: SourceStage) -> bool {
        use SourceStage::*;
        if next == FailedRolledBack {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Pending, ValidatingOptions)
                | (ValidatingOptions, Downloading)
                | (ValidatingOptions, AnalyzingFiles)
                | (Downloading, AnalyzingFiles)
                | (AnalyzingFiles, Skipped)
                | (AnalyzingFiles, Processing)
                | (Processing, Committed)
        )
    }
}

impl fmt::Display for SourceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(SourceStage::Pending, SourceStage::ValidatingOptions, true)]
    #[test_case(SourceStage::ValidatingOptions, SourceStage::AnalyzingFiles, true ; "cache only")]
    #[test_case(SourceStage::AnalyzingFiles, SourceStage::Skipped, true)]
    #[test_case(SourceStage::Processing, SourceStage::FailedRolledBack, true)]
    #[test_case(SourceStage::Pending, SourceStage::Processing, false)]
    #[test_case(SourceStage::Skipped, SourceStage::Processing, false)]
    #[test_case(SourceStage::Committed, SourceStage::FailedRolledBack, false)]
    fn test_transitions(from: SourceStage, to: SourceStage, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_outcomes() {
        assert!(SourceStage::Skipped.is_complete());
        assert!(SourceStage::Committed.is_complete());
        assert!(!SourceStage::Processing.is_terminal());
        assert!(SourceStage::FailedRolledBack.is_failed());
        assert_eq!(SourceStage::FailedRolledBack.to_string(), "failed-rolled-back");
    }
}
