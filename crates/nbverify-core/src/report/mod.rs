//! Result aggregation, summaries and persistence.

mod aggregator;
mod persist;
mod summary;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::execute::ExecutionOutcome;

pub use aggregator::ResultAggregator;
pub use persist::{ResultFile, RunMetadata};
pub use summary::{FailureExcerpt, RunSummary};

/// Final status of one notebook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

/// Outcome recorded for one notebook.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    /// Final status.
    pub status: TestStatus,
    /// Error text for failures, the reason for skips, or an audit note for
    /// notebooks that passed through a fallback attempt.
    pub diagnostic: Option<String>,
    /// Wall-clock time spent on the notebook.
    pub elapsed: Duration,
    /// Structural lint warnings.
    pub warnings: Vec<String>,
}

impl TestResult {
    /// A pass, optionally carrying a fallback note.
    pub fn passed(note: Option<String>, elapsed: Duration) -> Self {
        Self {
            status: TestStatus::Passed,
            diagnostic: note,
            elapsed,
            warnings: Vec::new(),
        }
    }

    /// A failure with its full diagnostic.
    pub fn failed(diagnostic: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            status: TestStatus::Failed,
            diagnostic: Some(diagnostic.into()),
            elapsed,
            warnings: Vec::new(),
        }
    }

    /// A notebook that was never checked, with the reason.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Skipped,
            diagnostic: Some(reason.into()),
            elapsed: Duration::ZERO,
            warnings: Vec::new(),
        }
    }

    /// Attach structural lint warnings.
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

impl From<ExecutionOutcome> for TestResult {
    fn from(outcome: ExecutionOutcome) -> Self {
        if outcome.succeeded {
            let note = Some(outcome.diagnostic).filter(|d| !d.is_empty());
            TestResult::passed(note, outcome.elapsed)
        } else {
            TestResult::failed(outcome.diagnostic, outcome.elapsed)
        }
    }
}
