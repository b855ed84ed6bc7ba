//! Notebook execution through an external tool.
//!
//! The [`ExecutionDriver`] runs `jupyter nbconvert --execute` once per
//! [`InvocationStrategy`], stopping at the first success. Timeouts and spawn
//! failures end the attempt chain immediately; an ordinary non-zero exit moves
//! on to the next strategy.

mod context;
mod driver;
mod strategy;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

pub use context::AbortHandle;
pub use driver::{
    DEFAULT_CELL_TIMEOUT, DEFAULT_TIMEOUT, ExecutionConfig, ExecutionDriver, TOOL_ENV_VAR,
    default_cell_timeout, locate_tool,
};
pub use strategy::{DEFAULT_KERNEL, InvocationStrategy};

/// Result of executing one notebook.
///
/// Produced once per notebook and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Whether some attempt ran the notebook to completion.
    pub succeeded: bool,
    /// Captured tool output, or a note when a fallback attempt was needed.
    pub diagnostic: String,
    /// Wall-clock time across all attempts.
    pub elapsed: Duration,
    /// Number of tool invocations made.
    pub attempts: usize,
}

impl ExecutionOutcome {
    /// A successful outcome.
    pub fn succeeded(diagnostic: impl Into<String>, elapsed: Duration, attempts: usize) -> Self {
        Self {
            succeeded: true,
            diagnostic: diagnostic.into(),
            elapsed,
            attempts,
        }
    }

    /// A failed outcome.
    pub fn failed(diagnostic: impl Into<String>, elapsed: Duration, attempts: usize) -> Self {
        Self {
            succeeded: false,
            diagnostic: diagnostic.into(),
            elapsed,
            attempts,
        }
    }
}

/// Something that can execute a structurally valid notebook.
///
/// Implementations must not fail: every fault becomes a failed
/// [`ExecutionOutcome`].
pub trait NotebookExecutor: Send + Sync {
    /// Execute the notebook at `notebook`.
    fn execute(&self, notebook: &Path) -> impl Future<Output = ExecutionOutcome> + Send;
}
