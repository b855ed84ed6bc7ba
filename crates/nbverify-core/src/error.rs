//! Error types for nbverify-core.
//!
//! Per-notebook problems are never errors: they are carried as values in
//! [`ValidationOutcome`](crate::notebook::ValidationOutcome) and
//! [`ExecutionOutcome`](crate::execute::ExecutionOutcome). The variants here
//! describe faults of the run itself.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for nbverify-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in nbverify-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid run or execution configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The external execution tool could not be located.
    #[error("execution tool not found: {0}")]
    ToolNotFound(String),

    /// A result was recorded twice for the same notebook.
    #[error("result already recorded for {0}")]
    DuplicateResult(String),

    /// Failed to write a result or failure-detail file.
    #[error("failed to write {path}: {message}")]
    Persist { path: PathBuf, message: String },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Recovery hint shown next to the error message, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::ToolNotFound(_) => Some(
                "install Jupyter (`pip install nbconvert`), pass --jupyter, or set NBVERIFY_JUPYTER",
            ),
            _ => None,
        }
    }

    /// Format the error together with its recovery hint.
    pub fn with_hint(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{}\n  hint: {}", self, hint),
            None => self.to_string(),
        }
    }
}
