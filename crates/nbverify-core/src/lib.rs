//! Core engine for batch notebook verification.
//!
//! This crate provides:
//! - Discovery of `.ipynb` files in a directory tree
//! - Structural validation for legacy (worksheet) and modern notebook formats
//! - Execution through `jupyter nbconvert` with timeout and kernel fallback
//! - Result aggregation, summaries and result files

pub mod discover;
pub mod error;
pub mod execute;
pub mod notebook;
pub mod report;
pub mod runner;

pub use discover::{Depth, discover};
pub use error::{Error, Result};
pub use execute::{
    AbortHandle, ExecutionConfig, ExecutionDriver, ExecutionOutcome, InvocationStrategy,
    NotebookExecutor,
};
pub use notebook::{NotebookDocument, Validate, ValidationOutcome, validate_bytes};
pub use report::{ResultAggregator, ResultFile, RunMetadata, RunSummary, TestResult, TestStatus};
pub use runner::{BatchRunner, RunCallback, RunConfig, RunMode, RunReport, SilentCallback};
