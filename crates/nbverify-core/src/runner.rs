//! Batch run over a notebook corpus.
//!
//! ```text
//! discover ──► for each path: read ──► validate ──(valid)──► execute ──► record
//!                                          │                                ▲
//!                                          └────────(invalid)───────────────┘
//! ```
//!
//! Results are recorded in discovery order even when several notebooks run
//! at once. Once the failure threshold is exceeded, or the run is aborted,
//! every notebook without a result is recorded as Skipped.

use std::path::{Path, PathBuf};
use std::pin::pin;
use std::time::Instant;

use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::discover::{Depth, discover};
use crate::execute::{AbortHandle, ExecutionDriver, NotebookExecutor};
use crate::notebook::{NotebookDocument, Validate, ValidationOutcome};
use crate::report::{ResultAggregator, RunMetadata, TestResult, TestStatus};

/// Exit status when every recorded outcome passed or was skipped.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status when at least one notebook failed.
pub const EXIT_FAILURE: i32 = 1;
/// Exit status after an operator interrupt.
pub const EXIT_INTERRUPTED: i32 = 130;

/// What the run does with structurally valid notebooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Validate, then execute.
    #[default]
    Execute,
    /// Validate only.
    StructureOnly,
}

/// Configuration of a batch run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory (or single notebook) to check.
    pub root: PathBuf,
    /// How far discovery descends.
    pub depth: Depth,
    /// Failures tolerated before the run stops.
    pub max_failures: Option<usize>,
    /// Notebooks processed at once.
    pub jobs: usize,
    /// Treat lint warnings as failures.
    pub strict: bool,
}

impl RunConfig {
    /// Sequential, non-strict run over `root`'s immediate children.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            depth: Depth::Shallow,
            max_failures: None,
            jobs: 1,
            strict: false,
        }
    }
}

/// Progress hooks for a batch run.
pub trait RunCallback: Send + Sync {
    /// Called once discovery is done.
    fn on_run_started(&self, _root: &Path, _total: usize) {}

    /// Called when a notebook's result has been recorded.
    fn on_notebook_finished(&self, path: &Path, result: &TestResult);

    /// Called when exceeding the failure threshold stops the run.
    fn on_stopped_early(&self, _failures: usize, _remaining: usize) {}

    /// Called when an abort request stops the run.
    fn on_interrupted(&self, _remaining: usize) {}
}

/// Callback that does nothing.
pub struct SilentCallback;

impl RunCallback for SilentCallback {
    fn on_notebook_finished(&self, _path: &Path, _result: &TestResult) {}
}

/// Everything a finished (or cut short) run produced.
#[derive(Debug)]
pub struct RunReport {
    /// One result per discovered notebook.
    pub results: ResultAggregator,
    /// Run id, mode and how the run ended.
    pub metadata: RunMetadata,
}

impl RunReport {
    /// Process exit status for this run.
    pub fn exit_code(&self) -> i32 {
        if self.metadata.interrupted {
            EXIT_INTERRUPTED
        } else if self.results.has_failures() {
            EXIT_FAILURE
        } else {
            EXIT_SUCCESS
        }
    }
}

/// Drives discovery, validation, execution and aggregation.
pub struct BatchRunner {
    config: RunConfig,
    abort_handle: AbortHandle,
}

impl BatchRunner {
    /// Create a new runner.
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            abort_handle: AbortHandle::new(),
        }
    }

    /// Use an externally owned abort handle.
    pub fn with_abort_handle(mut self, handle: AbortHandle) -> Self {
        self.abort_handle = handle;
        self
    }

    /// Handle that interrupts this runner.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Validate and execute every discovered notebook.
    pub async fn run<E: NotebookExecutor>(
        &self,
        executor: &E,
        callback: &dyn RunCallback,
    ) -> RunReport {
        self.drive(Some(executor), RunMode::Execute, callback).await
    }

    /// Validate every discovered notebook without executing anything.
    pub async fn check(&self, callback: &dyn RunCallback) -> RunReport {
        self.drive::<ExecutionDriver>(None, RunMode::StructureOnly, callback)
            .await
    }

    async fn drive<E: NotebookExecutor>(
        &self,
        executor: Option<&E>,
        mode: RunMode,
        callback: &dyn RunCallback,
    ) -> RunReport {
        let mut metadata = RunMetadata::new(mode);
        let paths = discover(&self.config.root, self.config.depth);
        callback.on_run_started(&self.config.root, paths.len());

        let mut results = ResultAggregator::new();
        let mut failures = 0usize;

        {
            let checks = futures::stream::iter(paths.iter())
                .map(|path| async move { (path, self.check_notebook(path, executor).await) })
                .buffered(self.config.jobs.max(1));
            let mut checks = pin!(checks);

            loop {
                let next = tokio::select! {
                    biased;
                    _ = self.abort_handle.aborted() => {
                        metadata.interrupted = true;
                        break;
                    }
                    next = checks.next() => next,
                };
                let Some((path, result)) = next else {
                    break;
                };

                let failed = result.status == TestStatus::Failed;
                callback.on_notebook_finished(path, &result);
                record(&mut results, path, result);

                if failed {
                    failures += 1;
                    if self.config.max_failures.is_some_and(|max| failures > max) {
                        metadata.stopped_early = true;
                        break;
                    }
                }
            }
            // Dropping the stream here kills any tool still running.
        }

        let remaining: Vec<&PathBuf> = paths.iter().filter(|p| !results.contains(p)).collect();
        let reason = if metadata.interrupted {
            callback.on_interrupted(remaining.len());
            "run interrupted"
        } else if metadata.stopped_early {
            callback.on_stopped_early(failures, remaining.len());
            "max failures reached"
        } else {
            ""
        };
        for path in remaining {
            let result = TestResult::skipped(reason);
            callback.on_notebook_finished(path, &result);
            record(&mut results, path, result);
        }

        RunReport { results, metadata }
    }

    /// Validate one notebook and, if valid and an executor is given, run it.
    async fn check_notebook<E: NotebookExecutor>(
        &self,
        path: &Path,
        executor: Option<&E>,
    ) -> TestResult {
        let started = Instant::now();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return TestResult::failed(format!("Error reading file: {}", e), started.elapsed());
            }
        };

        let mut validation = match NotebookDocument::from_slice(&bytes) {
            Ok(document) => {
                if let Some(version) = document.version() {
                    tracing::debug!("{} declares nbformat {}", path.display(), version);
                }
                document.validate()
            }
            Err(e) => ValidationOutcome::invalid(e),
        };
        if self.config.strict {
            validation = validation.strict();
        }
        for warning in &validation.warnings {
            tracing::warn!("{}: {}", path.display(), warning);
        }

        if !validation.valid {
            let reason = validation.reason.unwrap_or_default();
            tracing::debug!("{} is structurally invalid: {}", path.display(), reason);
            return TestResult::failed(format!("Invalid format: {}", reason), started.elapsed());
        }

        let Some(executor) = executor else {
            return TestResult::passed(None, started.elapsed()).with_warnings(validation.warnings);
        };

        TestResult::from(executor.execute(path).await).with_warnings(validation.warnings)
    }
}

/// Record a result, keeping the run alive if the aggregator refuses it.
fn record(results: &mut ResultAggregator, path: &Path, result: TestResult) {
    if let Err(e) = results.record(path, result) {
        tracing::error!("Dropping result for {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::ExecutionOutcome;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Recording {
        calls: Mutex<Vec<PathBuf>>,
    }

    impl NotebookExecutor for Recording {
        async fn execute(&self, notebook: &Path) -> ExecutionOutcome {
            self.calls.lock().unwrap().push(notebook.to_path_buf());
            ExecutionOutcome::succeeded("", Duration::ZERO, 1)
        }
    }

    #[test]
    fn test_exit_codes() {
        let mut report = RunReport {
            results: ResultAggregator::new(),
            metadata: RunMetadata::new(RunMode::Execute),
        };
        assert_eq!(report.exit_code(), EXIT_SUCCESS);

        report
            .results
            .record(Path::new("a.ipynb"), TestResult::failed("x", Duration::ZERO))
            .unwrap();
        assert_eq!(report.exit_code(), EXIT_FAILURE);

        report.metadata.interrupted = true;
        assert_eq!(report.exit_code(), EXIT_INTERRUPTED);
    }

    #[tokio::test]
    async fn test_empty_corpus_passes() {
        let temp = tempfile::TempDir::new().unwrap();
        let runner = BatchRunner::new(RunConfig::new(temp.path().join("missing")));
        let executor = Recording {
            calls: Mutex::new(Vec::new()),
        };

        let report = runner.run(&executor, &SilentCallback).await;
        assert!(report.results.is_empty());
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pre_aborted_run_skips_everything() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.ipynb"), "{}").unwrap();

        let runner = BatchRunner::new(RunConfig::new(temp.path()));
        runner.abort_handle().abort();

        let report = runner.check(&SilentCallback).await;
        assert!(report.metadata.interrupted);
        assert_eq!(report.results.summary().skipped, 1);
        assert_eq!(report.exit_code(), EXIT_INTERRUPTED);
    }
}
