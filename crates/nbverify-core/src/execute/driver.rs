//! Subprocess driver for `jupyter nbconvert --execute`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};

use tokio::process::Command;

use crate::error::{Error, Result};

use super::strategy::{DEFAULT_KERNEL, InvocationStrategy};
use super::{ExecutionOutcome, NotebookExecutor};

/// Default wall-clock bound on one tool invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default per-cell bound handed to the tool.
pub const DEFAULT_CELL_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable overriding the tool location.
pub const TOOL_ENV_VAR: &str = "NBVERIFY_JUPYTER";

const TOOL_NAME: &str = "jupyter";
const TOOL_SUBCOMMAND: &str = "nbconvert";

/// Per-cell timeout used when none is given explicitly.
///
/// Stays at [`DEFAULT_CELL_TIMEOUT`] unless the overall timeout is not larger
/// than that, in which case half of the overall timeout is used.
pub fn default_cell_timeout(timeout: Duration) -> Duration {
    if timeout > DEFAULT_CELL_TIMEOUT {
        DEFAULT_CELL_TIMEOUT
    } else {
        Duration::from_secs((timeout.as_secs() / 2).max(1))
    }
}

/// Locate the execution tool.
///
/// Looks in the following order:
/// 1. The explicitly given path or command name
/// 2. `NBVERIFY_JUPYTER` environment variable
/// 3. `jupyter` on the system PATH
pub fn locate_tool(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return which::which(path)
            .map_err(|e| Error::ToolNotFound(format!("{}: {}", path.display(), e)));
    }

    if let Ok(path) = std::env::var(TOOL_ENV_VAR) {
        return which::which(&path)
            .map_err(|e| Error::ToolNotFound(format!("{}={}: {}", TOOL_ENV_VAR, path, e)));
    }

    which::which(TOOL_NAME)
        .map_err(|_| Error::ToolNotFound(format!("'{}' is not on PATH", TOOL_NAME)))
}

/// Configuration of the execution driver.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Tool executable.
    pub program: PathBuf,
    /// Arguments placed before the strategy arguments.
    pub program_args: Vec<OsString>,
    /// Wall-clock bound on each invocation.
    pub timeout: Duration,
    /// Per-cell bound handed to the tool. Always smaller than `timeout`.
    pub cell_timeout: Duration,
    /// Strategies tried in order.
    pub strategies: Vec<InvocationStrategy>,
}

impl ExecutionConfig {
    /// Create a configuration for `jupyter nbconvert`.
    ///
    /// # Errors
    /// Returns [`Error::Config`] unless `cell_timeout` is at least one second
    /// and strictly smaller than `timeout`.
    pub fn new(program: impl Into<PathBuf>, timeout: Duration, cell_timeout: Duration) -> Result<Self> {
        if cell_timeout.as_secs() < 1 {
            return Err(Error::Config(
                "per-cell timeout must be at least one second".to_string(),
            ));
        }
        if cell_timeout >= timeout {
            return Err(Error::Config(format!(
                "per-cell timeout ({}) must be smaller than the overall timeout ({})",
                format_duration(cell_timeout),
                format_duration(timeout)
            )));
        }

        Ok(Self {
            program: program.into(),
            program_args: vec![TOOL_SUBCOMMAND.into()],
            timeout,
            cell_timeout,
            strategies: InvocationStrategy::default_chain(DEFAULT_KERNEL),
        })
    }

    /// Replace the arguments placed before the strategy arguments.
    pub fn with_program_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the strategy chain.
    pub fn with_strategies(mut self, strategies: Vec<InvocationStrategy>) -> Result<Self> {
        if strategies.is_empty() {
            return Err(Error::Config(
                "at least one invocation strategy is required".to_string(),
            ));
        }
        self.strategies = strategies;
        Ok(self)
    }
}

/// How a single invocation ended.
#[derive(Debug)]
enum Attempt {
    Succeeded,
    Failed(String),
    TimedOut,
    Fault(String),
}

/// Runs notebooks through the external tool, falling back across strategies.
#[derive(Debug, Clone)]
pub struct ExecutionDriver {
    config: ExecutionConfig,
}

impl ExecutionDriver {
    /// Create a new driver.
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    /// The driver configuration.
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Execute a notebook, trying each strategy until one succeeds.
    ///
    /// A timeout or a failure to spawn the tool ends the chain. Diagnostics of
    /// every failed attempt are kept.
    pub async fn run(&self, notebook: &Path) -> ExecutionOutcome {
        let started = Instant::now();
        let mut failures: Vec<(String, String)> = Vec::new();

        for (index, strategy) in self.config.strategies.iter().enumerate() {
            let attempts = index + 1;
            match self.attempt(strategy, notebook).await {
                Attempt::Succeeded if failures.is_empty() => {
                    return ExecutionOutcome::succeeded("", started.elapsed(), attempts);
                }
                Attempt::Succeeded => {
                    tracing::info!(
                        "{} passed with fallback ({})",
                        notebook.display(),
                        strategy.label
                    );
                    let note = format!(
                        "passed with fallback ({}) after earlier failure:\n{}",
                        strategy.label,
                        labeled(&failures)
                    );
                    return ExecutionOutcome::succeeded(note, started.elapsed(), attempts);
                }
                Attempt::Failed(diagnostic) => {
                    tracing::debug!(
                        "{} failed with {}: {}",
                        notebook.display(),
                        strategy.label,
                        first_line(&diagnostic)
                    );
                    failures.push((strategy.label.clone(), diagnostic));
                }
                Attempt::TimedOut => {
                    let message = format!(
                        "Execution timed out after {}",
                        format_duration(self.config.timeout)
                    );
                    failures.push((strategy.label.clone(), message));
                    return ExecutionOutcome::failed(
                        join_failures(&failures),
                        started.elapsed(),
                        attempts,
                    );
                }
                Attempt::Fault(message) => {
                    tracing::warn!("{}: {}", notebook.display(), message);
                    failures.push((strategy.label.clone(), message));
                    return ExecutionOutcome::failed(
                        join_failures(&failures),
                        started.elapsed(),
                        attempts,
                    );
                }
            }
        }

        ExecutionOutcome::failed(
            join_failures(&failures),
            started.elapsed(),
            failures.len(),
        )
    }

    /// Run the tool once.
    async fn attempt(&self, strategy: &InvocationStrategy, notebook: &Path) -> Attempt {
        // Removed when dropped, on every return path below.
        let output_file = match tempfile::Builder::new()
            .prefix("nbverify-")
            .suffix(".ipynb")
            .tempfile()
        {
            Ok(file) => file,
            Err(e) => return Attempt::Fault(format!("failed to allocate temporary output: {}", e)),
        };

        let args = strategy.args(self.config.cell_timeout, output_file.path(), notebook);
        tracing::debug!(
            "Invoking {} {:?} {:?}",
            self.config.program.display(),
            self.config.program_args,
            args
        );

        let child = Command::new(&self.config.program)
            .args(&self.config.program_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                return Attempt::Fault(format!(
                    "Execution error: failed to spawn '{}': {}",
                    self.config.program.display(),
                    e
                ));
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await {
            Err(_) => Attempt::TimedOut,
            Ok(Err(e)) => Attempt::Fault(format!(
                "Execution error: failed to wait for '{}': {}",
                self.config.program.display(),
                e
            )),
            Ok(Ok(output)) if output.status.success() => Attempt::Succeeded,
            Ok(Ok(output)) => Attempt::Failed(describe_failure(&output)),
        }
    }
}

impl NotebookExecutor for ExecutionDriver {
    fn execute(
        &self,
        notebook: &Path,
    ) -> impl std::future::Future<Output = ExecutionOutcome> + Send {
        self.run(notebook)
    }
}

/// Exit status followed by stderr and stdout.
fn describe_failure(output: &Output) -> String {
    let mut parts = vec![format!("tool {}", output.status)];
    for stream in [&output.stderr, &output.stdout] {
        let text = String::from_utf8_lossy(stream);
        let text = text.trim();
        if !text.is_empty() {
            parts.push(text.to_string());
        }
    }
    parts.join("\n")
}

/// A single failure is reported as is; several are labeled per attempt.
fn join_failures(failures: &[(String, String)]) -> String {
    match failures {
        [(_, only)] => only.clone(),
        _ => labeled(failures),
    }
}

fn labeled(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .enumerate()
        .map(|(i, (label, diagnostic))| format!("[attempt {}: {}]\n{}", i + 1, label, diagnostic))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{} seconds", duration.as_secs())
    } else {
        format!("{:.1} seconds", duration.as_secs_f64())
    }
}
