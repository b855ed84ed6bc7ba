//! Terminal progress output for batch runs.

use std::path::Path;
use std::time::Duration;

use nbverify_core::{RunCallback, TestResult, TestStatus};

use crate::colors;

/// Prints one status line per notebook as results come in.
pub struct ProgressCallback {
    verbose: bool,
}

impl ProgressCallback {
    /// Create a new progress callback.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl RunCallback for ProgressCallback {
    fn on_run_started(&self, root: &Path, total: usize) {
        println!(
            "{}Found{} {} notebook(s) in {}{}{}\n",
            colors::CYAN,
            colors::RESET,
            total,
            colors::BOLD,
            root.display(),
            colors::RESET
        );
        colors::flush_stdout();
    }

    fn on_notebook_finished(&self, path: &Path, result: &TestResult) {
        match result.status {
            TestStatus::Passed => {
                println!(
                    "{}✓ PASSED{}  {} {}",
                    colors::GREEN,
                    colors::RESET,
                    path.display(),
                    elapsed(result.elapsed)
                );
                if let Some(note) = &result.diagnostic {
                    let first = note.lines().next().unwrap_or_default();
                    println!("{}    note: {}{}", colors::DIM, first, colors::RESET);
                }
            }
            TestStatus::Failed => {
                println!(
                    "{}✗ FAILED{}  {} {}",
                    colors::RED,
                    colors::RESET,
                    path.display(),
                    elapsed(result.elapsed)
                );
                let diagnostic = result.diagnostic.as_deref().unwrap_or_default();
                if self.verbose {
                    for line in diagnostic.lines() {
                        println!("    {}", line);
                    }
                } else if let Some(first) = diagnostic.lines().find(|l| !l.trim().is_empty()) {
                    println!("    {}", first);
                }
            }
            TestStatus::Skipped => {
                println!(
                    "{}- SKIPPED{} {} {}({}){}",
                    colors::YELLOW,
                    colors::RESET,
                    path.display(),
                    colors::DIM,
                    result.diagnostic.as_deref().unwrap_or("skipped"),
                    colors::RESET
                );
            }
        }

        for warning in &result.warnings {
            println!("{}    warning:{} {}", colors::YELLOW, colors::RESET, warning);
        }
        colors::flush_stdout();
    }

    fn on_stopped_early(&self, failures: usize, remaining: usize) {
        println!(
            "\n{}Stopping after {} failure(s); {} notebook(s) not run.{}",
            colors::YELLOW,
            failures,
            remaining,
            colors::RESET
        );
    }

    fn on_interrupted(&self, remaining: usize) {
        println!(
            "\n{}Interrupted; {} notebook(s) not run.{}",
            colors::YELLOW,
            remaining,
            colors::RESET
        );
    }
}

fn elapsed(duration: Duration) -> String {
    format!("{}({:.1}s){}", colors::DIM, duration.as_secs_f64(), colors::RESET)
}
