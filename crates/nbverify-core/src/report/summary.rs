//! Derived run summary.

use std::fmt::Write as _;

/// Non-blank diagnostic lines shown per failure on the console.
pub const EXCERPT_LINES: usize = 3;

const RULE_WIDTH: usize = 60;

/// A failing notebook with a truncated diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureExcerpt {
    /// Notebook path as displayed.
    pub path: String,
    /// First non-blank diagnostic lines, trimmed.
    pub lines: Vec<String>,
    /// Whether lines were cut off.
    pub truncated: bool,
}

impl FailureExcerpt {
    /// Keep the first non-blank lines of `diagnostic`.
    pub fn new(path: &str, diagnostic: &str) -> Self {
        let mut non_blank = diagnostic
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty());
        let lines: Vec<String> = non_blank
            .by_ref()
            .take(EXCERPT_LINES)
            .map(str::to_string)
            .collect();
        let truncated = non_blank.next().is_some();

        Self {
            path: path.to_string(),
            lines,
            truncated,
        }
    }
}

/// Counts by status and the failure list, computed on demand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Failing notebooks in path order.
    pub failures: Vec<FailureExcerpt>,
}

impl RunSummary {
    /// Percentage of passed among passed and failed.
    ///
    /// Skipped notebooks are left out; with nothing passed or failed the
    /// rate is 100.
    pub fn success_rate(&self) -> f64 {
        let judged = self.passed + self.failed;
        if judged == 0 {
            100.0
        } else {
            self.passed as f64 / judged as f64 * 100.0
        }
    }

    /// Render the human-readable summary block.
    pub fn render(&self) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let mut out = String::new();

        // Writing to a String cannot fail.
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "SUMMARY");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "Total notebooks: {}", self.total);
        let _ = writeln!(out, "Passed: {}", self.passed);
        let _ = writeln!(out, "Failed: {}", self.failed);
        let _ = writeln!(out, "Skipped: {}", self.skipped);

        if !self.failures.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Failed notebooks:");
            for failure in &self.failures {
                let _ = writeln!(out, "  • {}", failure.path);
                for line in &failure.lines {
                    let _ = writeln!(out, "    {}", line);
                }
                if failure.truncated {
                    let _ = writeln!(out, "    ...");
                }
            }
        }

        let _ = writeln!(out);
        let _ = write!(out, "Success rate: {:.1}%", self.success_rate());
        out
    }
}
