//! Durable result files.
//!
//! The JSON result file holds the full pass/fail/skip lists together with the
//! untruncated diagnostic of every failing notebook. Optional per-failure
//! detail files mirror the same text in plain form.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::runner::RunMode;

use super::aggregator::ResultAggregator;
use super::{TestResult, TestStatus};

/// Facts about the run that produced a result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub started_at_unix: u64,
    pub mode: RunMode,
    pub interrupted: bool,
    pub stopped_early: bool,
}

impl RunMetadata {
    /// Metadata for a run starting now.
    pub fn new(mode: RunMode) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at_unix: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            mode,
            interrupted: false,
            stopped_early: false,
        }
    }
}

/// Status counts as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub success_rate: f64,
}

/// On-disk shape of a run's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFile {
    #[serde(flatten)]
    pub metadata: RunMetadata,
    pub summary: SummaryCounts,
    pub passed: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    /// Full diagnostic per failing notebook.
    pub errors: BTreeMap<String, String>,
    /// Fallback notes and skip reasons.
    pub notes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub warnings: BTreeMap<String, Vec<String>>,
    pub elapsed_secs: BTreeMap<String, f64>,
}

impl ResultFile {
    /// Snapshot the aggregator.
    pub fn build(aggregator: &ResultAggregator, metadata: RunMetadata) -> Self {
        let summary = aggregator.summary();
        let mut passed = Vec::new();
        let mut failed = Vec::new();
        let mut skipped = Vec::new();
        let mut errors = BTreeMap::new();
        let mut notes = BTreeMap::new();
        let mut warnings = BTreeMap::new();
        let mut elapsed_secs = BTreeMap::new();

        for (key, result) in file_keys(aggregator) {
            match result.status {
                TestStatus::Passed => passed.push(key.clone()),
                TestStatus::Failed => failed.push(key.clone()),
                TestStatus::Skipped => skipped.push(key.clone()),
            }
            if let Some(diagnostic) = &result.diagnostic {
                let target = match result.status {
                    TestStatus::Failed => &mut errors,
                    TestStatus::Passed | TestStatus::Skipped => &mut notes,
                };
                target.insert(key.clone(), diagnostic.clone());
            }
            if !result.warnings.is_empty() {
                warnings.insert(key.clone(), result.warnings.clone());
            }
            if result.status != TestStatus::Skipped {
                elapsed_secs.insert(key, result.elapsed.as_secs_f64());
            }
        }

        Self {
            metadata,
            summary: SummaryCounts {
                total: summary.total,
                passed: summary.passed,
                failed: summary.failed,
                skipped: summary.skipped,
                success_rate: summary.success_rate(),
            },
            passed,
            failed,
            skipped,
            errors,
            notes,
            warnings,
            elapsed_secs,
        }
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| persist_error(parent, e))?;
        }
        fs::write(path, json).map_err(|e| persist_error(path, e))?;
        Ok(())
    }

    /// Read a previously written result file.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl ResultAggregator {
    /// Persist the full result mapping as JSON.
    pub fn persist(&self, path: impl AsRef<Path>, metadata: RunMetadata) -> Result<()> {
        let path = path.as_ref();
        ResultFile::build(self, metadata).write_to_file(path)?;
        tracing::info!("Wrote results to {}", path.display());
        Ok(())
    }

    /// Write one `<stem>_error.txt` per failing notebook into `dir`.
    ///
    /// Returns the written paths. Stems seen twice get a numeric suffix.
    pub fn write_failure_details(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let failures: Vec<_> = self
            .results()
            .filter(|(_, result)| result.status == TestStatus::Failed)
            .collect();
        if failures.is_empty() {
            return Ok(Vec::new());
        }
        fs::create_dir_all(dir).map_err(|e| persist_error(dir, e))?;

        let mut used: HashSet<String> = HashSet::new();
        let mut written = Vec::new();
        for (path, result) in failures {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "notebook".to_string());
            let mut name = format!("{}_error.txt", stem);
            let mut n = 2;
            while !used.insert(name.clone()) {
                name = format!("{}_{}_error.txt", stem, n);
                n += 1;
            }

            let file = dir.join(&name);
            let body = format!(
                "Notebook: {}\nExecution time: {:.1}s\nError:\n{}\n",
                path.display(),
                result.elapsed.as_secs_f64(),
                result.diagnostic.as_deref().unwrap_or_default()
            );
            fs::write(&file, body).map_err(|e| persist_error(&file, e))?;
            written.push(file);
        }

        Ok(written)
    }
}

/// String keys for the result file, one per recorded path.
///
/// Paths whose lossy rendering is already taken get a ` (n)` suffix.
fn file_keys(aggregator: &ResultAggregator) -> Vec<(String, &TestResult)> {
    let mut used: HashSet<String> = HashSet::new();
    aggregator
        .results()
        .map(|(path, result)| {
            let base = path.to_string_lossy().into_owned();
            let mut key = base.clone();
            let mut n = 2;
            while !used.insert(key.clone()) {
                key = format!("{} ({})", base, n);
                n += 1;
            }
            (key, result)
        })
        .collect()
}

fn persist_error(path: &Path, e: std::io::Error) -> Error {
    Error::Persist {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
