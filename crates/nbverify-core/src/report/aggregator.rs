//! Single owner of the per-run result mapping.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::summary::{FailureExcerpt, RunSummary};
use super::{TestResult, TestStatus};

/// Collects exactly one [`TestResult`] per notebook.
///
/// Entries are append-only. They are keyed by the path itself and ordered by
/// its string form, so distinct paths never share an entry even when their
/// lossy renderings coincide.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: BTreeMap<PathKey, TestResult>,
}

impl ResultAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result for `path`.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateResult`] if `path` already has a result; the
    /// existing entry is left untouched.
    pub fn record(&mut self, path: &Path, result: TestResult) -> Result<()> {
        let key = PathKey::new(path);
        if self.results.contains_key(&key) {
            tracing::error!("Refusing to overwrite result for {}", path.display());
            return Err(Error::DuplicateResult(path.display().to_string()));
        }
        self.results.insert(key, result);
        Ok(())
    }

    /// Whether `path` has a recorded result.
    pub fn contains(&self, path: &Path) -> bool {
        self.results.contains_key(&PathKey::new(path))
    }

    /// The recorded result for `path`.
    pub fn get(&self, path: &Path) -> Option<&TestResult> {
        self.results.get(&PathKey::new(path))
    }

    /// All results in path order.
    pub fn results(&self) -> impl Iterator<Item = (&Path, &TestResult)> {
        self.results
            .iter()
            .map(|(key, result)| (key.path.as_path(), result))
    }

    /// Paths with the given status, in path order.
    pub fn paths_with(&self, status: TestStatus) -> Vec<&Path> {
        self.results()
            .filter(|(_, result)| result.status == status)
            .map(|(path, _)| path)
            .collect()
    }

    /// Number of recorded results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Whether any result is Failed. Skipped results do not count.
    pub fn has_failures(&self) -> bool {
        self.results
            .values()
            .any(|result| result.status == TestStatus::Failed)
    }

    /// Compute the run summary.
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for (path, result) in self.results() {
            summary.total += 1;
            match result.status {
                TestStatus::Passed => summary.passed += 1,
                TestStatus::Skipped => summary.skipped += 1,
                TestStatus::Failed => {
                    summary.failed += 1;
                    summary.failures.push(FailureExcerpt::new(
                        &path.to_string_lossy(),
                        result.diagnostic.as_deref().unwrap_or_default(),
                    ));
                }
            }
        }
        summary
    }
}

/// Map key ordering paths by their string form, then by raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PathKey {
    display: String,
    path: PathBuf,
}

impl PathKey {
    fn new(path: &Path) -> Self {
        Self {
            display: path.to_string_lossy().into_owned(),
            path: path.to_path_buf(),
        }
    }
}

impl Ord for PathKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.display
            .cmp(&other.display)
            .then_with(|| self.path.as_os_str().cmp(other.path.as_os_str()))
    }
}

impl PartialOrd for PathKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_record_rejects_duplicates() {
        let mut aggregator = ResultAggregator::new();
        let path = Path::new("a.ipynb");
        aggregator
            .record(path, TestResult::passed(None, Duration::ZERO))
            .unwrap();

        let err = aggregator
            .record(path, TestResult::failed("late", Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateResult(_)));
        assert_eq!(aggregator.get(path).unwrap().status, TestStatus::Passed);
    }

    #[test]
    fn test_success_rate_three_of_four() {
        let mut aggregator = ResultAggregator::new();
        for name in ["a", "b", "c"] {
            aggregator
                .record(
                    Path::new(&format!("{name}.ipynb")),
                    TestResult::passed(None, Duration::ZERO),
                )
                .unwrap();
        }
        aggregator
            .record(Path::new("d.ipynb"), TestResult::failed("x", Duration::ZERO))
            .unwrap();

        let summary = aggregator.summary();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.failed, 1);
        assert!((summary.success_rate() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_skipped_does_not_signal_failure() {
        let mut aggregator = ResultAggregator::new();
        aggregator
            .record(Path::new("a.ipynb"), TestResult::skipped("stopped"))
            .unwrap();
        assert!(!aggregator.has_failures());
        assert_eq!(
            aggregator.paths_with(TestStatus::Skipped),
            vec![Path::new("a.ipynb")]
        );
    }

    #[test]
    fn test_failures_listed_in_path_order() {
        let mut aggregator = ResultAggregator::new();
        aggregator
            .record(Path::new("b.ipynb"), TestResult::failed("b", Duration::ZERO))
            .unwrap();
        aggregator
            .record(Path::new("a.ipynb"), TestResult::failed("a", Duration::ZERO))
            .unwrap();

        let summary = aggregator.summary();
        let paths: Vec<&str> = summary.failures.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.ipynb", "b.ipynb"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_lossy_equal_paths_are_distinct_entries() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let first = Path::new(OsStr::from_bytes(b"a\xff.ipynb"));
        let second = Path::new(OsStr::from_bytes(b"a\xfe.ipynb"));
        assert_eq!(first.to_string_lossy(), second.to_string_lossy());

        let mut aggregator = ResultAggregator::new();
        aggregator
            .record(first, TestResult::passed(None, Duration::ZERO))
            .unwrap();
        aggregator
            .record(second, TestResult::failed("boom", Duration::ZERO))
            .unwrap();

        assert_eq!(aggregator.len(), 2);
        assert_eq!(aggregator.get(first).unwrap().status, TestStatus::Passed);
        assert_eq!(aggregator.get(second).unwrap().status, TestStatus::Failed);
    }
}
