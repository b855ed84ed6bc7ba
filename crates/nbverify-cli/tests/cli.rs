//! End-to-end tests for the nbverify binary.
//!
//! These tests run the CLI against corpora written into temporary
//! directories. Execution tests substitute `jupyter` with a shell script.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin for tests

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

const VALID_NOTEBOOK: &str = r##"{
  "metadata": {"kernelspec": {"name": "python3", "display_name": "Python 3", "language": "python"}},
  "nbformat": 4,
  "nbformat_minor": 5,
  "cells": [
    {"cell_type": "markdown", "metadata": {}, "source": ["# Title"]},
    {"cell_type": "code", "execution_count": null, "metadata": {}, "outputs": [], "source": ["x = 1"]}
  ]
}"##;

const MISSING_METADATA: &str = r#"{"nbformat": 4, "nbformat_minor": 5, "cells": []}"#;

/// A directory of notebooks.
struct TestCorpus {
    temp_dir: TempDir,
}

impl TestCorpus {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    fn with(self, filename: &str, source: &str) -> Self {
        let path = self.temp_dir.path().join(filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directory");
        }
        fs::write(&path, source).expect("Failed to write notebook");
        self
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

fn nbverify() -> Command {
    let mut cmd = Command::cargo_bin("nbverify").unwrap();
    cmd.env_remove("NBVERIFY_JUPYTER");
    cmd
}

// =============================================================================
// check
// =============================================================================

#[test]
fn test_check_valid_corpus_exits_zero() {
    let corpus = TestCorpus::new()
        .with("one.ipynb", VALID_NOTEBOOK)
        .with("two.ipynb", VALID_NOTEBOOK);

    nbverify()
        .arg("check")
        .arg(corpus.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED"))
        .stdout(predicate::str::contains("Total notebooks: 2"))
        .stdout(predicate::str::contains("Success rate: 100.0%"));
}

#[test]
fn test_check_missing_metadata_exits_one() {
    let corpus = TestCorpus::new()
        .with("good.ipynb", VALID_NOTEBOOK)
        .with("broken.ipynb", MISSING_METADATA);

    nbverify()
        .arg("check")
        .arg(corpus.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAILED"))
        .stdout(predicate::str::contains("missing required field 'metadata'"))
        .stdout(predicate::str::contains("Success rate: 50.0%"));
}

#[test]
fn test_check_empty_directory_exits_zero() {
    let corpus = TestCorpus::new();

    nbverify()
        .arg("check")
        .arg(corpus.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Total notebooks: 0"))
        .stdout(predicate::str::contains("Success rate: 100.0%"));
}

#[test]
fn test_check_is_shallow_unless_recursive() {
    let corpus = TestCorpus::new()
        .with("top.ipynb", VALID_NOTEBOOK)
        .with("nested/inner.ipynb", MISSING_METADATA);

    nbverify()
        .arg("check")
        .arg(corpus.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Total notebooks: 1"));

    nbverify()
        .args(["check", "--recursive"])
        .arg(corpus.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Total notebooks: 2"));
}

#[test]
fn test_check_writes_result_file_and_failure_details() {
    let corpus = TestCorpus::new()
        .with("good.ipynb", VALID_NOTEBOOK)
        .with("broken.ipynb", MISSING_METADATA);
    let out_dir = TempDir::new().unwrap();
    let results = out_dir.path().join("results.json");
    let failures = out_dir.path().join("failures");

    nbverify()
        .arg("check")
        .arg(corpus.path())
        .arg("--output")
        .arg(&results)
        .arg("--failure-dir")
        .arg(&failures)
        .assert()
        .code(1);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&results).unwrap()).unwrap();
    assert_eq!(json["mode"], "structure-only");
    assert_eq!(json["summary"]["passed"], 1);
    assert_eq!(json["summary"]["failed"], 1);
    assert_eq!(json["failed"].as_array().unwrap().len(), 1);

    let detail = fs::read_to_string(failures.join("broken_error.txt")).unwrap();
    assert!(detail.contains("missing required field 'metadata'"));
}

#[test]
fn test_check_max_failures_skips_remaining() {
    let corpus = TestCorpus::new()
        .with("a.ipynb", MISSING_METADATA)
        .with("b.ipynb", MISSING_METADATA)
        .with("c.ipynb", VALID_NOTEBOOK);

    nbverify()
        .args(["check", "--max-failures", "1"])
        .arg(corpus.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Failed: 2"))
        .stdout(predicate::str::contains("Skipped: 1"))
        .stdout(predicate::str::contains("SKIPPED"));
}

#[test]
fn test_check_strict_fails_on_lint() {
    let corpus = TestCorpus::new().with(
        "lint.ipynb",
        r#"{"metadata": {}, "nbformat": 4, "cells": [
            {"cell_type": "markdown", "metadata": {}, "source": "x", "execution_count": 1}
        ]}"#,
    );

    nbverify()
        .arg("check")
        .arg(corpus.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("warning:"));

    nbverify()
        .args(["check", "--strict"])
        .arg(corpus.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("lint:"));
}

// =============================================================================
// run
// =============================================================================

#[test]
fn test_run_missing_tool_is_configuration_error() {
    let corpus = TestCorpus::new().with("one.ipynb", VALID_NOTEBOOK);

    nbverify()
        .arg("run")
        .arg(corpus.path())
        .args(["--jupyter", "/nonexistent/jupyter"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("execution tool not found"));
}

#[test]
fn test_run_rejects_timeout_without_room_for_cells() {
    let corpus = TestCorpus::new().with("one.ipynb", VALID_NOTEBOOK);

    nbverify()
        .arg("run")
        .arg(corpus.path())
        .args(["--timeout", "1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--timeout"))
        .stderr(predicate::str::contains("configuration error").not());
}

#[test]
fn test_run_rejects_unknown_flag() {
    nbverify()
        .args(["run", "--no-such-flag", "."])
        .assert()
        .code(2);
}

#[cfg(unix)]
mod with_fake_tool {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Executable stand-in for `jupyter`, failing any notebook named `raises*`.
    fn fake_jupyter(dir: &Path) -> PathBuf {
        let script = dir.join("jupyter");
        fs::write(
            &script,
            "#!/bin/sh\n\
             case \"$*\" in\n\
             *raises*) echo 'ZeroDivisionError: division by zero' >&2; exit 1 ;;\n\
             esac\n\
             exit 0\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[test]
    fn test_run_reports_execution_failures() {
        let corpus = TestCorpus::new()
            .with("fine.ipynb", VALID_NOTEBOOK)
            .with("raises.ipynb", VALID_NOTEBOOK)
            .with("broken.ipynb", MISSING_METADATA);
        let tool_dir = TempDir::new().unwrap();
        let tool = fake_jupyter(tool_dir.path());

        nbverify()
            .arg("run")
            .arg(corpus.path())
            .arg("--jupyter")
            .arg(&tool)
            .args(["--timeout", "30"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Passed: 1"))
            .stdout(predicate::str::contains("Failed: 2"))
            .stdout(predicate::str::contains("ZeroDivisionError"));
    }

    #[test]
    fn test_run_tool_from_environment() {
        let corpus = TestCorpus::new().with("fine.ipynb", VALID_NOTEBOOK);
        let tool_dir = TempDir::new().unwrap();
        let tool = fake_jupyter(tool_dir.path());

        nbverify()
            .arg("run")
            .arg(corpus.path())
            .env("NBVERIFY_JUPYTER", &tool)
            .assert()
            .success()
            .stdout(predicate::str::contains("Success rate: 100.0%"));
    }

    #[test]
    fn test_run_cell_timeout_must_be_below_timeout() {
        let corpus = TestCorpus::new().with("fine.ipynb", VALID_NOTEBOOK);
        let tool_dir = TempDir::new().unwrap();
        let tool = fake_jupyter(tool_dir.path());

        nbverify()
            .arg("run")
            .arg(corpus.path())
            .arg("--jupyter")
            .arg(&tool)
            .args(["--timeout", "30", "--cell-timeout", "30"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("configuration error"));
    }

    #[test]
    fn test_run_parallel_jobs() {
        let corpus = TestCorpus::new()
            .with("a.ipynb", VALID_NOTEBOOK)
            .with("b.ipynb", VALID_NOTEBOOK)
            .with("c.ipynb", VALID_NOTEBOOK);
        let tool_dir = TempDir::new().unwrap();
        let tool = fake_jupyter(tool_dir.path());

        nbverify()
            .arg("run")
            .arg(corpus.path())
            .arg("--jupyter")
            .arg(&tool)
            .args(["--jobs", "3"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Passed: 3"));
    }
}
