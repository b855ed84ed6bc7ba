//! Invocation strategies for the execution tool.

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

/// Kernel pinned by the fallback attempt when none is configured.
pub const DEFAULT_KERNEL: &str = "python3";

/// One way of invoking the execution tool.
///
/// Strategies are tried in order until one succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationStrategy {
    /// Human-readable label used in diagnostics.
    pub label: String,
    /// Kernel to pin, or `None` to let the tool auto-detect it.
    pub kernel: Option<String>,
}

impl InvocationStrategy {
    /// Let the tool pick the kernel from the notebook metadata.
    pub fn auto_detect() -> Self {
        Self {
            label: "auto-detected kernel".to_string(),
            kernel: None,
        }
    }

    /// Pin the kernel explicitly.
    pub fn pinned(kernel: impl Into<String>) -> Self {
        let kernel = kernel.into();
        Self {
            label: format!("pinned kernel '{}'", kernel),
            kernel: Some(kernel),
        }
    }

    /// Primary attempt followed by a pinned-kernel fallback.
    pub fn default_chain(kernel: &str) -> Vec<Self> {
        vec![Self::auto_detect(), Self::pinned(kernel)]
    }

    /// Build the nbconvert argument vector.
    ///
    /// Cell errors abort the run (`allow_errors=False`) and the executed copy
    /// is written to `output`.
    pub fn args(&self, cell_timeout: Duration, output: &Path, notebook: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--to".into(),
            "notebook".into(),
            "--execute".into(),
            format!("--ExecutePreprocessor.timeout={}", cell_timeout.as_secs()).into(),
            "--ExecutePreprocessor.allow_errors=False".into(),
        ];
        if let Some(kernel) = &self.kernel {
            args.push(format!("--ExecutePreprocessor.kernel_name={}", kernel).into());
        }
        args.push("--output".into());
        args.push(output.as_os_str().to_owned());
        args.push(notebook.as_os_str().to_owned());
        args
    }
}
