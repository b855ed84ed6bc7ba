//! Notebook discovery.
//!
//! Walks a directory and yields candidate `.ipynb` paths in a deterministic
//! order. Anything inside a `.ipynb_checkpoints` directory is ignored.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Directory segment Jupyter uses for autosave checkpoints.
pub const CHECKPOINT_SEGMENT: &str = ".ipynb_checkpoints";

/// File extension of notebook documents.
pub const NOTEBOOK_EXTENSION: &str = "ipynb";

/// How far below the root discovery descends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Depth {
    /// Only the root's immediate children.
    #[default]
    Shallow,
    /// The whole tree under the root.
    Recursive,
}

/// Discover notebook files under `root`.
///
/// The result is sorted ascending by path string and contains no duplicates.
/// A missing root yields an empty list and a warning. A root that is itself a
/// notebook file yields just that file.
pub fn discover(root: impl AsRef<Path>, depth: Depth) -> Vec<PathBuf> {
    let root = root.as_ref();
    if !root.exists() {
        tracing::warn!("Directory {} does not exist", root.display());
        return Vec::new();
    }

    let max_depth = match depth {
        Depth::Shallow => 1,
        Depth::Recursive => usize::MAX,
    };

    let walker = WalkDir::new(root)
        .follow_links(false)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_checkpoint_dir(entry.path()));

    let mut notebooks: Vec<PathBuf> = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_file() && is_notebook(path) && !in_checkpoint(path) {
            notebooks.push(path.to_path_buf());
        }
    }

    sort_by_path_string(&mut notebooks);
    tracing::debug!("Discovered {} notebooks in {}", notebooks.len(), root.display());
    notebooks
}

/// Whether `path` names a notebook file by extension.
pub fn is_notebook(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(NOTEBOOK_EXTENSION))
}

/// Whether any component of `path` is the checkpoint directory.
pub fn in_checkpoint(path: &Path) -> bool {
    path.components()
        .any(|component| component.as_os_str() == CHECKPOINT_SEGMENT)
}

fn is_checkpoint_dir(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == CHECKPOINT_SEGMENT)
}

fn sort_by_path_string(paths: &mut Vec<PathBuf>) {
    paths.sort_by(|a, b| {
        a.to_string_lossy()
            .cmp(&b.to_string_lossy())
            .then_with(|| a.as_os_str().cmp(b.as_os_str()))
    });
    paths.dedup();
}
