//! Modern (`nbformat` >= 4) documents.
//!
//! Cells sit directly under the root and every cell carries `source`.

use serde_json::{Map, Value};

use super::{
    Location, StructuralError, VERSION_FIELD, Validate, ValidationOutcome, cell_object, require,
    require_sequence,
};

/// Keys a markdown cell may carry.
const MARKDOWN_KEYS: &[&str] = &["cell_type", "metadata", "source", "id", "attachments"];

/// A flat-cell notebook.
#[derive(Debug, Clone)]
pub struct ModernDocument {
    root: Map<String, Value>,
}

impl ModernDocument {
    /// Wrap a parsed document root.
    pub fn new(root: Map<String, Value>) -> Self {
        Self { root }
    }

    /// The raw document root.
    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    fn check(&self) -> Result<Vec<String>, StructuralError> {
        // A ModernDocument can be built without going through
        // NotebookDocument::from_slice, so the root fields are checked again.
        require(&self.root, "cells", Location::Document)?;
        require(&self.root, "metadata", Location::Document)?;
        require(&self.root, VERSION_FIELD, Location::Document)?;
        let cells = require_sequence(&self.root, "cells", Location::Document)?;

        let mut warnings = Vec::new();
        for (c, cell) in cells.iter().enumerate() {
            let location = Location::Cell(c);
            let cell = cell_object(cell, location)?;
            let cell_type = require(cell, "cell_type", location)?;
            require(cell, "source", location)?;

            if cell_type.as_str() == Some("markdown")
                && let Some(warning) = lint_markdown_keys(cell, location)
            {
                warnings.push(warning);
            }
        }

        Ok(warnings)
    }
}

impl Validate for ModernDocument {
    fn validate(&self) -> ValidationOutcome {
        match self.check() {
            Ok(warnings) if warnings.is_empty() => ValidationOutcome::valid(),
            Ok(warnings) => ValidationOutcome::valid_with_warnings(warnings),
            Err(e) => ValidationOutcome::invalid(e),
        }
    }
}

/// Report keys that do not belong on a markdown cell.
fn lint_markdown_keys(cell: &Map<String, Value>, location: Location) -> Option<String> {
    let extra: Vec<&str> = cell
        .keys()
        .map(String::as_str)
        .filter(|key| !MARKDOWN_KEYS.contains(key))
        .collect();

    if extra.is_empty() {
        None
    } else {
        Some(format!(
            "{}: markdown cell has unexpected keys {:?}",
            location, extra
        ))
    }
}
