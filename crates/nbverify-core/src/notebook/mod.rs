//! Structural validation of notebook documents.
//!
//! Notebooks come in two incompatible structural generations, selected by the
//! integer `nbformat` field:
//!
//! ```text
//! nbformat <= 3  ──► LegacyDocument   worksheets[] ─► cells[] ─► code: input / markdown: source
//! nbformat >= 4  ──► ModernDocument   cells[] ─► source
//! ```
//!
//! The generation is decided once when the raw bytes are parsed into a
//! [`NotebookDocument`]; each variant then checks its own shape through the
//! shared [`Validate`] capability.

mod legacy;
mod modern;

use std::fmt;

use serde_json::{Map, Value};

pub use legacy::LegacyDocument;
pub use modern::ModernDocument;

/// Field holding the structural generation.
pub const VERSION_FIELD: &str = "nbformat";

/// Last `nbformat` value using the worksheet layout.
pub const LAST_LEGACY_VERSION: i64 = 3;

/// Result of structurally validating one notebook.
///
/// Produced once per notebook and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Whether the document has the required shape.
    pub valid: bool,
    /// Why the document was rejected.
    pub reason: Option<String>,
    /// Non-fatal lint findings.
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    /// A passing outcome without warnings.
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
            warnings: Vec::new(),
        }
    }

    /// A passing outcome carrying lint warnings.
    pub fn valid_with_warnings(warnings: Vec<String>) -> Self {
        Self {
            valid: true,
            reason: None,
            warnings,
        }
    }

    /// A failing outcome.
    pub fn invalid(error: StructuralError) -> Self {
        Self {
            valid: false,
            reason: Some(error.to_string()),
            warnings: Vec::new(),
        }
    }

    /// Promote the first lint warning to a failure.
    pub fn strict(self) -> Self {
        match (self.valid, self.warnings.first()) {
            (true, Some(first)) => Self::invalid(StructuralError::Lint(first.clone())),
            _ => self,
        }
    }
}

/// Where inside a document a structural problem was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// The document root.
    Document,
    /// A legacy worksheet.
    Worksheet(usize),
    /// A cell of a modern document.
    Cell(usize),
    /// A cell inside a legacy worksheet.
    WorksheetCell(usize, usize),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Document => write!(f, "document"),
            Location::Worksheet(w) => write!(f, "worksheet {}", w),
            Location::Cell(c) => write!(f, "cell {}", c),
            Location::WorksheetCell(w, c) => write!(f, "worksheet {}, cell {}", w, c),
        }
    }
}

/// Structural defects that make a notebook invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    /// The bytes are not well-formed JSON.
    #[error("invalid JSON: {0}")]
    Malformed(String),

    /// The document root is not a mapping.
    #[error("document root is not an object")]
    NotAnObject,

    /// A required field is absent.
    #[error("{location}: missing required field '{field}'")]
    MissingField {
        location: Location,
        field: &'static str,
    },

    /// A field that must be a sequence is something else.
    #[error("{location}: field '{field}' is not a sequence")]
    NotASequence {
        location: Location,
        field: &'static str,
    },

    /// A cell entry is not a mapping.
    #[error("{location}: cell is not an object")]
    CellNotAnObject { location: Location },

    /// The version field is present but not an integer.
    #[error("field 'nbformat' is not an integer: {0}")]
    InvalidVersion(String),

    /// A lint warning promoted to a failure.
    #[error("lint: {0}")]
    Lint(String),
}

/// Capability shared by both document generations.
pub trait Validate {
    /// Check the document's shape without side effects.
    fn validate(&self) -> ValidationOutcome;
}

/// A parsed notebook, tagged by structural generation.
#[derive(Debug, Clone)]
pub enum NotebookDocument {
    /// `nbformat` 3 or lower.
    Legacy(LegacyDocument),
    /// `nbformat` 4 or higher.
    Modern(ModernDocument),
}

impl NotebookDocument {
    /// Parse raw bytes and dispatch on the declared version.
    ///
    /// Fails when the bytes are malformed, the root is not an object, or
    /// `metadata` / `nbformat` are missing.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, StructuralError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| StructuralError::Malformed(e.to_string()))?;
        let Value::Object(root) = value else {
            return Err(StructuralError::NotAnObject);
        };

        require(&root, "metadata", Location::Document)?;
        let version = require(&root, VERSION_FIELD, Location::Document)?;
        let version = version
            .as_i64()
            .ok_or_else(|| StructuralError::InvalidVersion(version.to_string()))?;

        if version <= LAST_LEGACY_VERSION {
            Ok(NotebookDocument::Legacy(LegacyDocument::new(root)))
        } else {
            Ok(NotebookDocument::Modern(ModernDocument::new(root)))
        }
    }

    /// The declared `nbformat` value.
    pub fn version(&self) -> Option<i64> {
        let root = match self {
            NotebookDocument::Legacy(doc) => doc.root(),
            NotebookDocument::Modern(doc) => doc.root(),
        };
        root.get(VERSION_FIELD).and_then(Value::as_i64)
    }
}

impl Validate for NotebookDocument {
    fn validate(&self) -> ValidationOutcome {
        match self {
            NotebookDocument::Legacy(doc) => doc.validate(),
            NotebookDocument::Modern(doc) => doc.validate(),
        }
    }
}

/// Parse and validate raw notebook bytes.
pub fn validate_bytes(bytes: &[u8]) -> ValidationOutcome {
    match NotebookDocument::from_slice(bytes) {
        Ok(document) => document.validate(),
        Err(e) => ValidationOutcome::invalid(e),
    }
}

/// Look up a required field.
fn require<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
    location: Location,
) -> Result<&'a Value, StructuralError> {
    object
        .get(field)
        .ok_or(StructuralError::MissingField { location, field })
}

/// Look up a required field that must be a sequence.
fn require_sequence<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
    location: Location,
) -> Result<&'a Vec<Value>, StructuralError> {
    require(object, field, location)?
        .as_array()
        .ok_or(StructuralError::NotASequence { location, field })
}

/// View a cell entry as a mapping.
fn cell_object(cell: &Value, location: Location) -> Result<&Map<String, Value>, StructuralError> {
    cell.as_object()
        .ok_or(StructuralError::CellNotAnObject { location })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_json_reports_position() {
        let outcome = validate_bytes(b"{\"metadata\": {},");
        assert!(!outcome.valid);
        let reason = outcome.reason.unwrap();
        assert!(reason.starts_with("invalid JSON"));
        assert!(reason.contains("line 1"));
    }

    #[test]
    fn test_root_must_be_object() {
        let outcome = validate_bytes(b"[1, 2, 3]");
        assert_eq!(
            outcome.reason.as_deref(),
            Some("document root is not an object")
        );
    }

    #[test]
    fn test_missing_metadata_cites_key() {
        let outcome = validate_bytes(br#"{"nbformat": 4, "cells": []}"#);
        assert!(!outcome.valid);
        assert_eq!(
            outcome.reason.as_deref(),
            Some("document: missing required field 'metadata'")
        );
    }

    #[test]
    fn test_missing_version_is_invalid() {
        let outcome = validate_bytes(br#"{"metadata": {}, "cells": []}"#);
        assert!(outcome.reason.unwrap().contains("'nbformat'"));
    }

    #[test]
    fn test_non_integer_version_is_invalid() {
        let outcome = validate_bytes(br#"{"metadata": {}, "nbformat": "4", "cells": []}"#);
        assert!(!outcome.valid);
        assert!(outcome.reason.unwrap().contains("not an integer"));
    }

    #[test]
    fn test_dispatch_on_version() {
        let legacy = NotebookDocument::from_slice(br#"{"metadata": {}, "nbformat": 3}"#).unwrap();
        assert!(matches!(legacy, NotebookDocument::Legacy(_)));
        assert_eq!(legacy.version(), Some(3));

        let modern =
            NotebookDocument::from_slice(br#"{"metadata": {}, "nbformat": 4, "cells": []}"#)
                .unwrap();
        assert!(matches!(modern, NotebookDocument::Modern(_)));
    }

    #[test]
    fn test_strict_promotes_first_warning() {
        let outcome =
            ValidationOutcome::valid_with_warnings(vec!["first".to_string(), "second".to_string()]);
        let strict = outcome.strict();
        assert!(!strict.valid);
        assert_eq!(strict.reason.as_deref(), Some("lint: first"));

        assert!(ValidationOutcome::valid().strict().valid);
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::WorksheetCell(1, 4).to_string(), "worksheet 1, cell 4");
        assert_eq!(Location::Cell(0).to_string(), "cell 0");
    }
}
