//! Legacy (`nbformat` <= 3) documents.
//!
//! Cells live inside `worksheets`. Code cells keep their text in `input`,
//! markdown cells in `source`.

use serde_json::{Map, Value};

use super::{
    Location, StructuralError, Validate, ValidationOutcome, cell_object, require,
    require_sequence,
};

/// A worksheet-based notebook.
#[derive(Debug, Clone)]
pub struct LegacyDocument {
    root: Map<String, Value>,
}

impl LegacyDocument {
    /// Wrap a parsed document root.
    pub fn new(root: Map<String, Value>) -> Self {
        Self { root }
    }

    /// The raw document root.
    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    fn check(&self) -> Result<(), StructuralError> {
        let worksheets = require_sequence(&self.root, "worksheets", Location::Document)?;

        for (w, worksheet) in worksheets.iter().enumerate() {
            let Some(worksheet) = worksheet.as_object() else {
                return Err(StructuralError::MissingField {
                    location: Location::Worksheet(w),
                    field: "cells",
                });
            };
            let cells = require_sequence(worksheet, "cells", Location::Worksheet(w))?;

            for (c, cell) in cells.iter().enumerate() {
                let location = Location::WorksheetCell(w, c);
                let cell = cell_object(cell, location)?;
                let cell_type = require(cell, "cell_type", location)?;
                match cell_type.as_str() {
                    Some("code") => {
                        require(cell, "input", location)?;
                    }
                    Some("markdown") => {
                        require(cell, "source", location)?;
                    }
                    // heading and raw cells carry no required text field
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

impl Validate for LegacyDocument {
    fn validate(&self) -> ValidationOutcome {
        match self.check() {
            Ok(()) => ValidationOutcome::valid(),
            Err(e) => ValidationOutcome::invalid(e),
        }
    }
}
