// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use indexmap::IndexMap;
use percept_common::FactorValue;

use crate::error::Result;
use crate::table::DesignTable;

/// Build a design table from an in-memory structured mapping.
///
/// The mapping has the shape `{"FactorName": [level, ...], ...}`. Levels
/// deserialize through the untagged [`FactorValue`] representation, so
/// numbers, booleans, strings, short arrays and arbitrary nested values all
/// load. Ragged level lists are rejected.
pub fn design_from_value(value: serde_json::Value) -> Result<DesignTable> {
    let factors: IndexMap<String, Vec<FactorValue>> = serde_json::from_value(value)?;
    DesignTable::from_factors(factors)
}

/// Load a design table from a structured design file.
pub fn read_design(path: impl AsRef<Path>) -> Result<DesignTable> {
    let text = std::fs::read_to_string(path)?;
    design_from_value(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DesignError;

    #[test]
    fn test_design_from_value() {
        let table = design_from_value(serde_json::json!({
            "Ori": [0.0, 90.0],
            "Position": [[0.0, 0.0], [5.0, 0.0]],
            "Flash": [true, false],
        }))
        .unwrap();
        assert_eq!(table.n_conditions(), 2);
        assert_eq!(table.value("Ori", 1), Some(&FactorValue::Float(90.0)));
        assert_eq!(
            table.value("Position", 1),
            Some(&FactorValue::Vec2([5.0, 0.0]))
        );
        assert_eq!(table.value("Flash", 0), Some(&FactorValue::Bool(true)));
    }

    #[test]
    fn test_ragged_source_rejected() {
        let result = design_from_value(serde_json::json!({
            "Ori": [0.0, 90.0],
            "Contrast": [0.5],
        }));
        assert!(matches!(result, Err(DesignError::RaggedColumns { .. })));
    }

    #[test]
    fn test_non_mapping_source_rejected() {
        let result = design_from_value(serde_json::json!([1, 2, 3]));
        assert!(matches!(result, Err(DesignError::Parse(_))));
    }
}
