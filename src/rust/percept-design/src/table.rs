// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use percept_common::FactorValue;

use crate::error::{DesignError, Result};

/// A compiled condition design.
///
/// Columns are factors, rows are conditions: row `i` assigns one level of
/// every factor, and `i` is the condition index used by the sampler. Factor
/// order is the declaration order and is part of the table's identity (it
/// fixes the index decomposition).
///
/// The table is immutable once built; the sampler and the trial engine only
/// ever read it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignTable {
    factors: IndexMap<String, Vec<FactorValue>>,
}

impl DesignTable {
    /// Validate a factor mapping into a table.
    ///
    /// Rejects ragged columns and empty factor names. An all-empty table
    /// (every column zero rows) is valid and means "no design available".
    pub fn from_factors(factors: IndexMap<String, Vec<FactorValue>>) -> Result<Self> {
        let expected = factors.values().next().map_or(0, Vec::len);
        for (name, levels) in &factors {
            if name.is_empty() {
                return Err(DesignError::EmptyFactor);
            }
            if levels.len() != expected {
                return Err(DesignError::RaggedColumns {
                    factor: name.clone(),
                    len: levels.len(),
                    expected,
                });
            }
        }
        Ok(DesignTable { factors })
    }

    /// Number of conditions (rows).
    pub fn n_conditions(&self) -> usize {
        self.factors.values().next().map_or(0, Vec::len)
    }

    pub fn n_factors(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_conditions() == 0
    }

    pub fn factor_names(&self) -> impl Iterator<Item = &str> {
        self.factors.keys().map(String::as_str)
    }

    pub fn contains_factor(&self, name: &str) -> bool {
        self.factors.contains_key(name)
    }

    pub fn levels(&self, name: &str) -> Option<&[FactorValue]> {
        self.factors.get(name).map(Vec::as_slice)
    }

    pub fn value(&self, name: &str, index: usize) -> Option<&FactorValue> {
        self.factors.get(name).and_then(|levels| levels.get(index))
    }

    /// The factor assignments of condition `index`, in factor order.
    pub fn row(&self, index: usize) -> impl Iterator<Item = (&str, &FactorValue)> {
        self.factors
            .iter()
            .filter_map(move |(name, levels)| levels.get(index).map(|v| (name.as_str(), v)))
    }

    pub fn factors(&self) -> &IndexMap<String, Vec<FactorValue>> {
        &self.factors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(values: &[f64]) -> Vec<FactorValue> {
        values.iter().map(|&v| FactorValue::Float(v)).collect()
    }

    #[test]
    fn test_from_factors_validates_columns() {
        let mut factors = IndexMap::new();
        factors.insert("Ori".to_string(), col(&[0.0, 90.0]));
        factors.insert("Contrast".to_string(), col(&[0.5]));
        assert!(matches!(
            DesignTable::from_factors(factors),
            Err(DesignError::RaggedColumns { expected: 2, len: 1, .. })
        ));

        let mut factors = IndexMap::new();
        factors.insert(String::new(), col(&[0.0]));
        assert!(matches!(
            DesignTable::from_factors(factors),
            Err(DesignError::EmptyFactor)
        ));
    }

    #[test]
    fn test_empty_table_is_valid() {
        let mut factors = IndexMap::new();
        factors.insert("Ori".to_string(), Vec::new());
        let table = DesignTable::from_factors(factors).unwrap();
        assert_eq!(table.n_conditions(), 0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_row_iterates_in_factor_order() {
        let mut factors = IndexMap::new();
        factors.insert("Ori".to_string(), col(&[0.0, 90.0]));
        factors.insert("Contrast".to_string(), col(&[0.5, 1.0]));
        let table = DesignTable::from_factors(factors).unwrap();

        let row: Vec<_> = table.row(1).collect();
        assert_eq!(
            row,
            vec![
                ("Ori", &FactorValue::Float(90.0)),
                ("Contrast", &FactorValue::Float(1.0)),
            ]
        );
    }
}
