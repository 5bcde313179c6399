// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use percept_common::FactorValue;
use percept_design::DesignTable;

/// Partition of the condition indices into blocks.
///
/// Conditions sharing identical values on every block factor form one block;
/// blocks are ordered by first appearance in the table. With no block
/// factors there is a single block spanning the whole design.
#[derive(Debug, Clone, Default)]
pub struct SampleSpaces {
    block_factors: Vec<String>,
    /// Condition indices per block, each in ascending table order.
    spaces: Vec<Vec<usize>>,
    /// The block-factor assignment shared by each block's conditions.
    block_values: Vec<Vec<(String, FactorValue)>>,
}

impl SampleSpaces {
    pub fn build(table: &DesignTable, block_factors: &[String]) -> Self {
        let block_factors: Vec<String> = block_factors
            .iter()
            .filter(|name| table.contains_factor(name.as_str()))
            .cloned()
            .collect();

        if block_factors.is_empty() {
            return SampleSpaces {
                block_factors,
                spaces: vec![(0..table.n_conditions()).collect()],
                block_values: vec![Vec::new()],
            };
        }

        let mut spaces: Vec<Vec<usize>> = Vec::new();
        let mut block_values: Vec<Vec<(String, FactorValue)>> = Vec::new();
        for index in 0..table.n_conditions() {
            let key: Vec<(String, FactorValue)> = block_factors
                .iter()
                .filter_map(|name| {
                    table
                        .value(name, index)
                        .map(|v| (name.clone(), v.clone()))
                })
                .collect();
            match block_values.iter().position(|existing| *existing == key) {
                Some(block) => spaces[block].push(index),
                None => {
                    block_values.push(key);
                    spaces.push(vec![index]);
                }
            }
        }

        SampleSpaces {
            block_factors,
            spaces,
            block_values,
        }
    }

    pub fn n_blocks(&self) -> usize {
        self.spaces.len()
    }

    pub fn block_factors(&self) -> &[String] {
        &self.block_factors
    }

    pub fn conditions(&self, block: usize) -> &[usize] {
        &self.spaces[block]
    }

    /// The block-factor level assignment of one block.
    pub fn block_assignment(&self, block: usize) -> &[(String, FactorValue)] {
        &self.block_values[block]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use percept_design::ortho_combine;

    fn design() -> DesignTable {
        let mut factors = IndexMap::new();
        factors.insert(
            "Luminance".to_string(),
            vec![FactorValue::Float(10.0), FactorValue::Float(40.0)],
        );
        factors.insert(
            "Ori".to_string(),
            vec![
                FactorValue::Float(0.0),
                FactorValue::Float(45.0),
                FactorValue::Float(90.0),
            ],
        );
        ortho_combine(&factors).unwrap()
    }

    #[test]
    fn test_no_block_factors_single_block() {
        let spaces = SampleSpaces::build(&design(), &[]);
        assert_eq!(spaces.n_blocks(), 1);
        assert_eq!(spaces.conditions(0), &[0, 1, 2, 3, 4, 5]);
        assert!(spaces.block_assignment(0).is_empty());
    }

    #[test]
    fn test_partition_by_block_factor() {
        let spaces = SampleSpaces::build(&design(), &["Luminance".to_string()]);
        assert_eq!(spaces.n_blocks(), 2);
        // First-seen order: Luminance=10 first, then 40.
        assert_eq!(spaces.conditions(0), &[0, 1, 2]);
        assert_eq!(spaces.conditions(1), &[3, 4, 5]);
        assert_eq!(
            spaces.block_assignment(1),
            &[("Luminance".to_string(), FactorValue::Float(40.0))]
        );
    }

    #[test]
    fn test_unknown_block_factor_ignored() {
        let spaces = SampleSpaces::build(&design(), &["Missing".to_string()]);
        assert_eq!(spaces.n_blocks(), 1);
        assert!(spaces.block_factors().is_empty());
    }
}
