// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use itertools::Itertools;

use percept_common::FactorValue;

use crate::error::{DesignError, Result};
use crate::table::DesignTable;

/// Expand named factors into the full factorial condition table.
///
/// Ordering contract: the last declared factor varies fastest, so condition
/// index `i` decomposes into per-factor level indices by mixed-radix division
/// over the factor cardinalities in reverse declaration order (see
/// [`decompose_index`]).
///
/// A factor with zero levels yields an empty table. That is "no design
/// available", not an error; callers check `n_conditions()` before sampling.
pub fn ortho_combine(factors: &IndexMap<String, Vec<FactorValue>>) -> Result<DesignTable> {
    if factors.is_empty() {
        return Ok(DesignTable::default());
    }
    if factors.keys().any(String::is_empty) {
        return Err(DesignError::EmptyFactor);
    }

    let counts: Vec<usize> = factors.values().map(Vec::len).collect();
    if counts.contains(&0) {
        let empty = factors.keys().map(|name| (name.clone(), Vec::new())).collect();
        return DesignTable::from_factors(empty);
    }

    let n_conditions: usize = counts.iter().product();
    let mut columns: Vec<Vec<FactorValue>> = factors
        .values()
        .map(|_| Vec::with_capacity(n_conditions))
        .collect();
    for combo in counts.iter().map(|&n| 0..n).multi_cartesian_product() {
        for ((column, levels), level) in columns.iter_mut().zip(factors.values()).zip(combo) {
            column.push(levels[level].clone());
        }
    }

    let expanded = factors
        .keys()
        .cloned()
        .zip(columns)
        .collect::<IndexMap<_, _>>();
    DesignTable::from_factors(expanded)
}

/// Cross-replicate two condition tables.
///
/// Every row of `a` is paired with every row of `b`, producing `|a|·|b|`
/// rows over the union of both tables' factors, with `b` varying fastest.
/// Equivalent to [`ortho_combine`] over the two synthetic row-index factors
/// with the original columns substituted back.
pub fn combine(a: &DesignTable, b: &DesignTable) -> Result<DesignTable> {
    for name in a.factor_names() {
        if b.contains_factor(name) {
            return Err(DesignError::ColumnCollision(name.to_string()));
        }
    }

    let (na, nb) = (a.n_conditions(), b.n_conditions());
    let mut factors = IndexMap::new();
    for (name, levels) in a.factors() {
        let column = if nb == 0 {
            Vec::new()
        } else {
            // Each row of `a` is replicated across the full span of `b`.
            levels
                .iter()
                .flat_map(|v| std::iter::repeat_n(v.clone(), nb))
                .collect()
        };
        factors.insert(name.clone(), column);
    }
    for (name, levels) in b.factors() {
        let column = if na == 0 {
            Vec::new()
        } else {
            std::iter::repeat_n(levels.iter().cloned(), na)
                .flatten()
                .collect()
        };
        factors.insert(name.clone(), column);
    }
    DesignTable::from_factors(factors)
}

/// Recover per-factor level indices from a condition index.
///
/// `counts` are the factor cardinalities in declaration order; the returned
/// levels are in the same order. Inverse of the [`ortho_combine`] row order.
pub fn decompose_index(index: usize, counts: &[usize]) -> Vec<usize> {
    let mut remainder = index;
    let mut levels = vec![0; counts.len()];
    for (slot, &n) in levels.iter_mut().zip(counts).rev() {
        *slot = remainder % n;
        remainder /= n;
    }
    levels
}
