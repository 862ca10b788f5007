//! Conditional probability tables.

use super::Variable;
use crate::LarderError;
use crate::primitives::CPT_TOLERANCE;
use serde::{Deserialize, Serialize};

/// Distribution of one variable for every configuration of its parents.
///
/// Row `i` holds the distribution for the `i`-th parent configuration in
/// row-major order (the first parent varies slowest). A root variable has no
/// parents and exactly one row.
///
/// Invariant, enforced by [`ConditionalProbabilityTable::validate`]: every
/// entry lies in `[0, 1]` and every row sums to one within `CPT_TOLERANCE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalProbabilityTable {
    variable: Variable,
    parents: Vec<Variable>,
    rows: Vec<Vec<f64>>,
}

impl ConditionalProbabilityTable {
    /// Create a validated table.
    pub fn new(
        variable: Variable,
        parents: Vec<Variable>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, LarderError> {
        let table = Self {
            variable,
            parents,
            rows,
        };
        table.validate()?;
        Ok(table)
    }

    /// Create a validated table for a root variable.
    pub fn root(variable: Variable, distribution: Vec<f64>) -> Result<Self, LarderError> {
        Self::new(variable, Vec::new(), vec![distribution])
    }

    /// The variable this table describes.
    #[must_use]
    pub fn variable(&self) -> Variable {
        self.variable
    }

    /// Parent variables, in configuration order.
    #[must_use]
    pub fn parents(&self) -> &[Variable] {
        &self.parents
    }

    /// All rows, in configuration order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Number of parent configurations.
    #[must_use]
    pub fn configuration_count(&self) -> usize {
        self.parents.iter().map(|p| p.cardinality()).product()
    }

    /// Row index for a parent configuration, or `None` if out of range.
    #[must_use]
    pub fn row_index(&self, parent_states: &[usize]) -> Option<usize> {
        if parent_states.len() != self.parents.len() {
            return None;
        }
        let mut index = 0usize;
        for (parent, &state) in self.parents.iter().zip(parent_states) {
            if state >= parent.cardinality() {
                return None;
            }
            index = index * parent.cardinality() + state;
        }
        Some(index)
    }

    /// Distribution for a parent configuration.
    #[must_use]
    pub fn distribution(&self, parent_states: &[usize]) -> Option<&[f64]> {
        self.row_index(parent_states)
            .and_then(|i| self.rows.get(i))
            .map(Vec::as_slice)
    }

    /// `P(variable = state | parents = parent_states)`.
    #[must_use]
    pub fn probability(&self, state: usize, parent_states: &[usize]) -> Option<f64> {
        self.distribution(parent_states)
            .and_then(|row| row.get(state))
            .copied()
    }

    /// Check shape and the sum-to-one invariant.
    ///
    /// Returns `LarderError::InvalidModel` describing the first violation.
    pub fn validate(&self) -> Result<(), LarderError> {
        if self.parents.contains(&self.variable) {
            return Err(LarderError::InvalidModel(format!(
                "{} lists itself as a parent",
                self.variable
            )));
        }
        for (i, parent) in self.parents.iter().enumerate() {
            if self.parents[..i].contains(parent) {
                return Err(LarderError::InvalidModel(format!(
                    "{} lists parent {} twice",
                    self.variable, parent
                )));
            }
        }

        let expected_rows = self.configuration_count();
        if self.rows.len() != expected_rows {
            return Err(LarderError::InvalidModel(format!(
                "{} has {} rows, expected {}",
                self.variable,
                self.rows.len(),
                expected_rows
            )));
        }

        let cardinality = self.variable.cardinality();
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != cardinality {
                return Err(LarderError::InvalidModel(format!(
                    "{} row {} has {} entries, expected {}",
                    self.variable,
                    i,
                    row.len(),
                    cardinality
                )));
            }
            if let Some(bad) = row
                .iter()
                .find(|p| !p.is_finite() || **p < 0.0 || **p > 1.0)
            {
                return Err(LarderError::InvalidModel(format!(
                    "{} row {} has probability {} outside [0, 1]",
                    self.variable, i, bad
                )));
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > CPT_TOLERANCE {
                return Err(LarderError::InvalidModel(format!(
                    "{} row {} sums to {}",
                    self.variable, i, sum
                )));
            }
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
