//! Batch parameter learning.
//!
//! Every table is refitted from scratch on each call. Counts are smoothed with
//! an additive pseudo-count spread over the back-off distribution:
//!
//! ```text
//! P(x) = (count(x) + α·k·p₀(x)) / (n + α·k)
//! ```
//!
//! where `k` is the variable's cardinality and `p₀` the back-off value (the
//! prior network when one is supplied, uniform otherwise). With a uniform
//! `p₀` this is plain Laplace smoothing; with no rows it is exactly `p₀`.

use super::cpt::ConditionalProbabilityTable;
use super::network::{BayesNetwork, success_table};
use super::{SUCCESS_YES, TimeBucket, Variable};
use crate::primitives::MAX_DATASET_ROWS;
use crate::{Difficulty, LarderError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of historical data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRecord {
    /// Preparation time in minutes.
    pub time: u32,
    pub difficulty: Difficulty,
    pub success: bool,
}

impl TrainingRecord {
    /// Create a new record.
    #[must_use]
    pub const fn new(time: u32, difficulty: Difficulty, success: bool) -> Self {
        Self {
            time,
            difficulty,
            success,
        }
    }

    /// The (Time, Difficulty) configuration this row observes.
    #[must_use]
    pub const fn configuration(&self) -> (TimeBucket, Difficulty) {
        (TimeBucket::from_minutes(self.time), self.difficulty)
    }
}

/// Summary of one fit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LearnReport {
    /// Rows consumed.
    pub rows: usize,
    /// Rows observed per configuration, zeros included.
    pub observations: BTreeMap<(TimeBucket, Difficulty), u32>,
}

impl LearnReport {
    /// Configurations with no rows: their estimates are pure back-off.
    #[must_use]
    pub fn insufficient(&self) -> Vec<(TimeBucket, Difficulty)> {
        self.observations
            .iter()
            .filter(|&(_, &n)| n == 0)
            .map(|(&config, _)| config)
            .collect()
    }

    /// Whether every configuration had at least one row.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.observations.values().all(|&n| n > 0)
    }
}

/// Fit a network from a dataset.
///
/// `backoff` supplies the default each estimate shrinks toward; `None` means
/// uniform. `pseudo_count` must be positive and finite.
///
/// Configurations without rows are logged at `warn` and listed in the report;
/// they are not an error.
pub fn fit(
    dataset: &[TrainingRecord],
    backoff: Option<&BayesNetwork>,
    pseudo_count: f64,
) -> Result<(BayesNetwork, LearnReport), LarderError> {
    if !pseudo_count.is_finite() || pseudo_count <= 0.0 {
        return Err(LarderError::InvalidModel(format!(
            "pseudo-count must be positive, got {}",
            pseudo_count
        )));
    }
    if dataset.len() > MAX_DATASET_ROWS {
        return Err(LarderError::InvalidDataset(format!(
            "dataset has {} rows, maximum is {}",
            dataset.len(),
            MAX_DATASET_ROWS
        )));
    }

    let mut time_counts = [0u32; 3];
    let mut difficulty_counts = [0u32; 3];
    let mut trials = [[0u32; 3]; 3];
    let mut successes = [[0u32; 3]; 3];

    for record in dataset {
        let (time, difficulty) = record.configuration();
        let (t, d) = (time.index(), difficulty.index());
        time_counts[t] = time_counts[t].saturating_add(1);
        difficulty_counts[d] = difficulty_counts[d].saturating_add(1);
        trials[t][d] = trials[t][d].saturating_add(1);
        if record.success {
            successes[t][d] = successes[t][d].saturating_add(1);
        }
    }

    let backoff_root = |table: Option<&ConditionalProbabilityTable>, state: usize| {
        table
            .and_then(|t| t.probability(state, &[]))
            .unwrap_or(1.0 / 3.0)
    };

    let n = dataset.len() as f64;
    let time_row: Vec<f64> = (0..Variable::Time.cardinality())
        .map(|t| {
            smooth(
                f64::from(time_counts[t]),
                n,
                backoff_root(backoff.map(BayesNetwork::time_prior), t),
                pseudo_count * 3.0,
            )
        })
        .collect();
    let difficulty_row: Vec<f64> = (0..Variable::Difficulty.cardinality())
        .map(|d| {
            smooth(
                f64::from(difficulty_counts[d]),
                n,
                backoff_root(backoff.map(BayesNetwork::difficulty_prior), d),
                pseudo_count * 3.0,
            )
        })
        .collect();

    let success = success_table(|t, d| {
        let p0 = backoff
            .and_then(|net| {
                net.success_table()
                    .probability(SUCCESS_YES, &[t, d])
            })
            .unwrap_or(0.5);
        smooth(
            f64::from(successes[t][d]),
            f64::from(trials[t][d]),
            p0,
            pseudo_count * 2.0,
        )
    })?;

    let network = BayesNetwork::new(
        ConditionalProbabilityTable::root(Variable::Time, time_row)?,
        ConditionalProbabilityTable::root(Variable::Difficulty, difficulty_row)?,
        success,
    )?;

    let mut observations = BTreeMap::new();
    for time in TimeBucket::ALL {
        for difficulty in Difficulty::ALL {
            let seen = trials[time.index()][difficulty.index()];
            if seen == 0 {
                tracing::warn!(
                    time = %time,
                    difficulty = %difficulty,
                    "no training rows for configuration; estimate backs off to default"
                );
            }
            observations.insert((time, difficulty), seen);
        }
    }

    tracing::info!(rows = dataset.len(), pseudo_count, "fitted posterior network");

    Ok((
        network,
        LearnReport {
            rows: dataset.len(),
            observations,
        },
    ))
}

fn smooth(count: f64, total: f64, backoff: f64, pseudo_mass: f64) -> f64 {
    (count + pseudo_mass * backoff) / (total + pseudo_mass)
}

// =============================================================================
// TESTS
// =============================================================================
