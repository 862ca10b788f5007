//! # Bayesian Evaluation
//!
//! Success-probability estimation over a three-node network:
//!
//! ```text
//!   Time ──┐
//!          ├──▶ Success
//!   Difficulty ┘
//! ```
//!
//! - `cpt`: conditional probability tables and their invariants
//! - `network`: the DAG, the authored expert tables and exact inference
//! - `learn`: batch parameter fitting with Laplace smoothing and back-off
//! - `evaluator`: prior/posterior strategies and the evaluator facade
//!
//! The network is small enough that every query is answered by exact
//! enumeration; there is no approximate inference.

mod cpt;
mod evaluator;
mod learn;
mod network;

pub use cpt::ConditionalProbabilityTable;
pub use evaluator::{
    InferenceStrategy, ModelSnapshot, PosteriorStrategy, PriorStrategy, ProbabilisticEvaluator,
};
pub use learn::{LearnReport, TrainingRecord, fit};
pub use network::BayesNetwork;

use crate::primitives::{MEDIUM_TIME_MAX, SHORT_TIME_MAX};
use crate::{Difficulty, LarderError, Recipe};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// VARIABLES
// =============================================================================

/// A node of the network.
///
/// Declaration order is a valid topological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Variable {
    Time,
    Difficulty,
    Success,
}

impl Variable {
    /// Number of states the variable takes.
    #[must_use]
    pub const fn cardinality(self) -> usize {
        match self {
            Variable::Time | Variable::Difficulty => 3,
            Variable::Success => 2,
        }
    }

    /// State names in index order.
    #[must_use]
    pub const fn states(self) -> &'static [&'static str] {
        match self {
            Variable::Time => &["short", "medium", "long"],
            Variable::Difficulty => &["easy", "medium", "hard"],
            Variable::Success => &["no", "yes"],
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Success state index for "yes".
pub(crate) const SUCCESS_YES: usize = 1;

// =============================================================================
// TIME BUCKETS
// =============================================================================

/// Discretised preparation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    /// Up to `SHORT_TIME_MAX` minutes.
    Short,
    /// Up to `MEDIUM_TIME_MAX` minutes.
    Medium,
    /// Anything longer.
    Long,
}

impl TimeBucket {
    /// All buckets in state order.
    pub const ALL: [TimeBucket; 3] = [TimeBucket::Short, TimeBucket::Medium, TimeBucket::Long];

    /// Bucket for a duration in minutes.
    #[must_use]
    pub const fn from_minutes(minutes: u32) -> Self {
        if minutes <= SHORT_TIME_MAX {
            TimeBucket::Short
        } else if minutes <= MEDIUM_TIME_MAX {
            TimeBucket::Medium
        } else {
            TimeBucket::Long
        }
    }

    /// State index of this bucket.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            TimeBucket::Short => 0,
            TimeBucket::Medium => 1,
            TimeBucket::Long => 2,
        }
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Variable::Time.states()[self.index()])
    }
}

// =============================================================================
// INFERENCE MODE
// =============================================================================

/// Where a network's tables come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMode {
    /// Authored once at startup, never altered by data.
    #[default]
    Prior,
    /// Fitted from a training dataset.
    Posterior,
}

impl fmt::Display for InferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceMode::Prior => f.write_str("prior"),
            InferenceMode::Posterior => f.write_str("posterior"),
        }
    }
}

impl FromStr for InferenceMode {
    type Err = LarderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prior" => Ok(InferenceMode::Prior),
            "posterior" => Ok(InferenceMode::Posterior),
            other => Err(LarderError::InvalidModel(format!(
                "unknown inference mode '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// EVIDENCE & ESTIMATES
// =============================================================================

/// Observed parent values for a query. Unobserved parents are marginalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Evidence {
    pub time: Option<TimeBucket>,
    pub difficulty: Option<Difficulty>,
}

impl Evidence {
    /// Full evidence taken from a recipe's preparation time and difficulty.
    #[must_use]
    pub fn for_recipe(recipe: &Recipe) -> Self {
        Self {
            time: Some(TimeBucket::from_minutes(recipe.prep_time)),
            difficulty: Some(recipe.difficulty),
        }
    }
}

/// A success estimate for one recipe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Probability of success in `[0, 1]`.
    pub probability: f64,
    /// True when no training rows supported this configuration.
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_bucket_boundaries() {
        assert_eq!(TimeBucket::from_minutes(20), TimeBucket::Short);
        assert_eq!(TimeBucket::from_minutes(21), TimeBucket::Medium);
        assert_eq!(TimeBucket::from_minutes(60), TimeBucket::Medium);
        assert_eq!(TimeBucket::from_minutes(61), TimeBucket::Long);
    }

    #[test]
    fn variable_states_match_cardinality() {
        for variable in [Variable::Time, Variable::Difficulty, Variable::Success] {
            assert_eq!(variable.states().len(), variable.cardinality());
        }
    }

    #[test]
    fn inference_mode_parses() {
        assert_eq!(
            "Posterior".parse::<InferenceMode>().expect("parse"),
            InferenceMode::Posterior
        );
        assert!("guess".parse::<InferenceMode>().is_err());
    }
}
