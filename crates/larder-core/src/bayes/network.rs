//! The recipe-success network and exact inference over it.

use super::cpt::ConditionalProbabilityTable;
use super::{Evidence, SUCCESS_YES, TimeBucket, Variable};
use crate::primitives::{MAX_AUTHORED_SUCCESS, MIN_AUTHORED_SUCCESS};
use crate::{Difficulty, LarderError};
use serde::{Deserialize, Serialize};

/// Authored `P(Time)` for (short, medium, long).
const AUTHORED_TIME_PRIOR: [f64; 3] = [0.5, 0.3, 0.2];

/// Authored `P(Difficulty)` for (easy, medium, hard).
const AUTHORED_DIFFICULTY_PRIOR: [f64; 3] = [0.5, 0.4, 0.1];

/// Authored probability that the ingredients at hand are of good quality.
///
/// Quality is not a node of the network; the authored success table is
/// averaged over it.
const AUTHORED_GOOD_QUALITY: f64 = 0.7;

/// A validated `Time → Success ← Difficulty` network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesNetwork {
    time: ConditionalProbabilityTable,
    difficulty: ConditionalProbabilityTable,
    success: ConditionalProbabilityTable,
}

impl BayesNetwork {
    /// Variables in topological order.
    pub const TOPOLOGICAL_ORDER: [Variable; 3] =
        [Variable::Time, Variable::Difficulty, Variable::Success];

    /// Assemble and validate a network from its three tables.
    pub fn new(
        time: ConditionalProbabilityTable,
        difficulty: ConditionalProbabilityTable,
        success: ConditionalProbabilityTable,
    ) -> Result<Self, LarderError> {
        let network = Self {
            time,
            difficulty,
            success,
        };
        network.validate()?;
        Ok(network)
    }

    /// Build a network from a success table alone, with uniform root priors.
    ///
    /// `success[t][d]` is `P(Success = yes | Time = t, Difficulty = d)`.
    pub fn from_success_table(success: [[f64; 3]; 3]) -> Result<Self, LarderError> {
        let uniform = vec![1.0 / 3.0; 3];
        Self::new(
            ConditionalProbabilityTable::root(Variable::Time, uniform.clone())?,
            ConditionalProbabilityTable::root(Variable::Difficulty, uniform)?,
            success_table(|t, d| success[t][d])?,
        )
    }

    /// The expert-authored network.
    ///
    /// Success risk grows with difficulty, grows further when a non-easy recipe
    /// must be done in a short time, and grows when ingredient quality is poor.
    /// Each per-quality estimate is clamped to
    /// `[MIN_AUTHORED_SUCCESS, MAX_AUTHORED_SUCCESS]` before averaging.
    pub fn expert() -> Result<Self, LarderError> {
        Self::new(
            ConditionalProbabilityTable::root(Variable::Time, AUTHORED_TIME_PRIOR.to_vec())?,
            ConditionalProbabilityTable::root(
                Variable::Difficulty,
                AUTHORED_DIFFICULTY_PRIOR.to_vec(),
            )?,
            success_table(authored_success)?,
        )
    }

    /// Check every table and the DAG shape.
    ///
    /// Time and Difficulty must be roots; Success must have exactly the
    /// parents `[Time, Difficulty]`.
    pub fn validate(&self) -> Result<(), LarderError> {
        expect_shape(&self.time, Variable::Time, &[])?;
        expect_shape(&self.difficulty, Variable::Difficulty, &[])?;
        expect_shape(
            &self.success,
            Variable::Success,
            &[Variable::Time, Variable::Difficulty],
        )?;

        for table in self.tables() {
            table.validate()?;
        }
        Ok(())
    }

    /// The three tables in topological order.
    #[must_use]
    pub fn tables(&self) -> [&ConditionalProbabilityTable; 3] {
        [&self.time, &self.difficulty, &self.success]
    }

    /// `P(Time)`.
    #[must_use]
    pub fn time_prior(&self) -> &ConditionalProbabilityTable {
        &self.time
    }

    /// `P(Difficulty)`.
    #[must_use]
    pub fn difficulty_prior(&self) -> &ConditionalProbabilityTable {
        &self.difficulty
    }

    /// `P(Success | Time, Difficulty)`.
    #[must_use]
    pub fn success_table(&self) -> &ConditionalProbabilityTable {
        &self.success
    }

    /// `P(Success = yes | time, difficulty)` by direct lookup.
    #[must_use]
    pub fn success_probability(&self, time: TimeBucket, difficulty: Difficulty) -> f64 {
        self.success
            .probability(SUCCESS_YES, &[time.index(), difficulty.index()])
            .unwrap_or(0.0)
    }

    /// `P(Success = yes | evidence)` by exact enumeration.
    ///
    /// Observed parents are fixed; unobserved parents are summed out weighted
    /// by their root priors.
    #[must_use]
    pub fn query(&self, evidence: &Evidence) -> f64 {
        if let (Some(time), Some(difficulty)) = (evidence.time, evidence.difficulty) {
            return self.success_probability(time, difficulty);
        }

        let times: Vec<TimeBucket> = match evidence.time {
            Some(t) => vec![t],
            None => TimeBucket::ALL.to_vec(),
        };
        let difficulties: Vec<Difficulty> = match evidence.difficulty {
            Some(d) => vec![d],
            None => Difficulty::ALL.to_vec(),
        };

        let mut joint = 0.0;
        let mut evidence_mass = 0.0;
        let mut plain_sum = 0.0;
        let mut configurations = 0.0;

        for &t in &times {
            for &d in &difficulties {
                let weight = self.time.probability(t.index(), &[]).unwrap_or(0.0)
                    * self.difficulty.probability(d.index(), &[]).unwrap_or(0.0);
                let p_success = self.success_probability(t, d);

                joint += weight * p_success;
                evidence_mass += weight;
                plain_sum += p_success;
                configurations += 1.0;
            }
        }

        if evidence_mass > 0.0 {
            (joint / evidence_mass).clamp(0.0, 1.0)
        } else {
            // Evidence has zero prior mass; fall back to an unweighted average.
            (plain_sum / configurations).clamp(0.0, 1.0)
        }
    }
}

/// Build a `Success | Time, Difficulty` table from a per-configuration
/// probability of success.
pub(crate) fn success_table(
    p_success: impl Fn(usize, usize) -> f64,
) -> Result<ConditionalProbabilityTable, LarderError> {
    let mut rows = Vec::with_capacity(9);
    for t in 0..Variable::Time.cardinality() {
        for d in 0..Variable::Difficulty.cardinality() {
            let p = p_success(t, d);
            rows.push(vec![1.0 - p, p]);
        }
    }
    ConditionalProbabilityTable::new(
        Variable::Success,
        vec![Variable::Time, Variable::Difficulty],
        rows,
    )
}

fn authored_success(time: usize, difficulty: usize) -> f64 {
    let for_quality = |good_quality: bool| {
        let mut risk = 0.0;
        if time == TimeBucket::Short.index() && difficulty > Difficulty::Easy.index() {
            risk += 0.3 * difficulty as f64;
        }
        if difficulty == Difficulty::Hard.index() {
            risk += 0.5;
        } else if difficulty == Difficulty::Medium.index() {
            risk += 0.2;
        }
        if !good_quality {
            risk += 0.4;
        }
        (1.0 - risk).clamp(MIN_AUTHORED_SUCCESS, MAX_AUTHORED_SUCCESS)
    };

    AUTHORED_GOOD_QUALITY * for_quality(true) + (1.0 - AUTHORED_GOOD_QUALITY) * for_quality(false)
}

fn expect_shape(
    table: &ConditionalProbabilityTable,
    variable: Variable,
    parents: &[Variable],
) -> Result<(), LarderError> {
    if table.variable() != variable || table.parents() != parents {
        return Err(LarderError::InvalidModel(format!(
            "expected table for {} with parents {:?}, found {} with parents {:?}",
            variable,
            parents,
            table.variable(),
            table.parents()
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
