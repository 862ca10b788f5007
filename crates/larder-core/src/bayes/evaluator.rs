//! Inference strategies and the evaluator facade.
//!
//! A strategy owns the network the evaluator reads. Evaluation always goes
//! through [`ModelSnapshot`], so the evaluator never inspects which mode it
//! runs in.

use super::learn::{LearnReport, TrainingRecord, fit};
use super::network::BayesNetwork;
use super::{Estimate, Evidence, InferenceMode, TimeBucket};
use crate::primitives::DEFAULT_PSEUDO_COUNT;
use crate::{Difficulty, LarderError, Recipe};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// An immutable, validated network plus the configurations that had no
/// supporting observations when it was built.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSnapshot {
    mode: InferenceMode,
    network: BayesNetwork,
    unsupported: BTreeSet<(TimeBucket, Difficulty)>,
}

impl ModelSnapshot {
    /// Snapshot of an authored network. Nothing is degraded.
    pub fn authored(network: BayesNetwork) -> Result<Self, LarderError> {
        network.validate()?;
        Ok(Self {
            mode: InferenceMode::Prior,
            network,
            unsupported: BTreeSet::new(),
        })
    }

    /// Snapshot of a fitted network.
    pub fn learned(network: BayesNetwork, report: &LearnReport) -> Result<Self, LarderError> {
        network.validate()?;
        Ok(Self {
            mode: InferenceMode::Posterior,
            network,
            unsupported: report.insufficient().into_iter().collect(),
        })
    }

    #[must_use]
    pub fn mode(&self) -> InferenceMode {
        self.mode
    }

    #[must_use]
    pub fn network(&self) -> &BayesNetwork {
        &self.network
    }

    /// Configurations whose estimates are pure back-off.
    #[must_use]
    pub fn unsupported(&self) -> &BTreeSet<(TimeBucket, Difficulty)> {
        &self.unsupported
    }

    /// Estimate for a full (time, difficulty) configuration.
    #[must_use]
    pub fn estimate(&self, time: TimeBucket, difficulty: Difficulty) -> Estimate {
        Estimate {
            probability: self.network.success_probability(time, difficulty),
            degraded: self.unsupported.contains(&(time, difficulty)),
        }
    }
}

// =============================================================================
// STRATEGIES
// =============================================================================

/// Source of the network an evaluator reads.
///
/// Implementations hand out a cheap `Arc` clone of their current snapshot.
/// Callers hold that snapshot for the duration of a request and never see a
/// partially built table.
pub trait InferenceStrategy: Send + Sync + fmt::Debug {
    fn mode(&self) -> InferenceMode;

    fn snapshot(&self) -> Arc<ModelSnapshot>;
}

/// Authored tables, fixed at construction.
#[derive(Debug, Clone)]
pub struct PriorStrategy {
    snapshot: Arc<ModelSnapshot>,
}

impl PriorStrategy {
    pub fn new(network: BayesNetwork) -> Result<Self, LarderError> {
        Ok(Self {
            snapshot: Arc::new(ModelSnapshot::authored(network)?),
        })
    }
}

impl InferenceStrategy for PriorStrategy {
    fn mode(&self) -> InferenceMode {
        InferenceMode::Prior
    }

    fn snapshot(&self) -> Arc<ModelSnapshot> {
        Arc::clone(&self.snapshot)
    }
}

/// Tables fitted from data, refittable at runtime.
///
/// [`PosteriorStrategy::learn`] fits a complete new network outside the lock,
/// then swaps the `Arc` in one write.
#[derive(Debug)]
pub struct PosteriorStrategy {
    backoff: Option<Arc<BayesNetwork>>,
    pseudo_count: f64,
    current: RwLock<Arc<ModelSnapshot>>,
}

impl PosteriorStrategy {
    /// Fit an initial network from `dataset`.
    ///
    /// `backoff` is the network unseen configurations shrink toward; `None`
    /// means uniform.
    pub fn fit(
        dataset: &[TrainingRecord],
        backoff: Option<Arc<BayesNetwork>>,
        pseudo_count: f64,
    ) -> Result<(Self, LearnReport), LarderError> {
        let (network, report) = fit(dataset, backoff.as_deref(), pseudo_count)?;
        let snapshot = ModelSnapshot::learned(network, &report)?;
        Ok((
            Self {
                backoff,
                pseudo_count,
                current: RwLock::new(Arc::new(snapshot)),
            },
            report,
        ))
    }

    /// Fit with the default pseudo-count.
    pub fn fit_default(
        dataset: &[TrainingRecord],
        backoff: Option<Arc<BayesNetwork>>,
    ) -> Result<(Self, LearnReport), LarderError> {
        Self::fit(dataset, backoff, DEFAULT_PSEUDO_COUNT)
    }

    /// Resume from a previously persisted network.
    ///
    /// The loaded network carries no observation counts, so nothing is
    /// flagged as degraded until the next `learn`.
    pub fn from_network(
        network: BayesNetwork,
        backoff: Option<Arc<BayesNetwork>>,
        pseudo_count: f64,
    ) -> Result<Self, LarderError> {
        network.validate()?;
        let snapshot = ModelSnapshot {
            mode: InferenceMode::Posterior,
            network,
            unsupported: BTreeSet::new(),
        };
        Ok(Self {
            backoff,
            pseudo_count,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Refit every table from `dataset` and swap the result in.
    ///
    /// On error the current network is left untouched.
    pub fn learn(&self, dataset: &[TrainingRecord]) -> Result<LearnReport, LarderError> {
        let (network, report) = fit(dataset, self.backoff.as_deref(), self.pseudo_count)?;
        let snapshot = Arc::new(ModelSnapshot::learned(network, &report)?);

        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = snapshot;

        Ok(report)
    }

    #[must_use]
    pub fn pseudo_count(&self) -> f64 {
        self.pseudo_count
    }
}

impl InferenceStrategy for PosteriorStrategy {
    fn mode(&self) -> InferenceMode {
        InferenceMode::Posterior
    }

    fn snapshot(&self) -> Arc<ModelSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }
}

// =============================================================================
// EVALUATOR
// =============================================================================

/// Scores recipes with whatever network its strategy currently holds.
#[derive(Debug, Clone)]
pub struct ProbabilisticEvaluator {
    strategy: Arc<dyn InferenceStrategy>,
}

impl ProbabilisticEvaluator {
    pub fn new(strategy: Arc<dyn InferenceStrategy>) -> Self {
        Self { strategy }
    }

    /// Evaluator over a fixed authored network.
    pub fn prior(network: BayesNetwork) -> Result<Self, LarderError> {
        Ok(Self::new(Arc::new(PriorStrategy::new(network)?)))
    }

    /// Evaluator over the built-in expert network.
    pub fn expert() -> Result<Self, LarderError> {
        Self::prior(BayesNetwork::expert()?)
    }

    /// Evaluator sharing a posterior strategy. Later `learn` calls on the
    /// strategy are visible to this evaluator.
    pub fn posterior(strategy: Arc<PosteriorStrategy>) -> Self {
        Self::new(strategy)
    }

    #[must_use]
    pub fn mode(&self) -> InferenceMode {
        self.strategy.mode()
    }

    /// The network in use right now.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ModelSnapshot> {
        self.strategy.snapshot()
    }

    /// `P(Success = yes | recipe's time bucket, recipe's difficulty)`.
    #[must_use]
    pub fn evaluate(&self, recipe: &Recipe) -> f64 {
        self.estimate(recipe).probability
    }

    /// Probability plus whether it rests on back-off alone, with the recipe's
    /// own preparation time as Time evidence.
    #[must_use]
    pub fn estimate(&self, recipe: &Recipe) -> Estimate {
        self.estimate_with(recipe, TimeBucket::from_minutes(recipe.prep_time))
    }

    /// Estimate under explicit Time evidence.
    ///
    /// The pipeline passes the bucket of the session's time budget: the
    /// network scores how likely a recipe of this difficulty succeeds for a
    /// cook with that much time, not how long the recipe takes.
    #[must_use]
    pub fn estimate_with(&self, recipe: &Recipe, time: TimeBucket) -> Estimate {
        let estimate = self.strategy.snapshot().estimate(time, recipe.difficulty);
        if estimate.degraded {
            tracing::warn!(
                recipe = %recipe.id,
                %time,
                probability = estimate.probability,
                "no training data for recipe configuration; using back-off estimate"
            );
        }
        estimate
    }

    /// Standalone query with possibly partial evidence.
    #[must_use]
    pub fn query(&self, evidence: &Evidence) -> f64 {
        self.strategy.snapshot().network().query(evidence)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn recipe(prep_time: u32, difficulty: Difficulty) -> Recipe {
        Recipe::new(1, "omelette", ["egg"], prep_time, difficulty)
    }

    #[test]
    fn prior_evaluation_is_table_lookup() {
        let mut table = [[0.5; 3]; 3];
        table[0][0] = 0.9;
        let evaluator =
            ProbabilisticEvaluator::prior(BayesNetwork::from_success_table(table).expect("net"))
                .expect("evaluator");

        assert_eq!(evaluator.mode(), InferenceMode::Prior);
        let p = evaluator.evaluate(&recipe(20, Difficulty::Easy));
        assert!((p - 0.9).abs() < EPS);
        assert!(!evaluator.estimate(&recipe(20, Difficulty::Easy)).degraded);
    }

    #[test]
    fn explicit_time_evidence_overrides_prep_time() {
        let evaluator = ProbabilisticEvaluator::expert().expect("evaluator");
        let network = BayesNetwork::expert().expect("expert");
        let slow = recipe(45, Difficulty::Medium);

        let p = evaluator.estimate_with(&slow, TimeBucket::Short).probability;
        let expected = network.success_probability(TimeBucket::Short, Difficulty::Medium);
        assert!((p - expected).abs() < EPS);
        assert!(p < evaluator.evaluate(&slow));
    }

    #[test]
    fn posterior_flags_unsupported_configurations() {
        let data = vec![TrainingRecord::new(10, Difficulty::Easy, true); 4];
        let (strategy, _) = PosteriorStrategy::fit_default(&data, None).expect("fit");
        let evaluator = ProbabilisticEvaluator::posterior(Arc::new(strategy));

        assert_eq!(evaluator.mode(), InferenceMode::Posterior);
        assert!(!evaluator.estimate(&recipe(10, Difficulty::Easy)).degraded);

        let unseen = evaluator.estimate(&recipe(90, Difficulty::Hard));
        assert!(unseen.degraded);
        assert!((unseen.probability - 0.5).abs() < EPS);
    }

    #[test]
    fn learn_swaps_snapshot_for_shared_evaluators() {
        let failures = vec![TrainingRecord::new(10, Difficulty::Easy, false); 8];
        let (strategy, _) = PosteriorStrategy::fit_default(&failures, None).expect("fit");
        let strategy = Arc::new(strategy);
        let evaluator = ProbabilisticEvaluator::posterior(Arc::clone(&strategy));

        let held = evaluator.snapshot();
        let before = evaluator.evaluate(&recipe(10, Difficulty::Easy));

        let successes = vec![TrainingRecord::new(10, Difficulty::Easy, true); 8];
        strategy.learn(&successes).expect("refit");
        let after = evaluator.evaluate(&recipe(10, Difficulty::Easy));

        assert!(after > before);
        // A snapshot taken before the swap keeps the old tables.
        let old = held.estimate(TimeBucket::Short, Difficulty::Easy).probability;
        assert!((old - before).abs() < EPS);
    }

    #[test]
    fn failed_refit_keeps_current_network() {
        let data = vec![TrainingRecord::new(30, Difficulty::Medium, true); 3];
        let (strategy, _) = PosteriorStrategy::fit(&data, None, 1.0).expect("fit");
        let before = strategy.snapshot();

        let too_many = vec![
            TrainingRecord::new(30, Difficulty::Medium, true);
            crate::primitives::MAX_DATASET_ROWS + 1
        ];
        assert!(strategy.learn(&too_many).is_err());
        assert_eq!(*strategy.snapshot(), *before);
    }

    #[test]
    fn query_marginalizes_missing_evidence() {
        let evaluator = ProbabilisticEvaluator::expert().expect("expert");
        let p = evaluator.query(&Evidence::default());
        assert!((0.0..=1.0).contains(&p));
    }
}
