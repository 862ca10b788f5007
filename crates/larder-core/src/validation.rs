//! # Cross-Validation
//!
//! k-fold evaluation of the learned network.
//!
//! Row `i` belongs to fold `i % k`, so the split is deterministic and needs no
//! random source. Each fold is scored against a network fitted on the other
//! `k - 1` folds; a prediction is positive when `P(success) >=
//! PREDICTION_THRESHOLD`.

use crate::bayes::{BayesNetwork, TrainingRecord, fit};
use crate::primitives::{DEFAULT_FOLDS, PREDICTION_THRESHOLD};
use crate::LarderError;
use serde::{Deserialize, Serialize};

/// Binary-outcome confusion counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive: u32,
    pub false_positive: u32,
    pub true_negative: u32,
    pub false_negative: u32,
}

impl ConfusionMatrix {
    pub fn record(&mut self, predicted: bool, actual: bool) {
        let cell = match (predicted, actual) {
            (true, true) => &mut self.true_positive,
            (true, false) => &mut self.false_positive,
            (false, false) => &mut self.true_negative,
            (false, true) => &mut self.false_negative,
        };
        *cell = cell.saturating_add(1);
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.true_positive
            .saturating_add(self.false_positive)
            .saturating_add(self.true_negative)
            .saturating_add(self.false_negative)
    }

    /// Accuracy, precision, recall and F1. A zero denominator yields 0.
    #[must_use]
    pub fn metrics(&self) -> Metrics {
        let tp = f64::from(self.true_positive);
        let fp = f64::from(self.false_positive);
        let tn = f64::from(self.true_negative);
        let fn_ = f64::from(self.false_negative);

        let accuracy = ratio(tp + tn, tp + fp + tn + fn_);
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = ratio(2.0 * precision * recall, precision + recall);

        Metrics {
            accuracy,
            precision,
            recall,
            f1,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Classification quality.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Outcome of one fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldMetrics {
    pub fold: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub confusion: ConfusionMatrix,
    pub metrics: Metrics,
}

/// Per-fold results plus their unweighted mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub folds: Vec<FoldMetrics>,
    pub mean: Metrics,
}

/// Run k-fold cross-validation with at most `folds` folds.
///
/// The fold count is clamped to the number of rows. At least two rows are
/// required.
pub fn cross_validate(
    dataset: &[TrainingRecord],
    backoff: Option<&BayesNetwork>,
    pseudo_count: f64,
    folds: usize,
) -> Result<CrossValidationReport, LarderError> {
    if folds < 2 {
        return Err(LarderError::InvalidDataset(format!(
            "cross-validation needs at least 2 folds, got {}",
            folds
        )));
    }
    if dataset.len() < 2 {
        return Err(LarderError::InvalidDataset(format!(
            "cross-validation needs at least 2 rows, got {}",
            dataset.len()
        )));
    }

    let k = folds.min(dataset.len());
    let mut results = Vec::with_capacity(k);

    for fold in 0..k {
        let train: Vec<TrainingRecord> = dataset
            .iter()
            .enumerate()
            .filter(|(i, _)| i % k != fold)
            .map(|(_, r)| *r)
            .collect();
        let test: Vec<&TrainingRecord> = dataset
            .iter()
            .enumerate()
            .filter(|(i, _)| i % k == fold)
            .map(|(_, r)| r)
            .collect();

        let (network, _) = fit(&train, backoff, pseudo_count)?;

        let mut confusion = ConfusionMatrix::default();
        for record in &test {
            let (time, difficulty) = record.configuration();
            let p = network.success_probability(time, difficulty);
            confusion.record(p >= PREDICTION_THRESHOLD, record.success);
        }

        let metrics = confusion.metrics();
        tracing::debug!(
            fold,
            train = train.len(),
            test = test.len(),
            accuracy = metrics.accuracy,
            "fold evaluated"
        );
        results.push(FoldMetrics {
            fold,
            train_rows: train.len(),
            test_rows: test.len(),
            confusion,
            metrics,
        });
    }

    let mean = mean_metrics(&results);
    tracing::info!(
        folds = k,
        accuracy = mean.accuracy,
        f1 = mean.f1,
        "cross-validation complete"
    );

    Ok(CrossValidationReport {
        folds: results,
        mean,
    })
}

/// [`cross_validate`] with `DEFAULT_FOLDS`.
pub fn cross_validate_default(
    dataset: &[TrainingRecord],
    backoff: Option<&BayesNetwork>,
    pseudo_count: f64,
) -> Result<CrossValidationReport, LarderError> {
    cross_validate(dataset, backoff, pseudo_count, DEFAULT_FOLDS)
}

fn mean_metrics(folds: &[FoldMetrics]) -> Metrics {
    let n = folds.len() as f64;
    if folds.is_empty() {
        return Metrics::default();
    }
    let sum = folds.iter().fold(Metrics::default(), |acc, f| Metrics {
        accuracy: acc.accuracy + f.metrics.accuracy,
        precision: acc.precision + f.metrics.precision,
        recall: acc.recall + f.metrics.recall,
        f1: acc.f1 + f.metrics.f1,
    });
    Metrics {
        accuracy: sum.accuracy / n,
        precision: sum.precision / n,
        recall: sum.recall / n,
        f1: sum.f1 / n,
    }
}

// =============================================================================
// TESTS
// =============================================================================
