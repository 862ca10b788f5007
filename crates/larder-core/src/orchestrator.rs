//! # Orchestrator
//!
//! One request/response cycle through the pipeline.
//!
//! ```text
//! Collecting ──▶ Matching ──▶ Evaluating ──▶ Done
//!                   │              ▲
//!                   └─▶ Fallback ──┘
//! ```
//!
//! The orchestrator owns no data and computes no probabilities. Every
//! collaborator arrives through [`PipelineContext`] and is shared read-only.
//! `Done` is terminal: a finished orchestrator refuses to run again.

use crate::bayes::{ProbabilisticEvaluator, TimeBucket};
use crate::catalog::Catalog;
use crate::knowledge::{
    FallbackSource, KnowledgeBase, KnowledgeGraphResolver, RecipeDetails, Relaxation,
    ResolverConfig,
};
use crate::rules::RuleEngine;
use crate::{Fact, LarderError, RecipeId, RecommendationResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// STATE
// =============================================================================

/// Where the orchestrator is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Collecting,
    Matching,
    Fallback,
    Evaluating,
    Done,
}

impl PipelineState {
    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_advance_to(self, next: PipelineState) -> bool {
        matches!(
            (self, next),
            (PipelineState::Collecting, PipelineState::Matching)
                | (PipelineState::Matching, PipelineState::Evaluating)
                | (PipelineState::Matching, PipelineState::Fallback)
                | (PipelineState::Fallback, PipelineState::Evaluating)
                | (PipelineState::Evaluating, PipelineState::Done)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Collecting => "collecting",
            PipelineState::Matching => "matching",
            PipelineState::Fallback => "fallback",
            PipelineState::Evaluating => "evaluating",
            PipelineState::Done => "done",
        };
        f.write_str(name)
    }
}

// =============================================================================
// CONTEXT & OUTPUT
// =============================================================================

/// Everything a run needs, passed in explicitly.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub catalog: Arc<Catalog>,
    pub knowledge: Arc<dyn KnowledgeBase>,
    pub evaluator: Arc<ProbabilisticEvaluator>,
    pub resolver: ResolverConfig,
}

impl PipelineContext {
    pub fn new(
        catalog: Arc<Catalog>,
        knowledge: Arc<dyn KnowledgeBase>,
        evaluator: Arc<ProbabilisticEvaluator>,
    ) -> Self {
        Self {
            catalog,
            knowledge,
            evaluator,
            resolver: ResolverConfig::default(),
        }
    }

    #[must_use]
    pub fn with_resolver_config(mut self, config: ResolverConfig) -> Self {
        self.resolver = config;
        self
    }
}

/// How the candidates of a run were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "step")]
pub enum MatchSource {
    /// Every constraint held.
    Exact,
    /// Matched after relaxing up to and including this step.
    Relaxed(Relaxation),
    /// Nothing matched; the whole catalog was ranked.
    Catalog,
}

impl From<FallbackSource> for MatchSource {
    fn from(source: FallbackSource) -> Self {
        match source {
            FallbackSource::Relaxed(step) => MatchSource::Relaxed(step),
            FallbackSource::Catalog => MatchSource::Catalog,
        }
    }
}

/// Ranked results of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub source: MatchSource,
    pub results: Vec<RecommendationResult>,
}

/// Outcome of a detail lookup. A missing record is an answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RecipeLookup {
    Found {
        details: RecipeDetails,
        alternatives: Vec<RecipeDetails>,
    },
    Unavailable {
        recipe_id: RecipeId,
        message: String,
    },
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

/// Drives a fact through matching, fallback and evaluation.
#[derive(Debug)]
pub struct Orchestrator {
    context: PipelineContext,
    engine: RuleEngine,
    resolver: KnowledgeGraphResolver,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(context: PipelineContext) -> Self {
        let resolver =
            KnowledgeGraphResolver::new(Arc::clone(&context.knowledge), context.resolver);
        Self {
            context,
            engine: RuleEngine::new(),
            resolver,
            state: PipelineState::Collecting,
            history: vec![PipelineState::Collecting],
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Every state visited, in order, starting with `Collecting`.
    #[must_use]
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Run the pipeline for `fact`.
    ///
    /// Each candidate is scored with the bucket of the fact's time budget as
    /// Time evidence and the recipe's difficulty.
    ///
    /// Results are ranked by probability descending, then matched constraint
    /// count descending, then recipe id ascending. An empty catalog yields an
    /// empty result.
    ///
    /// # Errors
    ///
    /// `LarderError::SessionFinished` if this orchestrator already ran.
    pub fn run(&mut self, fact: Fact) -> Result<Recommendation, LarderError> {
        if self.state == PipelineState::Done {
            return Err(LarderError::SessionFinished);
        }
        self.advance(PipelineState::Matching)?;

        let catalog = Arc::clone(&self.context.catalog);
        let (candidates, source) = match self.engine.infer(&fact, &catalog) {
            Ok(candidates) => (candidates, MatchSource::Exact),
            Err(LarderError::NoMatch) => {
                self.advance(PipelineState::Fallback)?;
                let (candidates, source) = self.resolver.partial_match_with_source(&fact, &catalog);
                (candidates, MatchSource::from(source))
            }
            Err(e) => return Err(e),
        };

        self.advance(PipelineState::Evaluating)?;
        let time = TimeBucket::from_minutes(fact.time_budget());
        let mut results: Vec<RecommendationResult> = candidates
            .iter()
            .map(|candidate| {
                let estimate = self.context.evaluator.estimate_with(&candidate.recipe, time);
                RecommendationResult {
                    recipe_id: candidate.id(),
                    recipe_name: candidate.recipe.name.clone(),
                    probability: estimate.probability,
                    matched_constraint_count: candidate.satisfied_constraint_count,
                    degraded: estimate.degraded,
                }
            })
            .collect();
        results.sort_by(|a, b| {
            b.probability
                .total_cmp(&a.probability)
                .then_with(|| b.matched_constraint_count.cmp(&a.matched_constraint_count))
                .then_with(|| a.recipe_id.cmp(&b.recipe_id))
        });

        self.advance(PipelineState::Done)?;
        tracing::info!(
            results = results.len(),
            source = ?source,
            mode = %self.context.evaluator.mode(),
            "recommendation complete"
        );

        Ok(Recommendation { source, results })
    }

    /// Knowledge-base details for a recipe, with alternatives.
    ///
    /// A missing record becomes [`RecipeLookup::Unavailable`]; other errors
    /// are propagated.
    pub fn describe(&self, recipe_id: RecipeId) -> Result<RecipeLookup, LarderError> {
        match self.resolver.fetch_details(recipe_id) {
            Ok(details) => {
                let alternatives = self.resolver.alternatives(recipe_id)?;
                Ok(RecipeLookup::Found {
                    details,
                    alternatives,
                })
            }
            Err(LarderError::NotFound(id)) => {
                tracing::debug!(recipe = %id, "recipe not in knowledge base");
                Ok(RecipeLookup::Unavailable {
                    recipe_id: id,
                    message: LarderError::NotFound(id).to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn advance(&mut self, next: PipelineState) -> Result<(), LarderError> {
        if !self.state.can_advance_to(next) {
            // `run` only ever follows the diagram in the module docs.
            return Err(LarderError::SessionFinished);
        }
        tracing::debug!(from = %self.state, to = %next, "pipeline transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
