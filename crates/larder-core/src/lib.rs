//! # larder-core
//!
//! The deterministic recommendation pipeline for Larder - THE LOGIC.
//!
//! Given the ingredients at hand, a time budget and dietary preferences, the
//! pipeline proposes recipes and estimates how likely each is to succeed:
//!
//! 1. `rules`: forward-chaining match of the catalog against the stated facts
//! 2. `knowledge`: constraint relaxation when nothing matches strictly
//! 3. `bayes`: success probability from a small Bayesian network
//! 4. `orchestrator`: composes the three and tracks pipeline state
//!
//! ## Architectural Constraints
//!
//! - Synchronous and single-threaded per session; NO async, NO network
//! - Ordered collections only (`BTreeMap`/`BTreeSet`) so every result is
//!   reproducible
//! - Shared state is read-only; refitted networks are swapped in whole
//! - File I/O lives in the app layer, except the redb knowledge base

// =============================================================================
// MODULES
// =============================================================================

pub mod bayes;
pub mod catalog;
pub mod formats;
pub mod knowledge;
pub mod orchestrator;
pub mod primitives;
pub mod rules;
pub mod storage;
pub mod types;
pub mod validation;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Candidate, Difficulty, Fact, LarderError, Recipe, RecipeId, RecommendationResult,
};

// =============================================================================
// RE-EXPORTS: Pipeline
// =============================================================================

pub use bayes::{
    BayesNetwork, ConditionalProbabilityTable, Estimate, Evidence, InferenceMode,
    InferenceStrategy, LearnReport, ModelSnapshot, PosteriorStrategy, PriorStrategy,
    ProbabilisticEvaluator, TimeBucket, TrainingRecord, Variable,
};
pub use catalog::Catalog;
pub use knowledge::{
    FallbackSource, InMemoryKnowledgeBase, KnowledgeBase, KnowledgeGraphResolver, RecipeDetails,
    Relaxation, ResolverConfig,
};
pub use orchestrator::{
    MatchSource, Orchestrator, PipelineContext, PipelineState, RecipeLookup, Recommendation,
};
pub use rules::{ConstraintSet, RuleEngine};
pub use storage::RedbKnowledgeBase;
pub use validation::{CrossValidationReport, FoldMetrics, Metrics, cross_validate};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{ModelHeader, network_from_bytes, network_to_bytes};
