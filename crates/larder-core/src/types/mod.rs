//! # Core Type Definitions
//!
//! This module contains the data model shared by every pipeline stage:
//! - Recipe identifiers and records (`RecipeId`, `Recipe`, `Difficulty`)
//! - The per-session constraint snapshot (`Fact`)
//! - Pipeline intermediates and outputs (`Candidate`, `RecommendationResult`)
//! - Error types (`LarderError`)
//!
//! ## Determinism Guarantees
//!
//! All collections in this module are `BTreeSet`-backed so that iteration order,
//! and therefore every derived ranking, is reproducible across runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier for a recipe in the catalog and the knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(pub u64);

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// DIFFICULTY
// =============================================================================

/// How demanding a recipe is to prepare.
///
/// The declaration order is the state order used by the Bayesian network.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// All difficulties in state order.
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// State index of this difficulty.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Difficulty::Easy => 0,
            Difficulty::Medium => 1,
            Difficulty::Hard => 2,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = LarderError;

    /// Accepts the lowercase names as well as the numeric state codes `0`, `1`, `2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" | "0" => Ok(Difficulty::Easy),
            "medium" | "1" => Ok(Difficulty::Medium),
            "hard" | "2" => Ok(Difficulty::Hard),
            other => Err(LarderError::InvalidDataset(format!(
                "unknown difficulty '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// RECIPE
// =============================================================================

/// A recipe record from the catalog.
///
/// Recipes are static: loaded once, validated by [`crate::Catalog`], and only
/// ever borrowed by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub required_ingredients: BTreeSet<String>,
    /// Preparation time in minutes.
    pub prep_time: u32,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Recipe {
    /// Create a recipe, normalising ingredient and tag strings.
    #[must_use]
    pub fn new<I, S>(
        id: u64,
        name: impl Into<String>,
        required_ingredients: I,
        prep_time: u32,
        difficulty: Difficulty,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id: RecipeId(id),
            name: name.into(),
            required_ingredients: normalize_all(required_ingredients),
            prep_time,
            difficulty,
            tags: BTreeSet::new(),
        }
    }

    /// Attach tags to the recipe.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_all(tags);
        self
    }
}

// =============================================================================
// FACT
// =============================================================================

/// The immutable constraint snapshot supplied by the user for one session.
///
/// Strings are trimmed and lowercased on construction; blank entries are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    available_ingredients: BTreeSet<String>,
    time_budget: u32,
    preference_tags: BTreeSet<String>,
}

impl Fact {
    /// Build a fact from raw user input.
    #[must_use]
    pub fn new<I, S, P, T>(ingredients: I, time_budget: u32, preferences: P) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        P: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self {
            available_ingredients: normalize_all(ingredients),
            time_budget,
            preference_tags: normalize_all(preferences),
        }
    }

    /// Ingredients the user has at hand.
    #[must_use]
    pub fn available_ingredients(&self) -> &BTreeSet<String> {
        &self.available_ingredients
    }

    /// Time budget in minutes.
    #[must_use]
    pub fn time_budget(&self) -> u32 {
        self.time_budget
    }

    /// Dietary preference tags; empty means no preference.
    #[must_use]
    pub fn preference_tags(&self) -> &BTreeSet<String> {
        &self.preference_tags
    }
}

fn normalize_all<I, S>(items: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

// =============================================================================
// PIPELINE INTERMEDIATES
// =============================================================================

/// A recipe that survived matching or fallback, with its constraint score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub recipe: Recipe,
    pub satisfied_constraint_count: u32,
}

impl Candidate {
    /// Create a new candidate.
    #[must_use]
    pub fn new(recipe: Recipe, satisfied_constraint_count: u32) -> Self {
        Self {
            recipe,
            satisfied_constraint_count,
        }
    }

    /// Id of the underlying recipe.
    #[must_use]
    pub fn id(&self) -> RecipeId {
        self.recipe.id
    }
}

/// One ranked recommendation. Output-only; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub recipe_id: RecipeId,
    pub recipe_name: String,
    /// Estimated probability of success in `[0, 1]`.
    pub probability: f64,
    pub matched_constraint_count: u32,
    /// True when the estimate backed off because no training rows covered it.
    #[serde(default)]
    pub degraded: bool,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Larder pipeline.
///
/// - `NoMatch` and `NotFound` are recoverable and absorbed by the orchestrator
/// - `InvalidModel`, `InvalidCatalog` and `InvalidDataset` abort initialisation
/// - The core never panics; all errors are returned
#[derive(Debug, Error)]
pub enum LarderError {
    /// The rule engine found no candidate for the stated constraints.
    #[error("No recipe matches the stated constraints")]
    NoMatch,

    /// The knowledge base has no record for the recipe.
    #[error("Recipe unavailable: {0}")]
    NotFound(RecipeId),

    /// A probability table is malformed.
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// The recipe catalog is malformed.
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// A training dataset row could not be used.
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    /// The orchestrator already reached its terminal state.
    #[error("Session already finished")]
    SessionFinished,

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
