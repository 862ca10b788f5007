//! # Knowledge Graph Resolver
//!
//! Structured recipe knowledge and the fallback path taken when strict
//! matching yields nothing.
//!
//! - [`KnowledgeBase`] is the read-only collaborator holding [`RecipeDetails`]
//! - [`InMemoryKnowledgeBase`] keeps records in a `BTreeMap`
//! - [`crate::storage::RedbKnowledgeBase`] keeps them on disk
//! - [`KnowledgeGraphResolver`] answers detail lookups and relaxes constraints
//!
//! ## Relaxation Order
//!
//! Steps are cumulative and always applied in the same order:
//!
//! 1. `DropPreferences`
//! 2. `WidenTimeBudget`
//! 3. `PartialIngredients`
//!
//! After each step the rule engine is re-run under the relaxed constraint set
//! and the first non-empty result wins. If nothing matches, the whole catalog
//! is returned ranked. A nonempty catalog never yields an empty result.

use crate::catalog::Catalog;
use crate::primitives::{DEFAULT_TIME_TOLERANCE, MAX_RELAXATION_STEPS};
use crate::rules::{
    ConstraintSet, IngredientCoverage, RuleEngine, TimeLimit, satisfied_constraint_count,
};
use crate::{Candidate, Fact, LarderError, RecipeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Category given to catalog-derived records when the recipe has no tags.
pub const DEFAULT_CATEGORY: &str = "general";

// =============================================================================
// RECORDS
// =============================================================================

/// A knowledge-base record describing one recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeDetails {
    pub id: RecipeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub prep_time: u32,
    pub category: String,
    /// Explicitly linked alternatives, in addition to same-category recipes.
    #[serde(default)]
    pub alternatives: Vec<RecipeId>,
}

impl RecipeDetails {
    /// Trim and lowercase the category so lookups by category are exact.
    pub(crate) fn normalized(mut self) -> Self {
        self.category = self.category.trim().to_lowercase();
        self
    }
}

// =============================================================================
// KNOWLEDGE BASE
// =============================================================================

/// Read-only store of recipe records.
pub trait KnowledgeBase: Send + Sync + fmt::Debug {
    /// Record for `id`, if present.
    fn lookup(&self, id: RecipeId) -> Result<Option<RecipeDetails>, LarderError>;

    /// Every record whose category equals `category`, ascending by id.
    fn by_category(&self, category: &str) -> Result<Vec<RecipeDetails>, LarderError>;

    /// Number of records.
    fn record_count(&self) -> Result<usize, LarderError>;
}

/// In-memory knowledge base.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKnowledgeBase {
    records: BTreeMap<RecipeId, RecipeDetails>,
}

impl InMemoryKnowledgeBase {
    /// Build from records. Duplicate ids and blank categories are rejected.
    pub fn new(records: impl IntoIterator<Item = RecipeDetails>) -> Result<Self, LarderError> {
        let mut map = BTreeMap::new();
        for record in records {
            let record = record.normalized();
            if record.category.is_empty() {
                return Err(LarderError::InvalidCatalog(format!(
                    "recipe {} has an empty category",
                    record.id
                )));
            }
            if map.contains_key(&record.id) {
                return Err(LarderError::InvalidCatalog(format!(
                    "duplicate knowledge-base record {}",
                    record.id
                )));
            }
            map.insert(record.id, record);
        }
        Ok(Self { records: map })
    }

    /// Derive records from a catalog.
    ///
    /// The category is the recipe's first tag (or [`DEFAULT_CATEGORY`]) and
    /// the description lists its ingredients.
    #[must_use]
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let records = catalog
            .iter()
            .map(|recipe| {
                let ingredients: Vec<&str> = recipe
                    .required_ingredients
                    .iter()
                    .map(String::as_str)
                    .collect();
                let category = recipe
                    .tags
                    .iter()
                    .next()
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
                let details = RecipeDetails {
                    id: recipe.id,
                    name: recipe.name.clone(),
                    description: format!(
                        "{} ({}): {}",
                        recipe.name,
                        recipe.difficulty,
                        ingredients.join(", ")
                    ),
                    prep_time: recipe.prep_time,
                    category,
                    alternatives: Vec::new(),
                };
                (recipe.id, details)
            })
            .collect();
        Self { records }
    }

    /// Iterate records ascending by id.
    pub fn iter(&self) -> impl Iterator<Item = &RecipeDetails> {
        self.records.values()
    }
}

impl KnowledgeBase for InMemoryKnowledgeBase {
    fn lookup(&self, id: RecipeId) -> Result<Option<RecipeDetails>, LarderError> {
        Ok(self.records.get(&id).cloned())
    }

    fn by_category(&self, category: &str) -> Result<Vec<RecipeDetails>, LarderError> {
        let category = category.trim().to_lowercase();
        Ok(self
            .records
            .values()
            .filter(|r| r.category == category)
            .cloned()
            .collect())
    }

    fn record_count(&self) -> Result<usize, LarderError> {
        Ok(self.records.len())
    }
}

// =============================================================================
// RELAXATION
// =============================================================================

/// One constraint-relaxation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relaxation {
    /// Ignore preference tags.
    DropPreferences,
    /// Allow prep time up to `time_budget * (1 + time_tolerance)`.
    WidenTimeBudget,
    /// Require only one available ingredient.
    PartialIngredients,
}

impl Relaxation {
    /// Steps in application order.
    pub const ALL: [Relaxation; 3] = [
        Relaxation::DropPreferences,
        Relaxation::WidenTimeBudget,
        Relaxation::PartialIngredients,
    ];

    /// Relax `constraints` by this step.
    pub fn apply(self, constraints: &mut ConstraintSet, config: &ResolverConfig) {
        match self {
            Relaxation::DropPreferences => constraints.require_preferences = false,
            Relaxation::WidenTimeBudget => {
                constraints.time_limit = TimeLimit::Tolerant(config.time_tolerance)
            }
            Relaxation::PartialIngredients => {
                constraints.ingredients = IngredientCoverage::AtLeastOne
            }
        }
    }
}

impl fmt::Display for Relaxation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relaxation::DropPreferences => f.write_str("drop-preferences"),
            Relaxation::WidenTimeBudget => f.write_str("widen-time-budget"),
            Relaxation::PartialIngredients => f.write_str("partial-ingredients"),
        }
    }
}

/// Resolver tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Fraction of the time budget a recipe may overrun once the budget is
    /// widened. Negative values are treated as zero.
    pub time_tolerance: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            time_tolerance: DEFAULT_TIME_TOLERANCE,
        }
    }
}

/// Which step produced a fallback result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSource {
    /// Matched after applying this step and every step before it.
    Relaxed(Relaxation),
    /// Nothing matched; the whole catalog was ranked.
    Catalog,
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Detail lookups and constraint relaxation over a knowledge base.
#[derive(Debug, Clone)]
pub struct KnowledgeGraphResolver {
    knowledge: Arc<dyn KnowledgeBase>,
    engine: RuleEngine,
    config: ResolverConfig,
}

impl KnowledgeGraphResolver {
    pub fn new(knowledge: Arc<dyn KnowledgeBase>, config: ResolverConfig) -> Self {
        Self {
            knowledge,
            engine: RuleEngine::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Details for a recipe, or `LarderError::NotFound`.
    pub fn fetch_details(&self, recipe_id: RecipeId) -> Result<RecipeDetails, LarderError> {
        self.knowledge
            .lookup(recipe_id)?
            .ok_or(LarderError::NotFound(recipe_id))
    }

    /// Other recipes that can stand in for `recipe_id`.
    ///
    /// Explicitly linked alternatives plus every other record of the same
    /// category, ascending by id. Linked ids missing from the knowledge base
    /// are skipped.
    pub fn alternatives(&self, recipe_id: RecipeId) -> Result<Vec<RecipeDetails>, LarderError> {
        let record = self.fetch_details(recipe_id)?;

        let mut found: BTreeMap<RecipeId, RecipeDetails> = self
            .knowledge
            .by_category(&record.category)?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();

        let linked: BTreeSet<RecipeId> = record.alternatives.iter().copied().collect();
        for id in linked {
            if found.contains_key(&id) {
                continue;
            }
            match self.knowledge.lookup(id)? {
                Some(r) => {
                    found.insert(id, r);
                }
                None => {
                    tracing::debug!(
                        recipe = %recipe_id,
                        missing = %id,
                        "linked alternative not in knowledge base"
                    );
                }
            }
        }

        found.remove(&recipe_id);
        Ok(found.into_values().collect())
    }

    /// Best-effort candidates for a fact that matched nothing strictly.
    ///
    /// Ranked by `satisfied_constraint_count` descending, then recipe id
    /// ascending. Empty only when the catalog is empty.
    pub fn partial_match(&self, fact: &Fact, catalog: &Catalog) -> Vec<Candidate> {
        self.partial_match_with_source(fact, catalog).0
    }

    /// Like [`Self::partial_match`], also reporting which step produced the
    /// result.
    pub fn partial_match_with_source(
        &self,
        fact: &Fact,
        catalog: &Catalog,
    ) -> (Vec<Candidate>, FallbackSource) {
        let mut constraints = ConstraintSet::strict();

        for step in Relaxation::ALL.into_iter().take(MAX_RELAXATION_STEPS) {
            step.apply(&mut constraints, &self.config);
            match self.engine.infer_with(fact, catalog, &constraints) {
                Ok(candidates) => {
                    tracing::debug!(
                        step = %step,
                        candidates = candidates.len(),
                        "relaxation produced candidates"
                    );
                    return (rank(candidates), FallbackSource::Relaxed(step));
                }
                Err(_) => {
                    tracing::debug!(step = %step, "relaxation produced nothing");
                }
            }
        }

        tracing::info!(
            recipes = catalog.len(),
            "no relaxation matched; ranking full catalog"
        );
        let all = catalog
            .iter()
            .map(|recipe| Candidate::new(recipe.clone(), satisfied_constraint_count(fact, recipe)))
            .collect();
        (rank(all), FallbackSource::Catalog)
    }
}

/// Count descending, then id ascending.
fn rank(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.satisfied_constraint_count
            .cmp(&a.satisfied_constraint_count)
            .then_with(|| a.id().cmp(&b.id()))
    });
    candidates
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Difficulty, Recipe};

    fn catalog() -> Catalog {
        Catalog::new([
            Recipe::new(1, "Omelette", ["egg", "butter"], 10, Difficulty::Easy)
                .with_tags(["breakfast"]),
            Recipe::new(2, "Pancakes", ["egg", "flour", "milk"], 25, Difficulty::Medium)
                .with_tags(["breakfast", "vegetarian"]),
            Recipe::new(3, "Risotto", ["rice", "stock"], 40, Difficulty::Hard)
                .with_tags(["dinner"]),
        ])
        .expect("catalog")
    }

    fn resolver(catalog: &Catalog) -> KnowledgeGraphResolver {
        KnowledgeGraphResolver::new(
            Arc::new(InMemoryKnowledgeBase::from_catalog(catalog)),
            ResolverConfig::default(),
        )
    }

    #[test]
    fn fetch_details_found_and_missing() {
        let catalog = catalog();
        let resolver = resolver(&catalog);

        let details = resolver.fetch_details(RecipeId(3)).expect("details");
        assert_eq!(details.name, "Risotto");
        assert_eq!(details.category, "dinner");

        let missing = resolver.fetch_details(RecipeId(99));
        assert!(matches!(missing, Err(LarderError::NotFound(RecipeId(99)))));
    }

    #[test]
    fn alternatives_share_category() {
        let catalog = catalog();
        let resolver = resolver(&catalog);

        let alternatives = resolver.alternatives(RecipeId(1)).expect("alternatives");
        let ids: Vec<RecipeId> = alternatives.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RecipeId(2)]);
    }

    #[test]
    fn alternatives_include_linked_records() {
        let kb = InMemoryKnowledgeBase::new([
            RecipeDetails {
                id: RecipeId(1),
                name: "Soup".to_string(),
                description: String::new(),
                prep_time: 30,
                category: "Starter".to_string(),
                alternatives: vec![RecipeId(5), RecipeId(404)],
            },
            RecipeDetails {
                id: RecipeId(5),
                name: "Stew".to_string(),
                description: String::new(),
                prep_time: 90,
                category: "main".to_string(),
                alternatives: Vec::new(),
            },
        ])
        .expect("kb");
        let resolver = KnowledgeGraphResolver::new(Arc::new(kb), ResolverConfig::default());

        let ids: Vec<RecipeId> = resolver
            .alternatives(RecipeId(1))
            .expect("alternatives")
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![RecipeId(5)]);
    }

    #[test]
    fn dropping_preferences_comes_first() {
        let catalog = catalog();
        let resolver = resolver(&catalog);
        let fact = Fact::new(["egg", "butter"], 15, ["vegan"]);

        let (candidates, source) = resolver.partial_match_with_source(&fact, &catalog);
        assert_eq!(source, FallbackSource::Relaxed(Relaxation::DropPreferences));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id(), RecipeId(1));
    }

    #[test]
    fn widened_budget_admits_slightly_long_recipes() {
        let catalog = catalog();
        let resolver = resolver(&catalog);
        // Pancakes take 25 minutes; 20 * 1.5 = 30.
        let fact = Fact::new(["egg", "flour", "milk"], 20, Vec::<String>::new());

        let (candidates, source) = resolver.partial_match_with_source(&fact, &catalog);
        assert_eq!(source, FallbackSource::Relaxed(Relaxation::WidenTimeBudget));
        assert_eq!(candidates[0].id(), RecipeId(2));
    }

    #[test]
    fn partial_ingredients_ranked_by_count_then_id() {
        let catalog = catalog();
        let resolver = resolver(&catalog);
        let fact = Fact::new(["egg"], 60, Vec::<String>::new());

        let (candidates, source) = resolver.partial_match_with_source(&fact, &catalog);
        assert_eq!(source, FallbackSource::Relaxed(Relaxation::PartialIngredients));
        let ids: Vec<RecipeId> = candidates.iter().map(Candidate::id).collect();
        // Both satisfy egg + time; tie broken by id.
        assert_eq!(ids, vec![RecipeId(1), RecipeId(2)]);
    }

    #[test]
    fn nothing_matches_returns_whole_catalog() {
        let catalog = catalog();
        let resolver = resolver(&catalog);
        let fact = Fact::new(["saffron"], 5, Vec::<String>::new());

        let (candidates, source) = resolver.partial_match_with_source(&fact, &catalog);
        assert_eq!(source, FallbackSource::Catalog);
        assert_eq!(candidates.len(), catalog.len());
    }

    #[test]
    fn empty_catalog_yields_nothing() {
        let catalog = Catalog::default();
        let resolver = resolver(&catalog);
        let fact = Fact::new(["egg"], 10, Vec::<String>::new());
        assert!(resolver.partial_match(&fact, &catalog).is_empty());
    }

    #[test]
    fn duplicate_records_rejected() {
        let record = RecipeDetails {
            id: RecipeId(1),
            name: "Soup".to_string(),
            description: String::new(),
            prep_time: 30,
            category: "starter".to_string(),
            alternatives: Vec::new(),
        };
        let result = InMemoryKnowledgeBase::new([record.clone(), record]);
        assert!(matches!(result, Err(LarderError::InvalidCatalog(_))));
    }
}
