//! # Rule Engine
//!
//! Forward-chaining matcher that derives the initial candidate set.
//!
//! - Rules are a fixed, statically enumerated table of `(predicate, action)` pairs
//! - Every pass evaluates all rules against an immutable snapshot of working memory
//! - Newly derived facts are merged only after the pass completes
//! - The loop halts on the first pass that derives nothing new
//!
//! Actions only ever insert into a `BTreeSet` over a finite catalog, so the set
//! of derivable facts is bounded and the loop reaches a fixed point.

use crate::catalog::Catalog;
use crate::primitives::MAX_CHAINING_PASSES;
use crate::{Candidate, Fact, LarderError, Recipe, RecipeId};
use std::collections::BTreeSet;

// =============================================================================
// CONSTRAINTS
// =============================================================================

/// How strictly the time budget is enforced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeLimit {
    /// `prep_time <= time_budget`.
    Strict,
    /// `prep_time <= time_budget * (1 + tolerance)`.
    Tolerant(f64),
}

/// How much of a recipe's ingredient list must be available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngredientCoverage {
    /// Every required ingredient is available.
    Complete,
    /// At least one required ingredient is available.
    AtLeastOne,
}

/// The constraint set the matching predicates are evaluated under.
///
/// The rule engine uses [`ConstraintSet::strict`]; the fallback resolver
/// re-runs the same rules with progressively relaxed sets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintSet {
    pub require_preferences: bool,
    pub time_limit: TimeLimit,
    pub ingredients: IngredientCoverage,
}

impl ConstraintSet {
    /// All constraints enforced exactly.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            require_preferences: true,
            time_limit: TimeLimit::Strict,
            ingredients: IngredientCoverage::Complete,
        }
    }

    /// Whether the recipe's ingredients are covered by the fact.
    #[must_use]
    pub fn ingredients_ok(&self, fact: &Fact, recipe: &Recipe) -> bool {
        let available = fact.available_ingredients();
        match self.ingredients {
            IngredientCoverage::Complete => recipe.required_ingredients.is_subset(available),
            IngredientCoverage::AtLeastOne => recipe
                .required_ingredients
                .iter()
                .any(|i| available.contains(i)),
        }
    }

    /// Whether the recipe fits in the time budget.
    #[must_use]
    pub fn time_ok(&self, fact: &Fact, recipe: &Recipe) -> bool {
        match self.time_limit {
            TimeLimit::Strict => recipe.prep_time <= fact.time_budget(),
            TimeLimit::Tolerant(tolerance) => {
                let limit = f64::from(fact.time_budget()) * (1.0 + tolerance.max(0.0));
                f64::from(recipe.prep_time) <= limit
            }
        }
    }

    /// Whether every stated preference tag is carried by the recipe.
    ///
    /// An empty preference set imposes no constraint.
    #[must_use]
    pub fn preferences_ok(&self, fact: &Fact, recipe: &Recipe) -> bool {
        !self.require_preferences || fact.preference_tags().is_subset(&recipe.tags)
    }
}

impl Default for ConstraintSet {
    fn default() -> Self {
        Self::strict()
    }
}

/// Count the constraint atoms a recipe satisfies.
///
/// One per available required ingredient, one for fitting the strict time
/// budget, one per stated preference tag the recipe carries.
#[must_use]
pub fn satisfied_constraint_count(fact: &Fact, recipe: &Recipe) -> u32 {
    let ingredients = recipe
        .required_ingredients
        .intersection(fact.available_ingredients())
        .count();
    let time = usize::from(recipe.prep_time <= fact.time_budget());
    let preferences = fact.preference_tags().intersection(&recipe.tags).count();

    u32::try_from(ingredients + time + preferences).unwrap_or(u32::MAX)
}

// =============================================================================
// WORKING MEMORY
// =============================================================================

/// A fact derived by a rule action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Derived {
    IngredientsSatisfied(RecipeId),
    TimeSatisfied(RecipeId),
    PreferencesSatisfied(RecipeId),
    Candidate(RecipeId),
}

/// The state rules are evaluated against during one pass.
///
/// The user fact and constraint set are borrowed; only `derived` grows, and
/// only between passes.
#[derive(Debug, Clone)]
pub struct WorkingMemory<'a> {
    pub fact: &'a Fact,
    pub constraints: &'a ConstraintSet,
    derived: BTreeSet<Derived>,
}

impl<'a> WorkingMemory<'a> {
    fn new(fact: &'a Fact, constraints: &'a ConstraintSet) -> Self {
        Self {
            fact,
            constraints,
            derived: BTreeSet::new(),
        }
    }

    /// Whether a fact has been derived.
    #[must_use]
    pub fn contains(&self, fact: &Derived) -> bool {
        self.derived.contains(fact)
    }

    /// Number of derived facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.derived.len()
    }

    /// Whether nothing has been derived yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.derived.is_empty()
    }
}

// =============================================================================
// RULES
// =============================================================================

/// A production rule: when `predicate` holds for a recipe, `action` derives a fact.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub predicate: fn(&WorkingMemory<'_>, &Recipe) -> bool,
    pub action: fn(RecipeId) -> Derived,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish_non_exhaustive()
    }
}

fn ingredients_available(memory: &WorkingMemory<'_>, recipe: &Recipe) -> bool {
    memory.constraints.ingredients_ok(memory.fact, recipe)
}

fn within_time_budget(memory: &WorkingMemory<'_>, recipe: &Recipe) -> bool {
    memory.constraints.time_ok(memory.fact, recipe)
}

fn preferences_met(memory: &WorkingMemory<'_>, recipe: &Recipe) -> bool {
    memory.constraints.preferences_ok(memory.fact, recipe)
}

fn all_constraints_derived(memory: &WorkingMemory<'_>, recipe: &Recipe) -> bool {
    memory.contains(&Derived::IngredientsSatisfied(recipe.id))
        && memory.contains(&Derived::TimeSatisfied(recipe.id))
        && memory.contains(&Derived::PreferencesSatisfied(recipe.id))
}

/// The built-in rule table, in evaluation order.
pub const BUILTIN_RULES: [Rule; 4] = [
    Rule {
        name: "ingredients-available",
        predicate: ingredients_available,
        action: Derived::IngredientsSatisfied,
    },
    Rule {
        name: "within-time-budget",
        predicate: within_time_budget,
        action: Derived::TimeSatisfied,
    },
    Rule {
        name: "preferences-met",
        predicate: preferences_met,
        action: Derived::PreferencesSatisfied,
    },
    Rule {
        name: "candidate",
        predicate: all_constraints_derived,
        action: Derived::Candidate,
    },
];

// =============================================================================
// ENGINE
// =============================================================================

/// Forward-chaining recipe matcher.
///
/// The engine holds no state between calls and never mutates the fact or the
/// catalog.
#[derive(Debug, Clone, Copy)]
pub struct RuleEngine {
    rules: &'static [Rule],
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    /// Create an engine with the built-in rule table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: &BUILTIN_RULES,
        }
    }

    /// The rules this engine evaluates, in order.
    #[must_use]
    pub fn rules(&self) -> &'static [Rule] {
        self.rules
    }

    /// Match the catalog against the fact under strict constraints.
    ///
    /// Returns candidates ascending by recipe id, or `LarderError::NoMatch`.
    pub fn infer(&self, fact: &Fact, catalog: &Catalog) -> Result<Vec<Candidate>, LarderError> {
        self.infer_with(fact, catalog, &ConstraintSet::strict())
    }

    /// Match the catalog against the fact under the given constraint set.
    pub fn infer_with(
        &self,
        fact: &Fact,
        catalog: &Catalog,
        constraints: &ConstraintSet,
    ) -> Result<Vec<Candidate>, LarderError> {
        let memory = self.run_to_fixed_point(fact, catalog, constraints);

        let candidates: Vec<Candidate> = catalog
            .iter()
            .filter(|recipe| memory.contains(&Derived::Candidate(recipe.id)))
            .map(|recipe| Candidate::new(recipe.clone(), satisfied_constraint_count(fact, recipe)))
            .collect();

        if candidates.is_empty() {
            Err(LarderError::NoMatch)
        } else {
            Ok(candidates)
        }
    }

    /// Run every rule until a pass derives nothing new.
    fn run_to_fixed_point<'a>(
        &self,
        fact: &'a Fact,
        catalog: &Catalog,
        constraints: &'a ConstraintSet,
    ) -> WorkingMemory<'a> {
        let mut memory = WorkingMemory::new(fact, constraints);

        for pass in 1..=MAX_CHAINING_PASSES {
            let mut fired = Vec::new();

            for rule in self.rules {
                for recipe in catalog.iter() {
                    let conclusion = (rule.action)(recipe.id);
                    if memory.contains(&conclusion) {
                        continue;
                    }
                    if (rule.predicate)(&memory, recipe) {
                        tracing::trace!(rule = rule.name, recipe = recipe.id.0, "rule fired");
                        fired.push(conclusion);
                    }
                }
            }

            if fired.is_empty() {
                tracing::debug!(passes = pass, derived = memory.len(), "fixed point reached");
                return memory;
            }
            memory.derived.extend(fired);
        }

        tracing::warn!(
            passes = MAX_CHAINING_PASSES,
            "forward chaining hit the pass limit before reaching a fixed point"
        );
        memory
    }
}

// =============================================================================
// TESTS
// =============================================================================
