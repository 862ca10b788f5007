//! # Catalog Module
//!
//! The validated, read-only recipe collection.
//!
//! - Loaded once at startup, shared behind an `Arc`
//! - Keyed by `RecipeId` in a `BTreeMap`, so iteration is ascending by id
//! - Malformed records abort initialisation with `InvalidCatalog`

use crate::{LarderError, Recipe, RecipeId};
use std::collections::BTreeMap;

/// Immutable recipe catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    recipes: BTreeMap<RecipeId, Recipe>,
}

impl Catalog {
    /// Build a catalog, validating every record.
    ///
    /// Ingredient and tag strings are normalised to trimmed lowercase so that
    /// records loaded from files compare equal to user input.
    ///
    /// Returns `LarderError::InvalidCatalog` if:
    /// - a recipe has an empty name
    /// - a recipe has no required ingredients
    /// - a recipe has a zero preparation time
    /// - two recipes share an id
    pub fn new(recipes: impl IntoIterator<Item = Recipe>) -> Result<Self, LarderError> {
        let mut map = BTreeMap::new();

        for recipe in recipes {
            let recipe = normalize(recipe);
            validate(&recipe)?;

            let id = recipe.id;
            if map.insert(id, recipe).is_some() {
                return Err(LarderError::InvalidCatalog(format!(
                    "duplicate recipe id {}",
                    id
                )));
            }
        }

        Ok(Self { recipes: map })
    }

    /// Look up a recipe by id.
    #[must_use]
    pub fn get(&self, id: RecipeId) -> Option<&Recipe> {
        self.recipes.get(&id)
    }

    /// Iterate recipes in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values()
    }

    /// Number of recipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    /// Whether the catalog holds no recipes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

fn normalize(mut recipe: Recipe) -> Recipe {
    recipe.required_ingredients = recipe
        .required_ingredients
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    recipe.tags = recipe
        .tags
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    recipe
}

fn validate(recipe: &Recipe) -> Result<(), LarderError> {
    if recipe.name.trim().is_empty() {
        return Err(LarderError::InvalidCatalog(format!(
            "recipe {} has an empty name",
            recipe.id
        )));
    }
    if recipe.required_ingredients.is_empty() {
        return Err(LarderError::InvalidCatalog(format!(
            "recipe {} has no required ingredients",
            recipe.id
        )));
    }
    if recipe.prep_time == 0 {
        return Err(LarderError::InvalidCatalog(format!(
            "recipe {} has a zero preparation time",
            recipe.id
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
