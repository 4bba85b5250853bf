// ABOUTME: Imports recipes from JSON documents into a space
// ABOUTME: Used by the admin CLI since the HTTP API has no recipe authoring endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

use crate::database::{Database, NewFood, NewIngredient, NewRecipe, NewStep, Recipe, User};
use larder_core::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// A recipe as written in an import file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDocument {
    /// Recipe name
    pub name: String,
    /// Servings the amounts are written for
    pub servings: f64,
    /// Hide from other members of the space
    #[serde(default)]
    pub private: bool,
    /// Steps in order
    #[serde(default)]
    pub steps: Vec<StepDocument>,
}

/// One step of a [`RecipeDocument`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepDocument {
    /// Free-text instruction
    #[serde(default)]
    pub instruction: String,
    /// Existing recipe embedded in this step
    #[serde(default)]
    pub step_recipe: Option<Uuid>,
    /// Ingredients in order
    #[serde(default)]
    pub ingredients: Vec<IngredientDocument>,
}

/// One ingredient of a [`StepDocument`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngredientDocument {
    /// Food name; created in the space when unknown
    #[serde(default)]
    pub food: Option<String>,
    /// Existing recipe that produces the food, applied when the food is new
    #[serde(default)]
    pub food_recipe: Option<Uuid>,
    /// Unit name
    #[serde(default)]
    pub unit: Option<String>,
    /// Amount
    #[serde(default)]
    pub amount: f64,
    /// Free-text note
    #[serde(default)]
    pub note: Option<String>,
    /// Section header
    #[serde(default)]
    pub header: bool,
    /// Amount is meaningless
    #[serde(default)]
    pub no_amount: bool,
}

/// Create the recipe described by `document`, authored by `author`
///
/// # Errors
///
/// Returns an error if the document is invalid or any insert fails
pub async fn import_recipe(
    database: &Database,
    author: &User,
    document: &RecipeDocument,
) -> AppResult<Recipe> {
    if document.name.trim().is_empty() {
        return Err(AppError::invalid_input("Recipe name is required"));
    }

    let recipes = database.recipes();
    let recipe = recipes
        .create_recipe(
            author.space_id,
            author.id,
            &NewRecipe {
                name: document.name.clone(),
                servings: document.servings,
                private: document.private,
            },
        )
        .await?;

    let mut ingredient_count = 0usize;
    for step_doc in &document.steps {
        let step = recipes
            .add_step(
                &recipe,
                &NewStep {
                    instruction: step_doc.instruction.clone(),
                    step_recipe_id: step_doc.step_recipe,
                },
            )
            .await?;

        for ingredient in &step_doc.ingredients {
            let food_id = match &ingredient.food {
                Some(name) if ingredient.food_recipe.is_some() => Some(
                    recipes
                        .create_food(
                            author.space_id,
                            &NewFood {
                                name: name.clone(),
                                ignore_shopping: false,
                                recipe_id: ingredient.food_recipe,
                            },
                        )
                        .await?
                        .id,
                ),
                Some(name) => Some(recipes.find_or_create_food(author.space_id, name).await?.id),
                None => None,
            };

            recipes
                .add_ingredient(
                    &step,
                    &NewIngredient {
                        food_id,
                        unit: ingredient.unit.clone(),
                        amount: ingredient.amount,
                        note: ingredient.note.clone(),
                        is_header: ingredient.header,
                        no_amount: ingredient.no_amount,
                    },
                )
                .await?;
            ingredient_count += 1;
        }
    }

    info!(
        recipe.id = %recipe.id,
        user.id = %author.id,
        steps = document.steps.len(),
        ingredients = ingredient_count,
        "Imported recipe"
    );
    Ok(recipe)
}
