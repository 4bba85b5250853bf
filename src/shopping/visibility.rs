// ABOUTME: Access gate for shopping list objects, meal plans and recipes
// ABOUTME: Anything the caller may not see is reported as not found
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

//! Shopping list visibility
//!
//! A shopping list entry, list recipe or meal plan is visible to its creator
//! and to every user listed in the creator's `shopping_share`. The rule is
//! evaluated at read time inside the queries, so sharing a list exposes
//! entries that existed before the share was added.

use crate::auth::AuthResult;
use crate::database::{Database, MealPlan, Recipe, ShoppingListEntry, ShoppingListRecipe};
use larder_core::errors::{AppError, AppResult};
use uuid::Uuid;

/// Visibility checks bound to one caller
pub struct Visibility<'a> {
    database: &'a Database,
    caller: AuthResult,
}

impl<'a> Visibility<'a> {
    /// Create a gate for `caller`
    #[must_use]
    pub const fn new(database: &'a Database, caller: AuthResult) -> Self {
        Self { database, caller }
    }

    /// A recipe in the caller's space that is public, theirs, or shared with them
    ///
    /// # Errors
    ///
    /// Returns not found if the recipe is not visible
    pub async fn recipe(&self, recipe_id: Uuid) -> AppResult<Recipe> {
        self.database
            .recipes()
            .get_visible_recipe(recipe_id, self.caller.user_id, self.caller.space_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Recipe {recipe_id}")))
    }

    /// A shopping list entry the caller may view and mutate
    ///
    /// # Errors
    ///
    /// Returns not found if the entry is not visible
    pub async fn entry(&self, entry_id: Uuid) -> AppResult<ShoppingListEntry> {
        self.database
            .shopping()
            .get_entry(entry_id, self.caller.user_id, self.caller.space_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Shopping list entry {entry_id}")))
    }

    /// A list recipe the caller may view and mutate
    ///
    /// # Errors
    ///
    /// Returns not found if the list recipe is not visible
    pub async fn list_recipe(&self, list_id: Uuid) -> AppResult<ShoppingListRecipe> {
        self.database
            .shopping()
            .get_list_recipe(list_id, self.caller.user_id, self.caller.space_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Shopping list recipe {list_id}")))
    }

    /// A meal plan the caller may view and mutate
    ///
    /// # Errors
    ///
    /// Returns not found if the meal plan is not visible
    pub async fn meal_plan(&self, plan_id: Uuid) -> AppResult<MealPlan> {
        self.database
            .meal_plans()
            .get(plan_id, self.caller.user_id, self.caller.space_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Meal plan {plan_id}")))
    }
}
