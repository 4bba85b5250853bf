// ABOUTME: Builds, edits and rescales shopping lists from recipes and meal plans
// ABOUTME: All reads happen first, then every write of a request runs in one transaction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

use super::resolver::{RecipeGraph, ResolveOptions, ResolvedIngredient};
use super::visibility::Visibility;
use crate::auth::AuthResult;
use crate::database::meal_plans::validate_servings;
use crate::database::{
    Database, MealPlan, NewEntry, NewListRecipe, NewMealPlan, Recipe, ShoppingListEntry,
    ShoppingListRecipe, UpdateMealPlan,
};
use larder_core::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

/// Body of `PUT /api/recipe/{id}/shopping`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeShoppingRequest {
    /// Target servings
    #[serde(default)]
    pub servings: Option<f64>,
    /// Ingredients to keep; everything when absent
    #[serde(default)]
    pub ingredients: Option<Vec<Uuid>>,
    /// Existing list recipe to edit instead of creating one
    #[serde(default)]
    pub list_recipe: Option<Uuid>,
    /// Meal plan to link a new list recipe to
    #[serde(default)]
    pub mealplan: Option<Uuid>,
}

/// Body of `POST /api/shopping-list-entry`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualEntryRequest {
    /// Food to buy
    #[serde(default)]
    pub food: Option<Uuid>,
    /// Unit name
    #[serde(default)]
    pub unit: Option<String>,
    /// Amount to buy
    #[serde(default)]
    pub amount: f64,
    /// List recipe to attach the entry to
    #[serde(default)]
    pub list_recipe: Option<Uuid>,
}

/// Shopping list mutations performed on behalf of one caller
pub struct ShoppingListEditor<'a> {
    database: &'a Database,
    caller: AuthResult,
}

impl<'a> ShoppingListEditor<'a> {
    /// Create an editor for `caller`
    #[must_use]
    pub const fn new(database: &'a Database, caller: AuthResult) -> Self {
        Self { database, caller }
    }

    fn visibility(&self) -> Visibility<'a> {
        Visibility::new(self.database, self.caller)
    }

    async fn resolve_options(&self) -> AppResult<ResolveOptions> {
        let prefs = self.database.users().get_preference(self.caller.user_id).await?;
        Ok(ResolveOptions::from(&prefs))
    }

    async fn resolve(
        &self,
        recipe: &Recipe,
        servings: f64,
        options: ResolveOptions,
    ) -> AppResult<Vec<ResolvedIngredient>> {
        let graph =
            RecipeGraph::load(&self.database.recipes(), recipe, self.caller.user_id, options).await?;
        Ok(graph.resolve(servings, options))
    }

    async fn begin(&self) -> AppResult<sqlx::Transaction<'static, sqlx::Sqlite>> {
        self.database
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))
    }

    /// Add a recipe to the caller's shopping list, or edit a list generated from it
    ///
    /// # Errors
    ///
    /// Returns not found when the recipe, list recipe or meal plan is not
    /// visible, or the list recipe belongs to another recipe
    pub async fn apply_recipe(
        &self,
        recipe_id: Uuid,
        request: &RecipeShoppingRequest,
    ) -> AppResult<ShoppingListRecipe> {
        let recipe = self.visibility().recipe(recipe_id).await?;
        if let Some(servings) = request.servings {
            validate_servings(servings)?;
        }

        match request.list_recipe {
            Some(list_id) => {
                let list = self.visibility().list_recipe(list_id).await?;
                if list.recipe != Some(recipe.id) {
                    return Err(AppError::not_found(format!("Shopping list recipe {list_id}")));
                }
                self.edit_list(&recipe, list, request).await
            }
            None => {
                let mealplan = match request.mealplan {
                    Some(plan_id) => Some(self.visibility().meal_plan(plan_id).await?),
                    None => None,
                };
                let servings = request
                    .servings
                    .or_else(|| mealplan.as_ref().map(|plan| plan.servings))
                    .unwrap_or(recipe.servings);

                let options = self.resolve_options().await?;
                let resolved = self.resolve(&recipe, servings, options).await?;
                let keep = request.ingredients.as_deref();
                let items: Vec<_> = resolved
                    .into_iter()
                    .filter(|item| keep.is_none_or(|ids| ids.contains(&item.ingredient_id)))
                    .collect();

                let mut tx = self.begin().await?;
                let list = self
                    .write_list(&mut tx, &recipe, servings, mealplan.as_ref(), &items)
                    .await?;
                tx.commit()
                    .await
                    .map_err(|e| AppError::database(format!("Failed to commit shopping list: {e}")))?;
                Ok(list)
            }
        }
    }

    /// Rescale and/or narrow an existing list recipe
    async fn edit_list(
        &self,
        recipe: &Recipe,
        list: ShoppingListRecipe,
        request: &RecipeShoppingRequest,
    ) -> AppResult<ShoppingListRecipe> {
        let shopping = self.database.shopping();
        let servings = request.servings.unwrap_or(list.servings);
        let existing = shopping.entries_for_list_recipe(list.id).await?;

        let (to_delete, to_add) = match &request.ingredients {
            Some(keep) => {
                let keep: HashSet<Uuid> = keep.iter().copied().collect();
                let present: HashSet<Uuid> =
                    existing.iter().filter_map(|entry| entry.ingredient).collect();
                let to_delete: Vec<Uuid> = existing
                    .iter()
                    .filter(|entry| entry.ingredient.is_some_and(|id| !keep.contains(&id)))
                    .map(|entry| entry.id)
                    .collect();

                let options = self.resolve_options().await?;
                let to_add: Vec<ResolvedIngredient> = self
                    .resolve(recipe, servings, options)
                    .await?
                    .into_iter()
                    .filter(|item| {
                        keep.contains(&item.ingredient_id) && !present.contains(&item.ingredient_id)
                    })
                    .collect();
                (to_delete, to_add)
            }
            None => (Vec::new(), Vec::new()),
        };

        let mut tx = self.begin().await?;
        if (servings - list.servings).abs() > f64::EPSILON {
            shopping
                .rescale_list_recipe(&mut tx, list.id, servings, servings / list.servings)
                .await?;
        }
        for entry_id in &to_delete {
            shopping.delete_entry(&mut tx, *entry_id).await?;
        }
        for item in &to_add {
            shopping.insert_entry(&mut tx, &self.entry_for(&list, item)).await?;
        }
        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit shopping list: {e}")))?;

        info!(
            list_recipe.id = %list.id,
            user.id = %self.caller.user_id,
            servings,
            removed = to_delete.len(),
            added = to_add.len(),
            "Edited shopping list recipe"
        );
        Ok(ShoppingListRecipe { servings, ..list })
    }

    async fn write_list(
        &self,
        conn: &mut SqliteConnection,
        recipe: &Recipe,
        servings: f64,
        mealplan: Option<&MealPlan>,
        items: &[ResolvedIngredient],
    ) -> AppResult<ShoppingListRecipe> {
        let shopping = self.database.shopping();
        let name = mealplan
            .map(|plan| plan.title.as_str())
            .filter(|title| !title.is_empty())
            .unwrap_or(&recipe.name)
            .to_owned();

        let list = shopping
            .create_list_recipe(
                &mut *conn,
                &NewListRecipe {
                    space_id: self.caller.space_id,
                    name,
                    recipe: Some(recipe.id),
                    mealplan: mealplan.map(|plan| plan.id),
                    servings,
                    created_by: self.caller.user_id,
                },
            )
            .await?;

        for item in items {
            shopping.insert_entry(&mut *conn, &self.entry_for(&list, item)).await?;
        }

        info!(
            list_recipe.id = %list.id,
            recipe.id = %recipe.id,
            user.id = %self.caller.user_id,
            entries = items.len(),
            servings,
            "Added recipe to shopping list"
        );
        Ok(list)
    }

    /// Entries are owned by the list creator, whoever is editing the list
    fn entry_for(&self, list: &ShoppingListRecipe, item: &ResolvedIngredient) -> NewEntry {
        NewEntry {
            space_id: self.caller.space_id,
            list_recipe: Some(list.id),
            ingredient: Some(item.ingredient_id),
            food: item.food_id,
            unit: item.unit.clone(),
            amount: item.amount,
            created_by: list.created_by,
        }
    }

    /// Create a meal plan, adding its recipe to the list when the caller opted in
    ///
    /// # Errors
    ///
    /// Returns not found if the planned recipe is not visible
    pub async fn create_meal_plan(&self, request: &NewMealPlan) -> AppResult<MealPlan> {
        validate_servings(request.servings)?;
        let recipe = match request.recipe {
            Some(recipe_id) => Some(self.visibility().recipe(recipe_id).await?),
            None => None,
        };

        let prefs = self.database.users().get_preference(self.caller.user_id).await?;
        let items = match (&recipe, prefs.mealplan_autoadd_shopping) {
            (Some(recipe), true) => Some(
                self.resolve(recipe, request.servings, ResolveOptions::from(&prefs))
                    .await?,
            ),
            _ => None,
        };

        let mut tx = self.begin().await?;
        let plan = self
            .database
            .meal_plans()
            .create(&mut tx, self.caller.space_id, self.caller.user_id, request)
            .await?;
        if let (Some(recipe), Some(items)) = (&recipe, &items) {
            self.write_list(&mut tx, recipe, plan.servings, Some(&plan), items)
                .await?;
        }
        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit meal plan: {e}")))?;

        info!(mealplan.id = %plan.id, user.id = %self.caller.user_id, autoadd = items.is_some(), "Created meal plan");
        Ok(plan)
    }

    /// Update a meal plan; a servings change rescales its shopping list
    ///
    /// The list is scaled by `new / stored list servings`, so repeating the
    /// same update does not compound.
    ///
    /// # Errors
    ///
    /// Returns not found if the meal plan is not visible
    pub async fn update_meal_plan(
        &self,
        plan_id: Uuid,
        update: &UpdateMealPlan,
    ) -> AppResult<MealPlan> {
        let plan = self.visibility().meal_plan(plan_id).await?;
        let shopping = self.database.shopping();
        let list = shopping.list_recipe_for_mealplan(plan.id).await?;

        let mut tx = self.begin().await?;
        let updated = self
            .database
            .meal_plans()
            .update(&mut tx, &plan, update)
            .await?;
        if let Some(list) = list {
            if (updated.servings - list.servings).abs() > f64::EPSILON {
                shopping
                    .rescale_list_recipe(
                        &mut tx,
                        list.id,
                        updated.servings,
                        updated.servings / list.servings,
                    )
                    .await?;
            }
        }
        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit meal plan: {e}")))?;

        Ok(updated)
    }

    /// Delete a meal plan together with its shopping list
    ///
    /// # Errors
    ///
    /// Returns not found if the meal plan is not visible
    pub async fn delete_meal_plan(&self, plan_id: Uuid) -> AppResult<()> {
        let plan = self.visibility().meal_plan(plan_id).await?;
        self.database
            .meal_plans()
            .delete(plan.id, self.caller.space_id)
            .await?;
        info!(mealplan.id = %plan.id, user.id = %self.caller.user_id, "Deleted meal plan");
        Ok(())
    }

    /// Add a manual entry to the caller's list
    ///
    /// # Errors
    ///
    /// Returns not found if the food or list recipe is not visible
    pub async fn add_entry(&self, request: &ManualEntryRequest) -> AppResult<ShoppingListEntry> {
        if !request.amount.is_finite() || request.amount < 0.0 {
            return Err(AppError::invalid_input("amount must be a non-negative number"));
        }
        if let Some(food_id) = request.food {
            self.database
                .recipes()
                .get_food(food_id, self.caller.space_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Food {food_id}")))?;
        }
        if let Some(list_id) = request.list_recipe {
            self.visibility().list_recipe(list_id).await?;
        }

        self.database
            .shopping()
            .create_entry(&NewEntry {
                space_id: self.caller.space_id,
                list_recipe: request.list_recipe,
                ingredient: None,
                food: request.food,
                unit: request.unit.clone(),
                amount: request.amount,
                created_by: self.caller.user_id,
            })
            .await
    }
}
