// ABOUTME: Database operations for recipes, steps, ingredients and foods
// ABOUTME: Includes the recipe visibility query and the ingredient rows used for shopping lists
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

use super::users::conflict_or_database;
use super::{parse_optional_uuid, parse_timestamp, parse_uuid, timestamp};
use chrono::{DateTime, Utc};
use larder_core::errors::{AppError, AppResult, ErrorCode};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

/// A food that ingredients and shopping entries refer to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Food {
    /// Unique identifier
    pub id: Uuid,
    /// Owning space
    pub space_id: Uuid,
    /// Name, unique within the space
    pub name: String,
    /// Never put this food on a shopping list
    pub ignore_shopping: bool,
    /// Recipe that produces this food
    pub recipe_id: Option<Uuid>,
}

/// Input for [`RecipesManager::create_food`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewFood {
    /// Name, unique within the space
    pub name: String,
    /// Never put this food on a shopping list
    #[serde(default)]
    pub ignore_shopping: bool,
    /// Recipe that produces this food
    #[serde(default)]
    pub recipe_id: Option<Uuid>,
}

/// A recipe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    /// Unique identifier
    pub id: Uuid,
    /// Owning space
    pub space_id: Uuid,
    /// Display name
    pub name: String,
    /// Number of servings the ingredient amounts are written for
    pub servings: f64,
    /// Hidden from everyone except the author and explicit shares
    pub private: bool,
    /// Author
    pub created_by: Uuid,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Input for [`RecipesManager::create_recipe`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecipe {
    /// Display name
    pub name: String,
    /// Servings the amounts are written for, must be positive
    pub servings: f64,
    /// Hide from other members of the space
    #[serde(default)]
    pub private: bool,
}

/// One step of a recipe, optionally embedding another recipe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    /// Unique identifier
    pub id: Uuid,
    /// Recipe this step belongs to
    pub recipe_id: Uuid,
    /// Zero-based order within the recipe
    pub position: i64,
    /// Free-text instruction
    pub instruction: String,
    /// Sub-recipe prepared as part of this step
    pub step_recipe_id: Option<Uuid>,
}

/// Input for [`RecipesManager::add_step`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewStep {
    /// Free-text instruction
    #[serde(default)]
    pub instruction: String,
    /// Sub-recipe prepared as part of this step
    #[serde(default)]
    pub step_recipe_id: Option<Uuid>,
}

/// An ingredient line of a step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    /// Unique identifier
    pub id: Uuid,
    /// Step this ingredient belongs to
    pub step_id: Uuid,
    /// Food, absent for free-text lines
    pub food_id: Option<Uuid>,
    /// Unit name
    pub unit: Option<String>,
    /// Amount for the recipe's servings
    pub amount: f64,
    /// Free-text note
    pub note: Option<String>,
    /// Section header rather than a real ingredient
    pub is_header: bool,
    /// Amount is meaningless ("salt to taste")
    pub no_amount: bool,
    /// Zero-based order within the step
    pub position: i64,
}

/// Input for [`RecipesManager::add_ingredient`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewIngredient {
    /// Food
    #[serde(default)]
    pub food_id: Option<Uuid>,
    /// Unit name
    #[serde(default)]
    pub unit: Option<String>,
    /// Amount for the recipe's servings
    #[serde(default)]
    pub amount: f64,
    /// Free-text note
    #[serde(default)]
    pub note: Option<String>,
    /// Section header
    #[serde(default)]
    pub is_header: bool,
    /// Amount is meaningless
    #[serde(default)]
    pub no_amount: bool,
}

/// Ingredient joined with everything shopping list resolution needs
#[derive(Debug, Clone, PartialEq)]
pub struct IngredientLine {
    /// Ingredient ID
    pub id: Uuid,
    /// Step the ingredient belongs to
    pub step_id: Uuid,
    /// Food
    pub food_id: Option<Uuid>,
    /// Unit name
    pub unit: Option<String>,
    /// Amount for the owning recipe's servings
    pub amount: f64,
    /// Section header
    pub is_header: bool,
    /// Amount is meaningless
    pub no_amount: bool,
    /// Food is excluded from shopping lists
    pub ignore_shopping: bool,
    /// Recipe producing the food
    pub food_recipe_id: Option<Uuid>,
    /// Food is on hand for the requesting user
    pub on_hand: bool,
}

/// Recipe database operations manager
pub struct RecipesManager {
    pool: SqlitePool,
}

impl RecipesManager {
    /// Create a new recipes manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a food
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken, the food recipe is in another
    /// space, or the insert fails
    pub async fn create_food(&self, space_id: Uuid, request: &NewFood) -> AppResult<Food> {
        if let Some(recipe_id) = request.recipe_id {
            if self.get_recipe(recipe_id, space_id).await?.is_none() {
                return Err(AppError::not_found(format!("Recipe {recipe_id}")));
            }
        }

        let food = Food {
            id: Uuid::new_v4(),
            space_id,
            name: request.name.trim().to_owned(),
            ignore_shopping: request.ignore_shopping,
            recipe_id: request.recipe_id,
        };

        sqlx::query(
            r"
            INSERT INTO foods (id, space_id, name, ignore_shopping, recipe_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(food.id.to_string())
        .bind(space_id.to_string())
        .bind(&food.name)
        .bind(food.ignore_shopping)
        .bind(food.recipe_id.map(|id| id.to_string()))
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, format!("Food '{}'", food.name)))?;

        Ok(food)
    }

    /// Get a food by ID within a space
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_food(&self, food_id: Uuid, space_id: Uuid) -> AppResult<Option<Food>> {
        let row = sqlx::query(
            "SELECT id, space_id, name, ignore_shopping, recipe_id FROM foods WHERE id = $1 AND space_id = $2",
        )
        .bind(food_id.to_string())
        .bind(space_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get food: {e}")))?;

        row.as_ref().map(row_to_food).transpose()
    }

    /// Look a food up by name, creating it when missing
    ///
    /// # Errors
    ///
    /// Returns an error if the query or insert fails
    pub async fn find_or_create_food(&self, space_id: Uuid, name: &str) -> AppResult<Food> {
        let row = sqlx::query(
            "SELECT id, space_id, name, ignore_shopping, recipe_id FROM foods WHERE space_id = $1 AND name = $2",
        )
        .bind(space_id.to_string())
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to find food: {e}")))?;

        match row {
            Some(row) => row_to_food(&row),
            None => {
                self.create_food(
                    space_id,
                    &NewFood {
                        name: name.to_owned(),
                        ..NewFood::default()
                    },
                )
                .await
            }
        }
    }

    /// Create a recipe
    ///
    /// # Errors
    ///
    /// Returns an error if servings are not positive or the insert fails
    pub async fn create_recipe(
        &self,
        space_id: Uuid,
        created_by: Uuid,
        request: &NewRecipe,
    ) -> AppResult<Recipe> {
        if request.servings.is_nan() || request.servings <= 0.0 {
            return Err(AppError::new(
                ErrorCode::ValueOutOfRange,
                "Recipe servings must be positive",
            ));
        }

        let recipe = Recipe {
            id: Uuid::new_v4(),
            space_id,
            name: request.name.clone(),
            servings: request.servings,
            private: request.private,
            created_by,
            created_at: Utc::now(),
        };

        sqlx::query(
            r"
            INSERT INTO recipes (id, space_id, name, servings, private, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(recipe.id.to_string())
        .bind(space_id.to_string())
        .bind(&recipe.name)
        .bind(recipe.servings)
        .bind(recipe.private)
        .bind(created_by.to_string())
        .bind(timestamp(recipe.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create recipe: {e}")))?;

        debug!(recipe.id = %recipe.id, space.id = %space_id, "Created recipe");
        Ok(recipe)
    }

    /// Get a recipe by ID within a space, ignoring privacy
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_recipe(&self, recipe_id: Uuid, space_id: Uuid) -> AppResult<Option<Recipe>> {
        let row = sqlx::query(
            r"
            SELECT id, space_id, name, servings, private, created_by, created_at
            FROM recipes
            WHERE id = $1 AND space_id = $2
            ",
        )
        .bind(recipe_id.to_string())
        .bind(space_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get recipe: {e}")))?;

        row.as_ref().map(row_to_recipe).transpose()
    }

    /// Get a recipe only if `user_id` may view it
    ///
    /// A recipe is visible inside its space when it is public, authored by
    /// the user, or explicitly shared with them.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_visible_recipe(
        &self,
        recipe_id: Uuid,
        user_id: Uuid,
        space_id: Uuid,
    ) -> AppResult<Option<Recipe>> {
        let row = sqlx::query(
            r"
            SELECT r.id, r.space_id, r.name, r.servings, r.private, r.created_by, r.created_at
            FROM recipes r
            WHERE r.id = $1
              AND r.space_id = $2
              AND (
                  r.private = 0
                  OR r.created_by = $3
                  OR EXISTS (
                      SELECT 1 FROM recipe_shared s
                      WHERE s.recipe_id = r.id AND s.user_id = $3
                  )
              )
            ",
        )
        .bind(recipe_id.to_string())
        .bind(space_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get recipe: {e}")))?;

        row.as_ref().map(row_to_recipe).transpose()
    }

    /// Share a private recipe with another user
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails
    pub async fn share_recipe(&self, recipe_id: Uuid, user_id: Uuid) -> AppResult<()> {
        sqlx::query("INSERT OR IGNORE INTO recipe_shared (recipe_id, user_id) VALUES ($1, $2)")
            .bind(recipe_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to share recipe: {e}")))?;
        Ok(())
    }

    /// Append a step to a recipe
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded recipe lives in another space or the insert fails
    pub async fn add_step(&self, recipe: &Recipe, request: &NewStep) -> AppResult<Step> {
        if let Some(step_recipe_id) = request.step_recipe_id {
            if self.get_recipe(step_recipe_id, recipe.space_id).await?.is_none() {
                return Err(AppError::not_found(format!("Recipe {step_recipe_id}")));
            }
        }

        let position: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM steps WHERE recipe_id = $1")
                .bind(recipe.id.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to count steps: {e}")))?;

        let step = Step {
            id: Uuid::new_v4(),
            recipe_id: recipe.id,
            position,
            instruction: request.instruction.clone(),
            step_recipe_id: request.step_recipe_id,
        };

        sqlx::query(
            r"
            INSERT INTO steps (id, recipe_id, position, instruction, step_recipe_id)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(step.id.to_string())
        .bind(recipe.id.to_string())
        .bind(step.position)
        .bind(&step.instruction)
        .bind(step.step_recipe_id.map(|id| id.to_string()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create step: {e}")))?;

        Ok(step)
    }

    /// Append an ingredient to a step
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn add_ingredient(
        &self,
        step: &Step,
        request: &NewIngredient,
    ) -> AppResult<Ingredient> {
        let position: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ingredients WHERE step_id = $1")
                .bind(step.id.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to count ingredients: {e}")))?;

        let ingredient = Ingredient {
            id: Uuid::new_v4(),
            step_id: step.id,
            food_id: request.food_id,
            unit: request.unit.clone(),
            amount: request.amount,
            note: request.note.clone(),
            is_header: request.is_header,
            no_amount: request.no_amount,
            position,
        };

        sqlx::query(
            r"
            INSERT INTO ingredients (id, step_id, food_id, unit, amount, note, is_header, no_amount, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(ingredient.id.to_string())
        .bind(step.id.to_string())
        .bind(ingredient.food_id.map(|id| id.to_string()))
        .bind(&ingredient.unit)
        .bind(ingredient.amount)
        .bind(&ingredient.note)
        .bind(ingredient.is_header)
        .bind(ingredient.no_amount)
        .bind(ingredient.position)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create ingredient: {e}")))?;

        Ok(ingredient)
    }

    /// Steps of a recipe in order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn steps(&self, recipe_id: Uuid) -> AppResult<Vec<Step>> {
        let rows = sqlx::query(
            r"
            SELECT id, recipe_id, position, instruction, step_recipe_id
            FROM steps
            WHERE recipe_id = $1
            ORDER BY position
            ",
        )
        .bind(recipe_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list steps: {e}")))?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let recipe_id: String = row.get("recipe_id");
                Ok(Step {
                    id: parse_uuid(&id)?,
                    recipe_id: parse_uuid(&recipe_id)?,
                    position: row.get("position"),
                    instruction: row.get("instruction"),
                    step_recipe_id: parse_optional_uuid(row.get("step_recipe_id"))?,
                })
            })
            .collect()
    }

    /// All ingredient lines of a recipe in step then position order
    ///
    /// `on_hand` is evaluated for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn ingredient_lines(
        &self,
        recipe_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<IngredientLine>> {
        let rows = sqlx::query(
            r"
            SELECT i.id, i.step_id, i.food_id, i.unit, i.amount, i.is_header, i.no_amount,
                   COALESCE(f.ignore_shopping, 0) AS ignore_shopping,
                   f.recipe_id AS food_recipe_id,
                   EXISTS (
                       SELECT 1 FROM food_onhand o
                       WHERE o.food_id = i.food_id AND o.user_id = $2
                   ) AS on_hand
            FROM ingredients i
            JOIN steps s ON s.id = i.step_id
            LEFT JOIN foods f ON f.id = i.food_id
            WHERE s.recipe_id = $1
            ORDER BY s.position, i.position
            ",
        )
        .bind(recipe_id.to_string())
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list ingredients: {e}")))?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let step_id: String = row.get("step_id");
                Ok(IngredientLine {
                    id: parse_uuid(&id)?,
                    step_id: parse_uuid(&step_id)?,
                    food_id: parse_optional_uuid(row.get("food_id"))?,
                    unit: row.get("unit"),
                    amount: row.get("amount"),
                    is_header: row.get::<i64, _>("is_header") == 1,
                    no_amount: row.get::<i64, _>("no_amount") == 1,
                    ignore_shopping: row.get::<i64, _>("ignore_shopping") == 1,
                    food_recipe_id: parse_optional_uuid(row.get("food_recipe_id"))?,
                    on_hand: row.get::<i64, _>("on_hand") == 1,
                })
            })
            .collect()
    }
}

fn row_to_food(row: &SqliteRow) -> AppResult<Food> {
    let id: String = row.get("id");
    let space_id: String = row.get("space_id");
    Ok(Food {
        id: parse_uuid(&id)?,
        space_id: parse_uuid(&space_id)?,
        name: row.get("name"),
        ignore_shopping: row.get::<i64, _>("ignore_shopping") == 1,
        recipe_id: parse_optional_uuid(row.get("recipe_id"))?,
    })
}

fn row_to_recipe(row: &SqliteRow) -> AppResult<Recipe> {
    let id: String = row.get("id");
    let space_id: String = row.get("space_id");
    let created_by: String = row.get("created_by");
    let created_at: String = row.get("created_at");
    Ok(Recipe {
        id: parse_uuid(&id)?,
        space_id: parse_uuid(&space_id)?,
        name: row.get("name"),
        servings: row.get("servings"),
        private: row.get::<i64, _>("private") == 1,
        created_by: parse_uuid(&created_by)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::create_test_db;

    #[tokio::test]
    async fn test_private_recipe_visibility() {
        let db = create_test_db().await.unwrap();
        let users = db.users();
        let space = users.create_space("Kitchen").await.unwrap();
        let author = users.create_user(space.id, "author", None).await.unwrap();
        let friend = users.create_user(space.id, "friend", None).await.unwrap();

        let recipes = db.recipes();
        let recipe = recipes
            .create_recipe(
                space.id,
                author.id,
                &NewRecipe {
                    name: "Secret stew".into(),
                    servings: 4.0,
                    private: true,
                },
            )
            .await
            .unwrap();

        assert!(recipes
            .get_visible_recipe(recipe.id, author.id, space.id)
            .await
            .unwrap()
            .is_some());
        assert!(recipes
            .get_visible_recipe(recipe.id, friend.id, space.id)
            .await
            .unwrap()
            .is_none());

        recipes.share_recipe(recipe.id, friend.id).await.unwrap();
        assert!(recipes
            .get_visible_recipe(recipe.id, friend.id, space.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_rejects_non_positive_servings() {
        let db = create_test_db().await.unwrap();
        let space = db.users().create_space("Kitchen").await.unwrap();
        let user = db.users().create_user(space.id, "cook", None).await.unwrap();

        let err = db
            .recipes()
            .create_recipe(
                space.id,
                user.id,
                &NewRecipe {
                    name: "Nothing".into(),
                    servings: 0.0,
                    private: false,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValueOutOfRange);
    }

    #[tokio::test]
    async fn test_ingredient_lines_follow_step_order() {
        let db = create_test_db().await.unwrap();
        let space = db.users().create_space("Kitchen").await.unwrap();
        let user = db.users().create_user(space.id, "cook", None).await.unwrap();
        let recipes = db.recipes();
        let recipe = recipes
            .create_recipe(
                space.id,
                user.id,
                &NewRecipe {
                    name: "Toast".into(),
                    servings: 1.0,
                    private: false,
                },
            )
            .await
            .unwrap();
        let bread = recipes.find_or_create_food(space.id, "bread").await.unwrap();
        let butter = recipes.find_or_create_food(space.id, "butter").await.unwrap();

        let first = recipes.add_step(&recipe, &NewStep::default()).await.unwrap();
        let second = recipes.add_step(&recipe, &NewStep::default()).await.unwrap();
        recipes
            .add_ingredient(
                &second,
                &NewIngredient {
                    food_id: Some(butter.id),
                    amount: 10.0,
                    ..NewIngredient::default()
                },
            )
            .await
            .unwrap();
        recipes
            .add_ingredient(
                &first,
                &NewIngredient {
                    food_id: Some(bread.id),
                    amount: 2.0,
                    ..NewIngredient::default()
                },
            )
            .await
            .unwrap();
        db.users().set_food_onhand(butter.id, user.id, true).await.unwrap();

        let lines = recipes.ingredient_lines(recipe.id, user.id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].food_id, Some(bread.id));
        assert!(!lines[0].on_hand);
        assert_eq!(lines[1].food_id, Some(butter.id));
        assert!(lines[1].on_hand);
    }
}
