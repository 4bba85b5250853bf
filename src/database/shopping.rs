// ABOUTME: Database operations for shopping list recipes and shopping list entries
// ABOUTME: Every read applies the share-list visibility rule for the requesting user
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

use super::meal_plans::validate_servings;
use super::{parse_optional_uuid, parse_timestamp, parse_uuid, timestamp};
use chrono::{DateTime, Duration, Utc};
use larder_core::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Rows created by `$N` are visible to `$N` and everyone whose share list contains `$N`
macro_rules! visible_to {
    ($alias:literal, $param:literal) => {
        concat!(
            "(",
            $alias,
            ".created_by = ",
            $param,
            " OR ",
            $alias,
            ".created_by IN (SELECT user_id FROM user_shopping_share WHERE shared_with_id = ",
            $param,
            "))"
        )
    };
}

const ENTRY_SELECT: &str = r"
    SELECT e.id, e.list_recipe_id, e.ingredient_id, e.food_id, f.name AS food_name,
           e.unit, e.amount, e.checked, e.completed_at, e.created_at,
           e.created_by, u.username, u.display_name,
           lr.name AS list_name, lr.recipe_id AS list_recipe, lr.mealplan_id AS list_mealplan,
           lr.servings AS list_servings
    FROM shopping_list_entries e
    JOIN users u ON u.id = e.created_by
    LEFT JOIN foods f ON f.id = e.food_id
    LEFT JOIN shopping_list_recipes lr ON lr.id = e.list_recipe_id
";

const LIST_RECIPE_SELECT: &str = r"
    SELECT lr.id, lr.space_id, lr.name, lr.recipe_id, lr.mealplan_id, lr.servings,
           lr.created_by, lr.created_at
    FROM shopping_list_recipes lr
";

/// Grouping of entries generated together from one recipe or meal plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShoppingListRecipe {
    /// Unique identifier
    pub id: Uuid,
    /// Owning space
    #[serde(skip_serializing, default)]
    pub space_id: Uuid,
    /// Display name, taken from the recipe or meal plan
    pub name: String,
    /// Source recipe
    pub recipe: Option<Uuid>,
    /// Source meal plan
    pub mealplan: Option<Uuid>,
    /// Servings the entry amounts are currently scaled to
    pub servings: f64,
    /// Creator
    pub created_by: Uuid,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Input for [`ShoppingManager::create_list_recipe`]
#[derive(Debug, Clone)]
pub struct NewListRecipe {
    /// Owning space
    pub space_id: Uuid,
    /// Display name
    pub name: String,
    /// Source recipe
    pub recipe: Option<Uuid>,
    /// Source meal plan
    pub mealplan: Option<Uuid>,
    /// Servings the entries are generated for
    pub servings: f64,
    /// Creator
    pub created_by: Uuid,
}

/// Food summary embedded in an entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FoodRef {
    /// Food ID
    pub id: Uuid,
    /// Food name
    pub name: String,
}

/// Creator summary embedded in an entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRef {
    /// User ID
    pub id: Uuid,
    /// Login name
    pub username: String,
    /// Human-friendly name
    pub display_name: Option<String>,
}

/// List recipe summary embedded in an entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListRecipeRef {
    /// List recipe ID
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Source recipe
    pub recipe: Option<Uuid>,
    /// Source meal plan
    pub mealplan: Option<Uuid>,
    /// Current servings
    pub servings: f64,
}

/// One line of a shopping list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShoppingListEntry {
    /// Unique identifier
    pub id: Uuid,
    /// Owning list recipe, absent for manual entries
    pub list_recipe: Option<Uuid>,
    /// Source ingredient
    pub ingredient: Option<Uuid>,
    /// Food to buy
    pub food: Option<FoodRef>,
    /// Unit name
    pub unit: Option<String>,
    /// Amount to buy
    pub amount: f64,
    /// Bought
    pub checked: bool,
    /// When the entry was checked
    pub completed_at: Option<DateTime<Utc>>,
    /// Creator
    pub created_by: UserRef,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Owning list recipe details
    pub recipe_mealplan: Option<ListRecipeRef>,
}

/// Input for inserting an entry
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// Owning space
    pub space_id: Uuid,
    /// Owning list recipe
    pub list_recipe: Option<Uuid>,
    /// Source ingredient
    pub ingredient: Option<Uuid>,
    /// Food to buy
    pub food: Option<Uuid>,
    /// Unit name
    pub unit: Option<String>,
    /// Amount to buy
    pub amount: f64,
    /// Creator
    pub created_by: Uuid,
}

/// Partial entry update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEntry {
    /// New amount
    pub amount: Option<f64>,
    /// New unit
    pub unit: Option<String>,
    /// Check or uncheck
    pub checked: Option<bool>,
}

/// Which entries to return based on their checked state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckedFilter {
    /// Unchecked only
    False,
    /// Checked only
    True,
    /// Everything
    Both,
    /// Unchecked plus recently checked
    #[default]
    Recent,
}

impl CheckedFilter {
    /// Parse a `checked` query value, falling back to [`CheckedFilter::Recent`]
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "false" | "0" => Self::False,
            "true" | "1" => Self::True,
            "both" => Self::Both,
            _ => Self::Recent,
        }
    }
}

impl fmt::Display for CheckedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::False => "false",
            Self::True => "true",
            Self::Both => "both",
            Self::Recent => "recent",
        };
        f.write_str(s)
    }
}

/// Entry list filter
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryFilter {
    /// Checked state filter
    pub checked: CheckedFilter,
    /// Restrict to one list recipe
    pub list_recipe: Option<Uuid>,
    /// Window for [`CheckedFilter::Recent`]
    pub recent_days: i64,
}

/// Shopping list database operations manager
pub struct ShoppingManager {
    pool: SqlitePool,
}

impl ShoppingManager {
    /// Create a new shopping manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a list recipe on the given connection
    ///
    /// # Errors
    ///
    /// Returns an error if servings are not positive or the insert fails
    pub async fn create_list_recipe(
        &self,
        conn: &mut SqliteConnection,
        request: &NewListRecipe,
    ) -> AppResult<ShoppingListRecipe> {
        validate_servings(request.servings)?;

        let list = ShoppingListRecipe {
            id: Uuid::new_v4(),
            space_id: request.space_id,
            name: request.name.clone(),
            recipe: request.recipe,
            mealplan: request.mealplan,
            servings: request.servings,
            created_by: request.created_by,
            created_at: Utc::now(),
        };

        sqlx::query(
            r"
            INSERT INTO shopping_list_recipes
                (id, space_id, name, recipe_id, mealplan_id, servings, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(list.id.to_string())
        .bind(list.space_id.to_string())
        .bind(&list.name)
        .bind(list.recipe.map(|id| id.to_string()))
        .bind(list.mealplan.map(|id| id.to_string()))
        .bind(list.servings)
        .bind(list.created_by.to_string())
        .bind(timestamp(list.created_at))
        .execute(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to create shopping list recipe: {e}")))?;

        Ok(list)
    }

    /// Get a list recipe visible to `viewer`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_list_recipe(
        &self,
        list_id: Uuid,
        viewer: Uuid,
        space_id: Uuid,
    ) -> AppResult<Option<ShoppingListRecipe>> {
        let sql = format!(
            "{LIST_RECIPE_SELECT} WHERE lr.id = $1 AND lr.space_id = $2 AND {}",
            visible_to!("lr", "$3")
        );
        let row = sqlx::query(&sql)
            .bind(list_id.to_string())
            .bind(space_id.to_string())
            .bind(viewer.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get shopping list recipe: {e}")))?;

        row.as_ref().map(row_to_list_recipe).transpose()
    }

    /// List recipes visible to `viewer`, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_list_recipes(
        &self,
        viewer: Uuid,
        space_id: Uuid,
    ) -> AppResult<Vec<ShoppingListRecipe>> {
        let sql = format!(
            "{LIST_RECIPE_SELECT} WHERE lr.space_id = $1 AND {} ORDER BY lr.created_at, lr.rowid",
            visible_to!("lr", "$2")
        );
        let rows = sqlx::query(&sql)
            .bind(space_id.to_string())
            .bind(viewer.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list shopping list recipes: {e}")))?;

        rows.iter().map(row_to_list_recipe).collect()
    }

    /// The list recipe generated for a meal plan, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_recipe_for_mealplan(
        &self,
        mealplan_id: Uuid,
    ) -> AppResult<Option<ShoppingListRecipe>> {
        let sql = format!("{LIST_RECIPE_SELECT} WHERE lr.mealplan_id = $1 ORDER BY lr.rowid LIMIT 1");
        let row = sqlx::query(&sql)
            .bind(mealplan_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get meal plan list recipe: {e}")))?;

        row.as_ref().map(row_to_list_recipe).transpose()
    }

    /// Multiply every entry of a list recipe by `factor` and store the new servings
    ///
    /// # Errors
    ///
    /// Returns an error if servings are not positive or an update fails
    pub async fn rescale_list_recipe(
        &self,
        conn: &mut SqliteConnection,
        list_id: Uuid,
        servings: f64,
        factor: f64,
    ) -> AppResult<u64> {
        validate_servings(servings)?;

        let scaled = sqlx::query(
            "UPDATE shopping_list_entries SET amount = amount * $1 WHERE list_recipe_id = $2",
        )
        .bind(factor)
        .bind(list_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to rescale entries: {e}")))?
        .rows_affected();

        sqlx::query("UPDATE shopping_list_recipes SET servings = $1 WHERE id = $2")
            .bind(servings)
            .bind(list_id.to_string())
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::database(format!("Failed to update list servings: {e}")))?;

        debug!(list_recipe.id = %list_id, factor, entries = scaled, "Rescaled list recipe");
        Ok(scaled)
    }

    /// Delete a list recipe and its entries
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn delete_list_recipe(&self, list_id: Uuid, space_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM shopping_list_recipes WHERE id = $1 AND space_id = $2")
            .bind(list_id.to_string())
            .bind(space_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete shopping list recipe: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert an entry on the given connection
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn insert_entry(&self, conn: &mut SqliteConnection, entry: &NewEntry) -> AppResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r"
            INSERT INTO shopping_list_entries
                (id, space_id, list_recipe_id, ingredient_id, food_id, unit, amount, checked,
                 completed_at, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, NULL, $8, $9)
            ",
        )
        .bind(id.to_string())
        .bind(entry.space_id.to_string())
        .bind(entry.list_recipe.map(|id| id.to_string()))
        .bind(entry.ingredient.map(|id| id.to_string()))
        .bind(entry.food.map(|id| id.to_string()))
        .bind(&entry.unit)
        .bind(entry.amount)
        .bind(entry.created_by.to_string())
        .bind(timestamp(Utc::now()))
        .execute(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to create shopping list entry: {e}")))?;

        Ok(id)
    }

    /// Create a standalone entry and return it as stored
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn create_entry(&self, entry: &NewEntry) -> AppResult<ShoppingListEntry> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::database(format!("Failed to acquire connection: {e}")))?;
        let id = self.insert_entry(&mut conn, entry).await?;
        drop(conn);

        self.get_entry(id, entry.created_by, entry.space_id)
            .await?
            .ok_or_else(|| AppError::internal(format!("Entry {id} vanished after insert")))
    }

    /// All entries of a list recipe in creation order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn entries_for_list_recipe(&self, list_id: Uuid) -> AppResult<Vec<ShoppingListEntry>> {
        let sql = format!("{ENTRY_SELECT} WHERE e.list_recipe_id = $1 ORDER BY e.created_at, e.rowid");
        let rows = sqlx::query(&sql)
            .bind(list_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list entries: {e}")))?;

        rows.iter().map(row_to_entry).collect()
    }

    /// Entries visible to `viewer` in creation order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_entries(
        &self,
        viewer: Uuid,
        space_id: Uuid,
        filter: &EntryFilter,
    ) -> AppResult<Vec<ShoppingListEntry>> {
        let checked_clause = match filter.checked {
            CheckedFilter::False => "e.checked = 0",
            CheckedFilter::True => "e.checked = 1",
            CheckedFilter::Both => "1 = 1",
            CheckedFilter::Recent => "(e.checked = 0 OR e.completed_at >= $4)",
        };
        let sql = format!(
            "{ENTRY_SELECT} WHERE e.space_id = $1 AND {} AND ($3 IS NULL OR e.list_recipe_id = $3) \
             AND {checked_clause} ORDER BY e.created_at, e.rowid",
            visible_to!("e", "$2")
        );

        let mut query = sqlx::query(&sql)
            .bind(space_id.to_string())
            .bind(viewer.to_string())
            .bind(filter.list_recipe.map(|id| id.to_string()));
        if filter.checked == CheckedFilter::Recent {
            let cutoff = Utc::now() - Duration::days(filter.recent_days.max(0));
            query = query.bind(timestamp(cutoff));
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list entries: {e}")))?;

        rows.iter().map(row_to_entry).collect()
    }

    /// Get an entry visible to `viewer`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_entry(
        &self,
        entry_id: Uuid,
        viewer: Uuid,
        space_id: Uuid,
    ) -> AppResult<Option<ShoppingListEntry>> {
        let sql = format!(
            "{ENTRY_SELECT} WHERE e.id = $1 AND e.space_id = $2 AND {}",
            visible_to!("e", "$3")
        );
        let row = sqlx::query(&sql)
            .bind(entry_id.to_string())
            .bind(space_id.to_string())
            .bind(viewer.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get entry: {e}")))?;

        row.as_ref().map(row_to_entry).transpose()
    }

    /// Apply a partial update to an entry the caller can already see
    ///
    /// Checking stamps `completed_at`, unchecking clears it.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn update_entry(
        &self,
        entry: &ShoppingListEntry,
        update: &UpdateEntry,
    ) -> AppResult<()> {
        let checked = update.checked.unwrap_or(entry.checked);
        let completed_at = match (entry.checked, checked) {
            (false, true) => Some(Utc::now()),
            (_, false) => None,
            (true, true) => entry.completed_at,
        };

        sqlx::query(
            r"
            UPDATE shopping_list_entries
            SET amount = $1, unit = $2, checked = $3, completed_at = $4
            WHERE id = $5
            ",
        )
        .bind(update.amount.unwrap_or(entry.amount))
        .bind(update.unit.clone().or_else(|| entry.unit.clone()))
        .bind(checked)
        .bind(completed_at.map(timestamp))
        .bind(entry.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update entry: {e}")))?;

        Ok(())
    }

    /// Delete one entry on the given connection
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn delete_entry(&self, conn: &mut SqliteConnection, entry_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM shopping_list_entries WHERE id = $1")
            .bind(entry_id.to_string())
            .execute(conn)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete entry: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete one entry outside any transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn remove_entry(&self, entry_id: Uuid) -> AppResult<bool> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::database(format!("Failed to acquire connection: {e}")))?;
        self.delete_entry(&mut conn, entry_id).await
    }
}

fn row_to_list_recipe(row: &SqliteRow) -> AppResult<ShoppingListRecipe> {
    let id: String = row.get("id");
    let space_id: String = row.get("space_id");
    let created_by: String = row.get("created_by");
    let created_at: String = row.get("created_at");
    Ok(ShoppingListRecipe {
        id: parse_uuid(&id)?,
        space_id: parse_uuid(&space_id)?,
        name: row.get("name"),
        recipe: parse_optional_uuid(row.get("recipe_id"))?,
        mealplan: parse_optional_uuid(row.get("mealplan_id"))?,
        servings: row.get("servings"),
        created_by: parse_uuid(&created_by)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn row_to_entry(row: &SqliteRow) -> AppResult<ShoppingListEntry> {
    let id: String = row.get("id");
    let created_by: String = row.get("created_by");
    let created_at: String = row.get("created_at");
    let completed_at: Option<String> = row.get("completed_at");
    let list_recipe = parse_optional_uuid(row.get("list_recipe_id"))?;
    let food_id = parse_optional_uuid(row.get("food_id"))?;
    let food_name: Option<String> = row.get("food_name");

    let recipe_mealplan = match list_recipe {
        Some(list_id) => Some(ListRecipeRef {
            id: list_id,
            name: row.get("list_name"),
            recipe: parse_optional_uuid(row.get("list_recipe"))?,
            mealplan: parse_optional_uuid(row.get("list_mealplan"))?,
            servings: row.get("list_servings"),
        }),
        None => None,
    };

    Ok(ShoppingListEntry {
        id: parse_uuid(&id)?,
        list_recipe,
        ingredient: parse_optional_uuid(row.get("ingredient_id"))?,
        food: food_id.zip(food_name).map(|(id, name)| FoodRef { id, name }),
        unit: row.get("unit"),
        amount: row.get("amount"),
        checked: row.get::<i64, _>("checked") == 1,
        completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
        created_by: UserRef {
            id: parse_uuid(&created_by)?,
            username: row.get("username"),
            display_name: row.get("display_name"),
        },
        created_at: parse_timestamp(&created_at)?,
        recipe_mealplan,
    })
}
