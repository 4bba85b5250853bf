// ABOUTME: SQLite database handle, connection pooling and schema migrations
// ABOUTME: Hands out per-aggregate managers for users, recipes, meal plans and shopping lists
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

//! # Database Management
//!
//! Every table carries a `space_id` so that each tenant ("space") only ever
//! sees its own rows. Managers are cheap to construct: they wrap a clone of
//! the shared pool.

/// Meal plan storage
pub mod meal_plans;
/// Recipe, step, ingredient and food storage
pub mod recipes;
/// Shopping list recipes and entries
pub mod shopping;
/// Spaces, users, preferences and sharing
pub mod users;

pub use meal_plans::{MealPlan, MealPlansManager, NewMealPlan, UpdateMealPlan};
pub use recipes::{
    Food, Ingredient, IngredientLine, NewFood, NewIngredient, NewRecipe, NewStep, Recipe,
    RecipesManager, Step,
};
pub use shopping::{
    CheckedFilter, EntryFilter, NewEntry, NewListRecipe, ShoppingListEntry, ShoppingListRecipe,
    ShoppingManager, UpdateEntry,
};
pub use users::{Space, UpdatePreference, User, UserPreference, UsersManager};

use crate::config::DatabaseUrl;
use chrono::{DateTime, SecondsFormat, Utc};
use larder_core::errors::{AppError, AppResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Database manager for all Larder storage
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database and run migrations
    ///
    /// In-memory databases are pinned to a single long-lived connection so
    /// every request sees the same data.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or migrations fail
    pub async fn new(url: &DatabaseUrl) -> AppResult<Self> {
        if let DatabaseUrl::SQLite { path } = url {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::config(format!("Cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&url.to_connection_string())
            .map_err(|e| AppError::config(format!("Invalid database URL {url}: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if url.is_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to {url}: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;
        info!(database = %url, "Database ready");
        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Spaces, users and preferences
    #[must_use]
    pub fn users(&self) -> UsersManager {
        UsersManager::new(self.pool.clone())
    }

    /// Recipes and foods
    #[must_use]
    pub fn recipes(&self) -> RecipesManager {
        RecipesManager::new(self.pool.clone())
    }

    /// Meal plans
    #[must_use]
    pub fn meal_plans(&self) -> MealPlansManager {
        MealPlansManager::new(self.pool.clone())
    }

    /// Shopping list recipes and entries
    #[must_use]
    pub fn shopping(&self) -> ShoppingManager {
        ShoppingManager::new(self.pool.clone())
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;
        }
        debug!(statements = SCHEMA.len(), "Schema migrated");
        Ok(())
    }
}

/// Render a timestamp the way every table stores it
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub(crate) fn parse_timestamp(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid timestamp '{raw}': {e}")))
}

/// Parse a stored UUID
pub(crate) fn parse_uuid(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::database(format!("Invalid UUID '{raw}': {e}")))
}

/// Parse an optional stored UUID
pub(crate) fn parse_optional_uuid(raw: Option<String>) -> AppResult<Option<Uuid>> {
    raw.as_deref().map(parse_uuid).transpose()
}

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS spaces (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        space_id TEXT NOT NULL REFERENCES spaces(id) ON DELETE CASCADE,
        username TEXT NOT NULL,
        display_name TEXT,
        created_at TEXT NOT NULL,
        UNIQUE (space_id, username)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS user_preferences (
        user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
        mealplan_autoadd_shopping INTEGER NOT NULL DEFAULT 0,
        mealplan_autoinclude_related INTEGER NOT NULL DEFAULT 1,
        mealplan_autoexclude_onhand INTEGER NOT NULL DEFAULT 0,
        shopping_recent_days INTEGER NOT NULL DEFAULT 7,
        updated_at TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS user_shopping_share (
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        shared_with_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, shared_with_id)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS recipes (
        id TEXT PRIMARY KEY,
        space_id TEXT NOT NULL REFERENCES spaces(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        servings REAL NOT NULL CHECK (servings > 0),
        private INTEGER NOT NULL DEFAULT 0,
        created_by TEXT NOT NULL REFERENCES users(id),
        created_at TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS recipe_shared (
        recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        PRIMARY KEY (recipe_id, user_id)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS foods (
        id TEXT PRIMARY KEY,
        space_id TEXT NOT NULL REFERENCES spaces(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        ignore_shopping INTEGER NOT NULL DEFAULT 0,
        recipe_id TEXT REFERENCES recipes(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL,
        UNIQUE (space_id, name)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS food_onhand (
        food_id TEXT NOT NULL REFERENCES foods(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        PRIMARY KEY (food_id, user_id)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS steps (
        id TEXT PRIMARY KEY,
        recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        instruction TEXT NOT NULL DEFAULT '',
        step_recipe_id TEXT REFERENCES recipes(id) ON DELETE SET NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS ingredients (
        id TEXT PRIMARY KEY,
        step_id TEXT NOT NULL REFERENCES steps(id) ON DELETE CASCADE,
        food_id TEXT REFERENCES foods(id) ON DELETE SET NULL,
        unit TEXT,
        amount REAL NOT NULL DEFAULT 0,
        note TEXT,
        is_header INTEGER NOT NULL DEFAULT 0,
        no_amount INTEGER NOT NULL DEFAULT 0,
        position INTEGER NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS meal_plans (
        id TEXT PRIMARY KEY,
        space_id TEXT NOT NULL REFERENCES spaces(id) ON DELETE CASCADE,
        recipe_id TEXT REFERENCES recipes(id) ON DELETE SET NULL,
        title TEXT NOT NULL DEFAULT '',
        servings REAL NOT NULL CHECK (servings > 0),
        date TEXT NOT NULL,
        created_by TEXT NOT NULL REFERENCES users(id),
        created_at TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS shopping_list_recipes (
        id TEXT PRIMARY KEY,
        space_id TEXT NOT NULL REFERENCES spaces(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        recipe_id TEXT REFERENCES recipes(id) ON DELETE SET NULL,
        mealplan_id TEXT REFERENCES meal_plans(id) ON DELETE CASCADE,
        servings REAL NOT NULL CHECK (servings > 0),
        created_by TEXT NOT NULL REFERENCES users(id),
        created_at TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS shopping_list_entries (
        id TEXT PRIMARY KEY,
        space_id TEXT NOT NULL REFERENCES spaces(id) ON DELETE CASCADE,
        list_recipe_id TEXT REFERENCES shopping_list_recipes(id) ON DELETE CASCADE,
        ingredient_id TEXT REFERENCES ingredients(id) ON DELETE SET NULL,
        food_id TEXT REFERENCES foods(id) ON DELETE SET NULL,
        unit TEXT,
        amount REAL NOT NULL DEFAULT 0,
        checked INTEGER NOT NULL DEFAULT 0,
        completed_at TEXT,
        created_by TEXT NOT NULL REFERENCES users(id),
        created_at TEXT NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_users_space ON users(space_id)",
    "CREATE INDEX IF NOT EXISTS idx_share_target ON user_shopping_share(shared_with_id)",
    "CREATE INDEX IF NOT EXISTS idx_steps_recipe ON steps(recipe_id, position)",
    "CREATE INDEX IF NOT EXISTS idx_ingredients_step ON ingredients(step_id, position)",
    "CREATE INDEX IF NOT EXISTS idx_list_recipes_mealplan ON shopping_list_recipes(mealplan_id)",
    "CREATE INDEX IF NOT EXISTS idx_entries_space_creator ON shopping_list_entries(space_id, created_by)",
    "CREATE INDEX IF NOT EXISTS idx_entries_list_recipe ON shopping_list_entries(list_recipe_id)",
];
