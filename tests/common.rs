// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Builds in-memory resources, users with tokens and recipe fixtures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `larder`
//!
//! Every test gets its own in-memory database, so tests never observe each
//! other's rows.

use anyhow::Result;
use axum::Router;
use larder::{
    auth::{AuthManager, AuthResult},
    config::ServerConfig,
    database::{
        Database, Ingredient, NewFood, NewIngredient, NewRecipe, NewStep, Recipe, ShoppingListEntry,
        Space, User,
    },
    resources::ServerResources,
    routes::build_router,
};
use std::sync::{Arc, Once};
use uuid::Uuid;

/// Ingredients per generated recipe
pub const INGREDIENTS_PER_RECIPE: usize = 10;

/// Servings every generated recipe is written for
pub const FIXTURE_SERVINGS: f64 = 2.0;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Standard test resources on an in-memory database
pub async fn create_test_resources() -> Result<Arc<ServerResources>> {
    init_test_logging();
    let config = ServerConfig::default();
    let database = Database::new(&config.database_url).await?;
    let auth_manager = AuthManager::from_config(&config.auth);
    Ok(Arc::new(ServerResources::new(
        database,
        auth_manager,
        Arc::new(config),
    )))
}

/// A user together with a valid bearer token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn auth(&self) -> AuthResult {
        AuthResult {
            user_id: self.user.id,
            space_id: self.user.space_id,
        }
    }
}

/// What to hang off a generated recipe
#[derive(Debug, Clone, Copy, Default)]
pub struct RecipeShape {
    /// Embed a recipe of its own ingredients in the first step
    pub step_recipe: bool,
    /// Make the first ingredient's food come from a recipe
    pub food_recipe: bool,
    /// Hide the recipe from other members of the space
    pub private: bool,
}

/// A generated recipe and its nested recipes
#[derive(Debug, Clone)]
pub struct RecipeFixture {
    pub recipe: Recipe,
    /// Root ingredients in order
    pub ingredients: Vec<Ingredient>,
    pub step_recipe: Option<Recipe>,
    pub food_recipe: Option<Recipe>,
}

impl RecipeFixture {
    /// Entries a fresh shopping list should contain with related recipes included
    pub fn expected_entries(&self) -> usize {
        let mut count = INGREDIENTS_PER_RECIPE;
        if self.step_recipe.is_some() {
            count += INGREDIENTS_PER_RECIPE;
        }
        if self.food_recipe.is_some() {
            count += INGREDIENTS_PER_RECIPE - 1;
        }
        count
    }
}

/// One space with helpers to populate it
pub struct TestApp {
    pub resources: Arc<ServerResources>,
    pub space: Space,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let resources = create_test_resources().await?;
        let space = resources
            .database
            .users()
            .create_space(&format!("space-{}", Uuid::new_v4()))
            .await?;
        Ok(Self { resources, space })
    }

    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.resources))
    }

    pub fn database(&self) -> &Database {
        &self.resources.database
    }

    /// Create a user in this app's space
    pub async fn user(&self, username: &str) -> Result<TestUser> {
        self.user_in(self.space.id, username).await
    }

    /// Create a user in a brand new space sharing this database
    pub async fn user_in_other_space(&self, username: &str) -> Result<TestUser> {
        let space = self
            .database()
            .users()
            .create_space(&format!("space-{}", Uuid::new_v4()))
            .await?;
        self.user_in(space.id, username).await
    }

    async fn user_in(&self, space_id: Uuid, username: &str) -> Result<TestUser> {
        let user = self
            .database()
            .users()
            .create_user(space_id, username, None)
            .await?;
        let token = self.resources.auth_manager.generate_token(&user)?;
        Ok(TestUser { user, token })
    }

    /// A recipe of [`INGREDIENTS_PER_RECIPE`] ingredients, amounts 1..=10
    async fn plain_recipe(&self, author: &TestUser, name: &str, private: bool) -> Result<(Recipe, Vec<Ingredient>)> {
        let recipes = self.database().recipes();
        let recipe = recipes
            .create_recipe(
                author.user.space_id,
                author.id(),
                &NewRecipe {
                    name: name.to_owned(),
                    servings: FIXTURE_SERVINGS,
                    private,
                },
            )
            .await?;
        let step = recipes.add_step(&recipe, &NewStep::default()).await?;

        let mut ingredients = Vec::with_capacity(INGREDIENTS_PER_RECIPE);
        for i in 0..INGREDIENTS_PER_RECIPE {
            let food = recipes
                .find_or_create_food(author.user.space_id, &format!("{name} food {i}"))
                .await?;
            let ingredient = recipes
                .add_ingredient(
                    &step,
                    &NewIngredient {
                        food_id: Some(food.id),
                        unit: Some("g".to_owned()),
                        amount: (i + 1) as f64,
                        ..NewIngredient::default()
                    },
                )
                .await?;
            ingredients.push(ingredient);
        }
        Ok((recipe, ingredients))
    }

    /// Generate a recipe authored by `author`
    pub async fn recipe(&self, author: &TestUser, shape: RecipeShape) -> Result<RecipeFixture> {
        let recipes = self.database().recipes();
        let tag = Uuid::new_v4().simple().to_string();

        let step_recipe = if shape.step_recipe {
            Some(self.plain_recipe(author, &format!("step {tag}"), false).await?.0)
        } else {
            None
        };
        let food_recipe = if shape.food_recipe {
            Some(self.plain_recipe(author, &format!("food {tag}"), false).await?.0)
        } else {
            None
        };

        let recipe = recipes
            .create_recipe(
                author.user.space_id,
                author.id(),
                &NewRecipe {
                    name: format!("recipe {tag}"),
                    servings: FIXTURE_SERVINGS,
                    private: shape.private,
                },
            )
            .await?;
        let step = recipes
            .add_step(
                &recipe,
                &NewStep {
                    instruction: "Combine everything".to_owned(),
                    step_recipe_id: step_recipe.as_ref().map(|r| r.id),
                },
            )
            .await?;

        let mut ingredients = Vec::with_capacity(INGREDIENTS_PER_RECIPE);
        for i in 0..INGREDIENTS_PER_RECIPE {
            let food = match (&food_recipe, i) {
                (Some(food_recipe), 0) => {
                    recipes
                        .create_food(
                            author.user.space_id,
                            &NewFood {
                                name: format!("made food {tag}"),
                                ignore_shopping: false,
                                recipe_id: Some(food_recipe.id),
                            },
                        )
                        .await?
                }
                _ => {
                    recipes
                        .find_or_create_food(author.user.space_id, &format!("food {tag} {i}"))
                        .await?
                }
            };
            let ingredient = recipes
                .add_ingredient(
                    &step,
                    &NewIngredient {
                        food_id: Some(food.id),
                        unit: Some("g".to_owned()),
                        amount: (i + 1) as f64,
                        ..NewIngredient::default()
                    },
                )
                .await?;
            ingredients.push(ingredient);
        }

        Ok(RecipeFixture {
            recipe,
            ingredients,
            step_recipe,
            food_recipe,
        })
    }

    /// Entries `viewer` can see under the default filter
    pub async fn visible_entries(&self, viewer: &TestUser) -> Result<Vec<ShoppingListEntry>> {
        let prefs = self.database().users().get_preference(viewer.id()).await?;
        let filter = larder::database::EntryFilter {
            recent_days: prefs.shopping_recent_days,
            ..Default::default()
        };
        Ok(self
            .database()
            .shopping()
            .list_entries(viewer.id(), viewer.user.space_id, &filter)
            .await?)
    }
}

/// Sum of entry amounts
pub fn total_amount(entries: &[ShoppingListEntry]) -> f64 {
    entries.iter().map(|e| e.amount).sum()
}

/// Compare floats produced by repeated scaling
pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}
