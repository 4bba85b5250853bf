// ABOUTME: Route handler that puts a recipe's ingredients on the shopping list
// ABOUTME: PUT only; other methods are rejected by the method router before authentication
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

use super::{authenticate, json_body, parse_id};
use crate::resources::ServerResources;
use crate::shopping::{RecipeShoppingRequest, ShoppingListEditor};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::put,
    Router,
};
use larder_core::errors::AppError;
use std::sync::Arc;
use tracing::info;

/// Recipe shopping routes implementation
pub struct RecipeShoppingRoutes;

impl RecipeShoppingRoutes {
    /// Create the recipe shopping route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/recipe/:id/shopping", put(Self::handle_shopping))
            .with_state(resources)
    }

    /// Handle PUT /api/recipe/:id/shopping
    ///
    /// The body is optional. Without `list_recipe` a new list recipe is
    /// created, otherwise that list is rescaled and/or narrowed.
    async fn handle_shopping(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        body: Bytes,
    ) -> Result<StatusCode, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let recipe_id = parse_id(&id, "Recipe")?;
        let request: RecipeShoppingRequest = json_body(&body)?;

        let list = ShoppingListEditor::new(&resources.database, auth)
            .apply_recipe(recipe_id, &request)
            .await?;

        info!(
            recipe.id = %recipe_id,
            list_recipe.id = %list.id,
            user.id = %auth.user_id,
            "Recipe shopping list updated"
        );
        Ok(StatusCode::NO_CONTENT)
    }
}
