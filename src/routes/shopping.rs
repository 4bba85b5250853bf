// ABOUTME: Route handlers for shopping list entries and shopping list recipes
// ABOUTME: Lists, reads and mutations are limited to the creator and their share list
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

//! Shopping list routes
//!
//! Entries and list recipes of another user only become visible once that
//! user adds the caller to their `shopping_share`. Everything else is 404.

use super::{authenticate, json_body, parse_id, required_json_body};
use crate::database::{CheckedFilter, EntryFilter, ShoppingListEntry, ShoppingListRecipe, UpdateEntry};
use crate::resources::ServerResources;
use crate::shopping::{ManualEntryRequest, ShoppingListEditor, Visibility};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use larder_core::errors::AppError;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Query parameters for listing entries
#[derive(Debug, Deserialize, Default)]
pub struct ListEntriesQuery {
    /// `false`, `true`, `both` or `recent` (default)
    pub checked: Option<String>,
    /// Restrict to one list recipe
    pub id: Option<String>,
}

/// Shopping list routes implementation
pub struct ShoppingRoutes;

impl ShoppingRoutes {
    /// Create all shopping list routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/shopping-list-entry",
                get(Self::handle_list_entries).post(Self::handle_create_entry),
            )
            .route(
                "/api/shopping-list-entry/:id",
                get(Self::handle_get_entry)
                    .patch(Self::handle_update_entry)
                    .delete(Self::handle_delete_entry),
            )
            .route("/api/shopping-list-recipe", get(Self::handle_list_recipes))
            .route(
                "/api/shopping-list-recipe/:id",
                get(Self::handle_get_list_recipe).delete(Self::handle_delete_list_recipe),
            )
            .with_state(resources)
    }

    /// Handle GET /api/shopping-list-entry
    async fn handle_list_entries(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<ListEntriesQuery>,
    ) -> Result<Json<Vec<ShoppingListEntry>>, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let prefs = resources.database.users().get_preference(auth.user_id).await?;

        let list_recipe = match query.id.as_deref() {
            Some(raw) => Some(parse_id(raw, "Shopping list recipe")?),
            None => None,
        };
        let filter = EntryFilter {
            checked: query
                .checked
                .as_deref()
                .map(CheckedFilter::parse)
                .unwrap_or_default(),
            list_recipe,
            recent_days: prefs.shopping_recent_days,
        };

        let entries = resources
            .database
            .shopping()
            .list_entries(auth.user_id, auth.space_id, &filter)
            .await?;
        Ok(Json(entries))
    }

    /// Handle POST /api/shopping-list-entry
    async fn handle_create_entry(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let body: ManualEntryRequest = required_json_body(&body)?;
        let entry = ShoppingListEditor::new(&resources.database, auth)
            .add_entry(&body)
            .await?;

        info!(entry.id = %entry.id, user.id = %auth.user_id, "Created shopping list entry");
        Ok((StatusCode::CREATED, Json(entry)).into_response())
    }

    /// Handle GET /api/shopping-list-entry/:id
    async fn handle_get_entry(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Json<ShoppingListEntry>, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let entry_id = parse_id(&id, "Shopping list entry")?;
        let entry = Visibility::new(&resources.database, auth)
            .entry(entry_id)
            .await?;
        Ok(Json(entry))
    }

    /// Handle PATCH /api/shopping-list-entry/:id
    async fn handle_update_entry(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        body: Bytes,
    ) -> Result<Json<ShoppingListEntry>, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let entry_id = parse_id(&id, "Shopping list entry")?;
        let body: UpdateEntry = json_body(&body)?;
        if body.amount.is_some_and(|amount| !amount.is_finite() || amount < 0.0) {
            return Err(AppError::invalid_input("amount must be a non-negative number"));
        }

        let visibility = Visibility::new(&resources.database, auth);
        let entry = visibility.entry(entry_id).await?;
        resources.database.shopping().update_entry(&entry, &body).await?;

        Ok(Json(visibility.entry(entry_id).await?))
    }

    /// Handle DELETE /api/shopping-list-entry/:id
    async fn handle_delete_entry(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<StatusCode, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let entry_id = parse_id(&id, "Shopping list entry")?;
        let entry = Visibility::new(&resources.database, auth)
            .entry(entry_id)
            .await?;

        resources.database.shopping().remove_entry(entry.id).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    /// Handle GET /api/shopping-list-recipe
    async fn handle_list_recipes(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<Vec<ShoppingListRecipe>>, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let lists = resources
            .database
            .shopping()
            .list_list_recipes(auth.user_id, auth.space_id)
            .await?;
        Ok(Json(lists))
    }

    /// Handle GET /api/shopping-list-recipe/:id
    async fn handle_get_list_recipe(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Json<ShoppingListRecipe>, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let list_id = parse_id(&id, "Shopping list recipe")?;
        let list = Visibility::new(&resources.database, auth)
            .list_recipe(list_id)
            .await?;
        Ok(Json(list))
    }

    /// Handle DELETE /api/shopping-list-recipe/:id
    async fn handle_delete_list_recipe(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<StatusCode, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let list_id = parse_id(&id, "Shopping list recipe")?;
        let list = Visibility::new(&resources.database, auth)
            .list_recipe(list_id)
            .await?;

        resources
            .database
            .shopping()
            .delete_list_recipe(list.id, auth.space_id)
            .await?;
        info!(list_recipe.id = %list.id, user.id = %auth.user_id, "Deleted shopping list recipe");
        Ok(StatusCode::NO_CONTENT)
    }
}
