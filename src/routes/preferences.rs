// ABOUTME: Route handlers for the caller's shopping preferences and share list
// ABOUTME: Preferences are created with defaults on first read
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

use super::{authenticate, json_body};
use crate::database::{UpdatePreference, UserPreference};
use crate::resources::ServerResources;
use axum::{body::Bytes, extract::State, http::HeaderMap, routing::get, Json, Router};
use larder_core::errors::AppError;
use std::sync::Arc;

/// User preference routes implementation
pub struct UserPreferenceRoutes;

impl UserPreferenceRoutes {
    /// Create the preference routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/user-preference",
                get(Self::handle_get).patch(Self::handle_update),
            )
            .with_state(resources)
    }

    /// Handle GET /api/user-preference
    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<UserPreference>, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let prefs = resources.database.users().get_preference(auth.user_id).await?;
        Ok(Json(prefs))
    }

    /// Handle PATCH /api/user-preference
    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Json<UserPreference>, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let body: UpdatePreference = json_body(&body)?;
        let prefs = resources
            .database
            .users()
            .update_preference(auth.user_id, auth.space_id, &body)
            .await?;
        Ok(Json(prefs))
    }
}
