// ABOUTME: Health check route for load balancers and uptime monitoring
// ABOUTME: Unauthenticated; reports status and server version
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

use crate::resources::ServerResources;
use axum::{extract::State, routing::get, Json, Router};
use larder_core::constants::endpoints;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Body of `GET /health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests
    pub status: String,
    /// Server version
    pub version: String,
}

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create the health check route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(endpoints::HEALTH_CHECK, get(Self::handle_health))
            .with_state(resources)
    }

    async fn handle_health(State(resources): State<Arc<ServerResources>>) -> Json<HealthResponse> {
        Json(HealthResponse {
            status: "ok".to_owned(),
            version: resources.config.server_version.clone(),
        })
    }
}
