// ABOUTME: Route module organization for the Larder HTTP API
// ABOUTME: Assembles per-domain routers and the tracing and request-id middleware stack
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

//! Route module for Larder
//!
//! Each domain module contains only route definitions and thin handler
//! functions that authenticate the caller and delegate to the
//! [`crate::shopping`] service layer or a database manager.

/// Health check route
pub mod health;
/// Meal plan routes
pub mod meal_plans;
/// User preference routes
pub mod preferences;
/// Recipe-to-shopping-list route
pub mod recipes;
/// Shopping list entry and list recipe routes
pub mod shopping;

pub use health::HealthRoutes;
pub use meal_plans::MealPlanRoutes;
pub use preferences::UserPreferenceRoutes;
pub use recipes::RecipeShoppingRoutes;
pub use shopping::ShoppingRoutes;

use crate::auth::AuthResult;
use crate::resources::ServerResources;
use axum::body::{Body, Bytes};
use axum::http::{header::AUTHORIZATION, HeaderMap, Request};
use axum::Router;
use larder_core::errors::{AppError, AppResult};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;
use uuid::Uuid;

/// Build the complete application router
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request_id,
            )
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .merge(HealthRoutes::routes(Arc::clone(&resources)))
        .merge(RecipeShoppingRoutes::routes(Arc::clone(&resources)))
        .merge(ShoppingRoutes::routes(Arc::clone(&resources)))
        .merge(MealPlanRoutes::routes(Arc::clone(&resources)))
        .merge(UserPreferenceRoutes::routes(resources))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(trace_layer)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Identify the caller from the `Authorization` header
pub(crate) async fn authenticate(
    headers: &HeaderMap,
    resources: &Arc<ServerResources>,
) -> AppResult<AuthResult> {
    let auth_header = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
    resources.authenticate(auth_header).await
}

/// Parse a path id; malformed ids cannot name anything, so they are not found
pub(crate) fn parse_id(raw: &str, resource: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found(format!("{resource} {raw}")))
}

/// Decode an optional JSON body; an empty body yields the default value
pub(crate) fn json_body<T: DeserializeOwned + Default>(body: &Bytes) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    required_json_body(body)
}

/// Decode a JSON body that must be present
pub(crate) fn required_json_body<T: DeserializeOwned>(body: &Bytes) -> AppResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::invalid_input(format!("Invalid request body: {e}")))
}
