// ABOUTME: Route handlers for meal plans
// ABOUTME: Creation may auto-add to the shopping list; servings changes rescale it
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

use super::{authenticate, json_body, parse_id, required_json_body};
use crate::database::{MealPlan, NewMealPlan, UpdateMealPlan};
use crate::resources::ServerResources;
use crate::shopping::{ShoppingListEditor, Visibility};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use larder_core::errors::AppError;
use std::sync::Arc;

/// Meal plan routes implementation
pub struct MealPlanRoutes;

impl MealPlanRoutes {
    /// Create all meal plan routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/meal-plan",
                get(Self::handle_list).post(Self::handle_create),
            )
            .route(
                "/api/meal-plan/:id",
                get(Self::handle_get)
                    .patch(Self::handle_update)
                    .delete(Self::handle_delete),
            )
            .with_state(resources)
    }

    /// Handle GET /api/meal-plan
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<Vec<MealPlan>>, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let plans = resources
            .database
            .meal_plans()
            .list(auth.user_id, auth.space_id)
            .await?;
        Ok(Json(plans))
    }

    /// Handle POST /api/meal-plan
    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let body: NewMealPlan = required_json_body(&body)?;
        let plan = ShoppingListEditor::new(&resources.database, auth)
            .create_meal_plan(&body)
            .await?;
        Ok((StatusCode::CREATED, Json(plan)).into_response())
    }

    /// Handle GET /api/meal-plan/:id
    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Json<MealPlan>, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let plan_id = parse_id(&id, "Meal plan")?;
        let plan = Visibility::new(&resources.database, auth)
            .meal_plan(plan_id)
            .await?;
        Ok(Json(plan))
    }

    /// Handle PATCH /api/meal-plan/:id
    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        body: Bytes,
    ) -> Result<Json<MealPlan>, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let plan_id = parse_id(&id, "Meal plan")?;
        let body: UpdateMealPlan = json_body(&body)?;
        let plan = ShoppingListEditor::new(&resources.database, auth)
            .update_meal_plan(plan_id, &body)
            .await?;
        Ok(Json(plan))
    }

    /// Handle DELETE /api/meal-plan/:id
    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<StatusCode, AppError> {
        let auth = authenticate(&headers, &resources).await?;
        let plan_id = parse_id(&id, "Meal plan")?;
        ShoppingListEditor::new(&resources.database, auth)
            .delete_meal_plan(plan_id)
            .await?;
        Ok(StatusCode::NO_CONTENT)
    }
}
