// ABOUTME: Database operations for meal plans
// ABOUTME: Plans are visible to their creator and to users the creator shares a shopping list with
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

use super::{parse_optional_uuid, parse_timestamp, parse_uuid, timestamp};
use chrono::{DateTime, NaiveDate, Utc};
use larder_core::errors::{AppError, AppResult, ErrorCode};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

/// A recipe (or free-text title) scheduled on a date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MealPlan {
    /// Unique identifier
    pub id: Uuid,
    /// Owning space
    pub space_id: Uuid,
    /// Planned recipe
    pub recipe: Option<Uuid>,
    /// Title, used when no recipe is set
    pub title: String,
    /// Planned servings
    pub servings: f64,
    /// Day the meal is planned for
    pub date: NaiveDate,
    /// Creator
    pub created_by: Uuid,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Input for creating a meal plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMealPlan {
    /// Planned recipe
    #[serde(default)]
    pub recipe: Option<Uuid>,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Planned servings, must be positive
    pub servings: f64,
    /// Planned day
    pub date: NaiveDate,
}

/// Partial meal plan update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMealPlan {
    /// New title
    pub title: Option<String>,
    /// New servings
    pub servings: Option<f64>,
    /// New day
    pub date: Option<NaiveDate>,
}

/// Reject servings that cannot scale a shopping list
pub(crate) fn validate_servings(servings: f64) -> AppResult<()> {
    if servings.is_finite() && servings > 0.0 {
        Ok(())
    } else {
        Err(AppError::new(
            ErrorCode::ValueOutOfRange,
            "servings must be a positive number",
        ))
    }
}

/// Meal plan database operations manager
pub struct MealPlansManager {
    pool: SqlitePool,
}

impl MealPlansManager {
    /// Create a new meal plans manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a meal plan on the given connection
    ///
    /// # Errors
    ///
    /// Returns an error if servings are not positive or the insert fails
    pub async fn create(
        &self,
        conn: &mut SqliteConnection,
        space_id: Uuid,
        created_by: Uuid,
        request: &NewMealPlan,
    ) -> AppResult<MealPlan> {
        validate_servings(request.servings)?;

        let plan = MealPlan {
            id: Uuid::new_v4(),
            space_id,
            recipe: request.recipe,
            title: request.title.clone(),
            servings: request.servings,
            date: request.date,
            created_by,
            created_at: Utc::now(),
        };

        sqlx::query(
            r"
            INSERT INTO meal_plans (id, space_id, recipe_id, title, servings, date, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(plan.id.to_string())
        .bind(space_id.to_string())
        .bind(plan.recipe.map(|id| id.to_string()))
        .bind(&plan.title)
        .bind(plan.servings)
        .bind(plan.date.to_string())
        .bind(created_by.to_string())
        .bind(timestamp(plan.created_at))
        .execute(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to create meal plan: {e}")))?;

        Ok(plan)
    }

    /// Get a meal plan visible to `viewer`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get(
        &self,
        plan_id: Uuid,
        viewer: Uuid,
        space_id: Uuid,
    ) -> AppResult<Option<MealPlan>> {
        let row = sqlx::query(
            r"
            SELECT id, space_id, recipe_id, title, servings, date, created_by, created_at
            FROM meal_plans
            WHERE id = $1
              AND space_id = $2
              AND (
                  created_by = $3
                  OR created_by IN (SELECT user_id FROM user_shopping_share WHERE shared_with_id = $3)
              )
            ",
        )
        .bind(plan_id.to_string())
        .bind(space_id.to_string())
        .bind(viewer.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get meal plan: {e}")))?;

        row.as_ref().map(row_to_meal_plan).transpose()
    }

    /// List meal plans visible to `viewer`, by date
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list(&self, viewer: Uuid, space_id: Uuid) -> AppResult<Vec<MealPlan>> {
        let rows = sqlx::query(
            r"
            SELECT id, space_id, recipe_id, title, servings, date, created_by, created_at
            FROM meal_plans
            WHERE space_id = $1
              AND (
                  created_by = $2
                  OR created_by IN (SELECT user_id FROM user_shopping_share WHERE shared_with_id = $2)
              )
            ORDER BY date, created_at
            ",
        )
        .bind(space_id.to_string())
        .bind(viewer.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list meal plans: {e}")))?;

        rows.iter().map(row_to_meal_plan).collect()
    }

    /// Apply a partial update and return the stored plan
    ///
    /// # Errors
    ///
    /// Returns an error if servings are not positive or the update fails
    pub async fn update(
        &self,
        conn: &mut SqliteConnection,
        plan: &MealPlan,
        update: &UpdateMealPlan,
    ) -> AppResult<MealPlan> {
        let mut updated = plan.clone();
        if let Some(servings) = update.servings {
            validate_servings(servings)?;
            updated.servings = servings;
        }
        if let Some(title) = &update.title {
            updated.title.clone_from(title);
        }
        if let Some(date) = update.date {
            updated.date = date;
        }

        sqlx::query("UPDATE meal_plans SET title = $1, servings = $2, date = $3 WHERE id = $4")
            .bind(&updated.title)
            .bind(updated.servings)
            .bind(updated.date.to_string())
            .bind(plan.id.to_string())
            .execute(conn)
            .await
            .map_err(|e| AppError::database(format!("Failed to update meal plan: {e}")))?;

        Ok(updated)
    }

    /// Delete a meal plan; its shopping list recipe and entries cascade
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn delete(&self, plan_id: Uuid, space_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM meal_plans WHERE id = $1 AND space_id = $2")
            .bind(plan_id.to_string())
            .bind(space_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete meal plan: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_meal_plan(row: &SqliteRow) -> AppResult<MealPlan> {
    let id: String = row.get("id");
    let space_id: String = row.get("space_id");
    let created_by: String = row.get("created_by");
    let created_at: String = row.get("created_at");
    let date: String = row.get("date");
    Ok(MealPlan {
        id: parse_uuid(&id)?,
        space_id: parse_uuid(&space_id)?,
        recipe: parse_optional_uuid(row.get("recipe_id"))?,
        title: row.get("title"),
        servings: row.get("servings"),
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| AppError::database(format!("Invalid date '{date}': {e}")))?,
        created_by: parse_uuid(&created_by)?,
        created_at: parse_timestamp(&created_at)?,
    })
}
