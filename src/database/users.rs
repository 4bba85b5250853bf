// ABOUTME: Database operations for spaces, users, shopping preferences and share lists
// ABOUTME: Preferences are created lazily with defaults on first access
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

use super::{parse_timestamp, parse_uuid, timestamp};
use chrono::{DateTime, Utc};
use larder_core::constants::defaults;
use larder_core::errors::{AppError, AppResult, ErrorCode};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

/// A tenant. Every other row belongs to exactly one space.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Space {
    /// Unique identifier
    pub id: Uuid,
    /// Display name, unique across the installation
    pub name: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// A member of a space
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Unique identifier
    pub id: Uuid,
    /// Owning space
    pub space_id: Uuid,
    /// Login name, unique within the space
    pub username: String,
    /// Optional human-friendly name
    pub display_name: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Per-user switches for shopping list behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPreference {
    /// User these preferences belong to
    pub user: Uuid,
    /// Add a meal plan's ingredients to the shopping list when it is created
    pub mealplan_autoadd_shopping: bool,
    /// Expand step recipes and food recipes while resolving ingredients
    pub mealplan_autoinclude_related: bool,
    /// Leave out foods the user has on hand
    pub mealplan_autoexclude_onhand: bool,
    /// Days a checked entry keeps showing under the `recent` filter
    pub shopping_recent_days: i64,
    /// Users that can see and edit this user's shopping list
    pub shopping_share: Vec<Uuid>,
    /// Last modification
    pub updated_at: DateTime<Utc>,
}

/// Partial update of [`UserPreference`]; absent fields are left alone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePreference {
    /// New auto-add flag
    pub mealplan_autoadd_shopping: Option<bool>,
    /// New include-related flag
    pub mealplan_autoinclude_related: Option<bool>,
    /// New exclude-on-hand flag
    pub mealplan_autoexclude_onhand: Option<bool>,
    /// New recent window in days
    pub shopping_recent_days: Option<i64>,
    /// Replacement share list
    pub shopping_share: Option<Vec<Uuid>>,
}

/// Spaces, users and preferences manager
pub struct UsersManager {
    pool: SqlitePool,
}

impl UsersManager {
    /// Create a new users manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a space
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the insert fails
    pub async fn create_space(&self, name: &str) -> AppResult<Space> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::new(
                ErrorCode::MissingRequiredField,
                "Space name is required",
            ));
        }

        let space = Space {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO spaces (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(space.id.to_string())
            .bind(&space.name)
            .bind(timestamp(space.created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or_database(e, format!("Space '{name}'")))?;

        info!(space.id = %space.id, space.name = %space.name, "Created space");
        Ok(space)
    }

    /// Get a space by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_space(&self, space_id: Uuid) -> AppResult<Option<Space>> {
        let row = sqlx::query("SELECT id, name, created_at FROM spaces WHERE id = $1")
            .bind(space_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get space: {e}")))?;

        row.map(|row| {
            let id: String = row.get("id");
            let created_at: String = row.get("created_at");
            Ok(Space {
                id: parse_uuid(&id)?,
                name: row.get("name"),
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .transpose()
    }

    /// Create a user inside a space
    ///
    /// # Errors
    ///
    /// Returns an error if the space does not exist or the username is taken
    pub async fn create_user(
        &self,
        space_id: Uuid,
        username: &str,
        display_name: Option<&str>,
    ) -> AppResult<User> {
        if self.get_space(space_id).await?.is_none() {
            return Err(AppError::not_found(format!("Space {space_id}")));
        }

        let user = User {
            id: Uuid::new_v4(),
            space_id,
            username: username.trim().to_owned(),
            display_name: display_name.map(str::to_owned),
            created_at: Utc::now(),
        };
        if user.username.is_empty() {
            return Err(AppError::new(
                ErrorCode::MissingRequiredField,
                "Username is required",
            ));
        }

        sqlx::query(
            r"
            INSERT INTO users (id, space_id, username, display_name, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(user.id.to_string())
        .bind(space_id.to_string())
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(timestamp(user.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, format!("User '{}'", user.username)))?;

        info!(user.id = %user.id, space.id = %space_id, "Created user");
        Ok(user)
    }

    /// Get a user by ID regardless of space
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, space_id, username, display_name, created_at FROM users WHERE id = $1",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get user: {e}")))?;

        row.as_ref().map(row_to_user).transpose()
    }

    /// Get a user only if they belong to `space_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_user_in_space(&self, user_id: Uuid, space_id: Uuid) -> AppResult<Option<User>> {
        Ok(self
            .get_user(user_id)
            .await?
            .filter(|user| user.space_id == space_id))
    }

    /// Get preferences, creating the default row on first access
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_preference(&self, user_id: Uuid) -> AppResult<UserPreference> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::database(format!("Failed to acquire connection: {e}")))?;
        load_preference(&mut conn, user_id).await
    }

    /// Apply a partial preference update
    ///
    /// Share targets must be other users of the caller's space.
    ///
    /// # Errors
    ///
    /// Returns an invalid input error for out-of-space share targets or a
    /// negative recent window, and a database error if the update fails
    pub async fn update_preference(
        &self,
        user_id: Uuid,
        space_id: Uuid,
        update: &UpdatePreference,
    ) -> AppResult<UserPreference> {
        if let Some(days) = update.shopping_recent_days {
            if days < 0 {
                return Err(AppError::new(
                    ErrorCode::ValueOutOfRange,
                    "shopping_recent_days must not be negative",
                ));
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        let current = load_preference(&mut tx, user_id).await?;

        sqlx::query(
            r"
            UPDATE user_preferences
            SET mealplan_autoadd_shopping = $1,
                mealplan_autoinclude_related = $2,
                mealplan_autoexclude_onhand = $3,
                shopping_recent_days = $4,
                updated_at = $5
            WHERE user_id = $6
            ",
        )
        .bind(
            update
                .mealplan_autoadd_shopping
                .unwrap_or(current.mealplan_autoadd_shopping),
        )
        .bind(
            update
                .mealplan_autoinclude_related
                .unwrap_or(current.mealplan_autoinclude_related),
        )
        .bind(
            update
                .mealplan_autoexclude_onhand
                .unwrap_or(current.mealplan_autoexclude_onhand),
        )
        .bind(update.shopping_recent_days.unwrap_or(current.shopping_recent_days))
        .bind(timestamp(Utc::now()))
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to update preferences: {e}")))?;

        if let Some(share) = &update.shopping_share {
            for target in share {
                let same_space = sqlx::query("SELECT 1 FROM users WHERE id = $1 AND space_id = $2")
                    .bind(target.to_string())
                    .bind(space_id.to_string())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| AppError::database(format!("Failed to check share target: {e}")))?;
                if same_space.is_none() || *target == user_id {
                    return Err(AppError::invalid_input(format!(
                        "Cannot share shopping list with user {target}"
                    )));
                }
            }

            sqlx::query("DELETE FROM user_shopping_share WHERE user_id = $1")
                .bind(user_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::database(format!("Failed to clear share list: {e}")))?;

            for target in share {
                sqlx::query(
                    "INSERT OR IGNORE INTO user_shopping_share (user_id, shared_with_id) VALUES ($1, $2)",
                )
                .bind(user_id.to_string())
                .bind(target.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::database(format!("Failed to share shopping list: {e}")))?;
            }
        }

        let updated = load_preference(&mut tx, user_id).await?;
        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit preferences: {e}")))?;

        info!(user.id = %user_id, share.count = updated.shopping_share.len(), "Updated preferences");
        Ok(updated)
    }

    /// Users whose shopping list is shared with `user_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn sharers_of(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT user_id FROM user_shopping_share WHERE shared_with_id = $1 ORDER BY user_id",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list sharers: {e}")))?;

        rows.iter()
            .map(|row| parse_uuid(&row.get::<String, _>("user_id")))
            .collect()
    }

    /// Mark or unmark a food as on hand for a user
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails
    pub async fn set_food_onhand(&self, food_id: Uuid, user_id: Uuid, on_hand: bool) -> AppResult<()> {
        let sql = if on_hand {
            "INSERT OR IGNORE INTO food_onhand (food_id, user_id) VALUES ($1, $2)"
        } else {
            "DELETE FROM food_onhand WHERE food_id = $1 AND user_id = $2"
        };
        sqlx::query(sql)
            .bind(food_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update on-hand marker: {e}")))?;
        Ok(())
    }
}

async fn load_preference(conn: &mut SqliteConnection, user_id: Uuid) -> AppResult<UserPreference> {
    sqlx::query(
        r"
        INSERT OR IGNORE INTO user_preferences (user_id, shopping_recent_days, updated_at)
        VALUES ($1, $2, $3)
        ",
    )
    .bind(user_id.to_string())
    .bind(defaults::SHOPPING_RECENT_DAYS)
    .bind(timestamp(Utc::now()))
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to create preferences: {e}")))?;

    let row = sqlx::query(
        r"
        SELECT user_id, mealplan_autoadd_shopping, mealplan_autoinclude_related,
               mealplan_autoexclude_onhand, shopping_recent_days, updated_at
        FROM user_preferences
        WHERE user_id = $1
        ",
    )
    .bind(user_id.to_string())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to load preferences: {e}")))?;

    let share_rows = sqlx::query(
        "SELECT shared_with_id FROM user_shopping_share WHERE user_id = $1 ORDER BY shared_with_id",
    )
    .bind(user_id.to_string())
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to load share list: {e}")))?;

    let shopping_share = share_rows
        .iter()
        .map(|r| parse_uuid(&r.get::<String, _>("shared_with_id")))
        .collect::<AppResult<Vec<_>>>()?;

    let updated_at: String = row.get("updated_at");
    Ok(UserPreference {
        user: user_id,
        mealplan_autoadd_shopping: row.get::<i64, _>("mealplan_autoadd_shopping") == 1,
        mealplan_autoinclude_related: row.get::<i64, _>("mealplan_autoinclude_related") == 1,
        mealplan_autoexclude_onhand: row.get::<i64, _>("mealplan_autoexclude_onhand") == 1,
        shopping_recent_days: row.get("shopping_recent_days"),
        shopping_share,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_user(row: &SqliteRow) -> AppResult<User> {
    let id: String = row.get("id");
    let space_id: String = row.get("space_id");
    let created_at: String = row.get("created_at");
    Ok(User {
        id: parse_uuid(&id)?,
        space_id: parse_uuid(&space_id)?,
        username: row.get("username"),
        display_name: row.get("display_name"),
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Map unique-constraint violations to 409, everything else to a database error
pub(crate) fn conflict_or_database(error: sqlx::Error, what: String) -> AppError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::new(
            ErrorCode::ResourceAlreadyExists,
            format!("{what} already exists"),
        ),
        _ => AppError::database(format!("Failed to insert {what}: {error}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::create_test_db;

    #[tokio::test]
    async fn test_preferences_default_lazily() {
        let db = create_test_db().await.unwrap();
        let users = db.users();
        let space = users.create_space("Kitchen").await.unwrap();
        let user = users.create_user(space.id, "alice", None).await.unwrap();

        let prefs = users.get_preference(user.id).await.unwrap();
        assert!(!prefs.mealplan_autoadd_shopping);
        assert!(prefs.mealplan_autoinclude_related);
        assert!(!prefs.mealplan_autoexclude_onhand);
        assert_eq!(prefs.shopping_recent_days, 7);
        assert!(prefs.shopping_share.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let db = create_test_db().await.unwrap();
        let users = db.users();
        let space = users.create_space("Kitchen").await.unwrap();
        users.create_user(space.id, "alice", None).await.unwrap();

        let err = users.create_user(space.id, "alice", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceAlreadyExists);
    }

    #[tokio::test]
    async fn test_share_list_rejects_other_space() {
        let db = create_test_db().await.unwrap();
        let users = db.users();
        let home = users.create_space("Home").await.unwrap();
        let away = users.create_space("Away").await.unwrap();
        let alice = users.create_user(home.id, "alice", None).await.unwrap();
        let bob = users.create_user(home.id, "bob", None).await.unwrap();
        let eve = users.create_user(away.id, "eve", None).await.unwrap();

        let update = UpdatePreference {
            shopping_share: Some(vec![eve.id]),
            ..Default::default()
        };
        let err = users
            .update_preference(alice.id, home.id, &update)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        let update = UpdatePreference {
            shopping_share: Some(vec![bob.id]),
            mealplan_autoadd_shopping: Some(true),
            ..Default::default()
        };
        let prefs = users
            .update_preference(alice.id, home.id, &update)
            .await
            .unwrap();
        assert_eq!(prefs.shopping_share, vec![bob.id]);
        assert!(prefs.mealplan_autoadd_shopping);
        assert_eq!(users.sharers_of(bob.id).await.unwrap(), vec![alice.id]);
    }
}
