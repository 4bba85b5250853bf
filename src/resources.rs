// ABOUTME: Shared server resources handed to every router as state
// ABOUTME: Bundles the database, the auth manager and the loaded configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

use crate::auth::{AuthManager, AuthResult};
use crate::config::ServerConfig;
use crate::database::Database;
use larder_core::errors::AppResult;
use std::sync::Arc;

/// Centralized resource container, created once at startup and shared via `Arc`
#[derive(Clone)]
pub struct ServerResources {
    /// Database handle
    pub database: Arc<Database>,
    /// Token issuing and validation
    pub auth_manager: Arc<AuthManager>,
    /// Loaded configuration
    pub config: Arc<ServerConfig>,
}

impl ServerResources {
    /// Create new server resources
    #[must_use]
    pub fn new(database: Database, auth_manager: AuthManager, config: Arc<ServerConfig>) -> Self {
        Self {
            database: Arc::new(database),
            auth_manager: Arc::new(auth_manager),
            config,
        }
    }

    /// Authenticate an `Authorization` header value
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the caller cannot be identified
    pub async fn authenticate(&self, auth_header: Option<&str>) -> AppResult<AuthResult> {
        self.auth_manager
            .authenticate_request(&self.database.users(), auth_header)
            .await
    }
}
