// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses environment variables into a typed ServerConfig with validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

//! Environment-based configuration management

use larder_core::constants::{defaults, env_config, limits, service_names};
use larder_core::errors::{AppError, AppResult, ErrorCode};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// Environment type for security and other configurations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Type-safe database location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite {
        /// Location of the database file
        path: PathBuf,
    },
    /// In-memory `SQLite` (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse a `sqlite:` URL or a bare file path
    #[must_use]
    pub fn parse_url(s: &str) -> Self {
        let path_str = s.strip_prefix("sqlite://").or_else(|| s.strip_prefix("sqlite:")).unwrap_or(s);
        if path_str == ":memory:" {
            Self::Memory
        } else {
            Self::SQLite {
                path: PathBuf::from(path_str),
            }
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::parse_url(defaults::DATABASE_URL)
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Authentication configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    /// Token lifetime in hours
    pub jwt_expiry_hours: i64,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expiry_hours", &self.jwt_expiry_hours)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: generate_jwt_secret(),
            jwt_expiry_hours: defaults::JWT_EXPIRY_HOURS,
        }
    }
}

/// Server configuration loaded from the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP API port
    pub http_port: u16,
    /// Database location
    pub database_url: DatabaseUrl,
    /// Authentication configuration
    pub auth: AuthConfig,
    /// Deployment environment
    pub environment: Environment,
    /// Server name
    pub server_name: String,
    /// Server version (from Cargo.toml)
    pub server_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: defaults::HTTP_PORT,
            database_url: DatabaseUrl::Memory,
            auth: AuthConfig::default(),
            environment: Environment::Testing,
            server_name: service_names::LARDER.to_owned(),
            server_version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but malformed, or if the
    /// resulting configuration fails [`ServerConfig::validate`]
    pub fn from_env() -> AppResult<Self> {
        info!("Loading configuration from environment variables");

        let environment =
            Environment::from_str_or_default(&env_var_or(env_config::ENVIRONMENT, "development"));

        let http_port = env_var_or(env_config::HTTP_PORT, &defaults::HTTP_PORT.to_string())
            .parse::<u16>()
            .map_err(|e| {
                AppError::new(ErrorCode::ConfigInvalid, format!("Invalid HTTP_PORT value: {e}"))
            })?;

        let jwt_expiry_hours = env_var_or(
            env_config::JWT_EXPIRY_HOURS,
            &defaults::JWT_EXPIRY_HOURS.to_string(),
        )
        .parse::<i64>()
        .map_err(|e| {
            AppError::new(
                ErrorCode::ConfigInvalid,
                format!("Invalid JWT_EXPIRY_HOURS value: {e}"),
            )
        })?;

        let jwt_secret = if let Ok(secret) = env::var(env_config::JWT_SECRET) {
            secret
        } else if environment.is_production() {
            return Err(AppError::new(
                ErrorCode::ConfigMissing,
                format!("{} must be set in production", env_config::JWT_SECRET),
            ));
        } else {
            warn!(
                "{} not set, generating an ephemeral secret; tokens will not survive restarts",
                env_config::JWT_SECRET
            );
            generate_jwt_secret()
        };

        let config = Self {
            http_port,
            database_url: DatabaseUrl::parse_url(&env_var_or(
                env_config::DATABASE_URL,
                defaults::DATABASE_URL,
            )),
            auth: AuthConfig {
                jwt_secret,
                jwt_expiry_hours,
            },
            environment,
            server_name: service_names::LARDER.to_owned(),
            server_version: env!("CARGO_PKG_VERSION").to_owned(),
        };

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error when the secret is too short or the token lifetime is not positive
    pub fn validate(&self) -> AppResult<()> {
        if self.auth.jwt_secret.len() < limits::MIN_JWT_SECRET_LEN {
            return Err(AppError::new(
                ErrorCode::ConfigInvalid,
                format!(
                    "JWT secret must be at least {} bytes",
                    limits::MIN_JWT_SECRET_LEN
                ),
            ));
        }

        if self.auth.jwt_expiry_hours <= 0 {
            return Err(AppError::new(
                ErrorCode::ConfigInvalid,
                "JWT_EXPIRY_HOURS must be positive",
            ));
        }

        if self.environment.is_production() && self.database_url.is_memory() {
            warn!("Production environment is running on an in-memory database");
        }

        Ok(())
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} {} (environment: {}, http port: {}, database: {})",
            self.server_name,
            self.server_version,
            self.environment,
            self.http_port,
            self.database_url
        )
    }
}

/// Generate a random hex-encoded JWT secret
#[must_use]
pub fn generate_jwt_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}
