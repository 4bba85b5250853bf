// ABOUTME: Application constants grouped by domain
// ABOUTME: Service names, defaults, environment variable names and limits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

/// Service identification
pub mod service_names {
    /// Name used in logs and as JWT audience
    pub const LARDER: &str = "larder";
}

/// API endpoints
pub mod endpoints {
    /// Health check endpoint
    pub const HEALTH_CHECK: &str = "/health";
    /// API base path
    pub const API_BASE: &str = "/api";
}

/// Default values for configuration
pub mod defaults {
    /// Default HTTP port
    pub const HTTP_PORT: u16 = 8081;
    /// Default SQLite database location
    pub const DATABASE_URL: &str = "sqlite:./data/larder.db";
    /// JWT lifetime in hours
    pub const JWT_EXPIRY_HOURS: i64 = 24;
    /// Days a checked entry keeps showing under the "recent" filter
    pub const SHOPPING_RECENT_DAYS: i64 = 7;
}

/// Environment variable names
pub mod env_config {
    /// HTTP listen port
    pub const HTTP_PORT: &str = "HTTP_PORT";
    /// Database connection URL
    pub const DATABASE_URL: &str = "DATABASE_URL";
    /// JWT signing secret
    pub const JWT_SECRET: &str = "LARDER_JWT_SECRET";
    /// JWT lifetime in hours
    pub const JWT_EXPIRY_HOURS: &str = "JWT_EXPIRY_HOURS";
    /// Deployment environment
    pub const ENVIRONMENT: &str = "ENVIRONMENT";
}

/// Limits and bounds
pub mod limits {
    /// Minimum accepted JWT secret length in bytes
    pub const MIN_JWT_SECRET_LEN: usize = 32;
    /// Maximum nesting depth when expanding step and food recipes
    pub const MAX_RECIPE_DEPTH: usize = 16;
}
