// ABOUTME: Configuration module for the Larder service
// ABOUTME: Re-exports the environment-driven server configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

/// Environment-based configuration (ports, database, auth secret)
pub mod environment;

pub use environment::{AuthConfig, DatabaseUrl, Environment, ServerConfig};
