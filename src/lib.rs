// ABOUTME: Main library entry point for the Larder recipe shopping-list service
// ABOUTME: Wires configuration, storage, the shopping service layer and HTTP routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

#![deny(unsafe_code)]

//! # Larder
//!
//! A multi-tenant service that turns recipes and meal plans into shopping
//! lists. Each tenant is a *space*; users, recipes, meal plans and shopping
//! lists never cross space boundaries.
//!
//! ## Architecture
//!
//! - **Config**: environment-driven [`config::ServerConfig`]
//! - **Database**: `SQLite` storage with one manager per aggregate
//! - **Shopping**: ingredient resolution, list editing and the visibility gate
//! - **Routes**: thin axum handlers that authenticate and delegate
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use larder::config::ServerConfig;
//! use larder::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Larder configured on port {}", config.http_port);
//!     Ok(())
//! }
//! ```

/// JWT issuing and bearer authentication
pub mod auth;
/// Environment-based configuration
pub mod config;
/// `SQLite` storage and per-aggregate managers
pub mod database;
/// Recipe import from JSON documents
pub mod import;
/// Structured logging setup
pub mod logging;
/// Shared state handed to routers
pub mod resources;
/// HTTP routes
pub mod routes;
/// Shopping list service layer
pub mod shopping;

/// Unified error handling, re-exported from `larder-core`
pub use larder_core::errors;
/// Application constants, re-exported from `larder-core`
pub use larder_core::constants;
