// ABOUTME: Core types and constants for the Larder shopping-list service
// ABOUTME: Foundation crate with error handling and domain constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

#![deny(unsafe_code)]

//! # Larder Core
//!
//! Foundation crate providing shared types and constants for the Larder
//! shopping-list service. It changes rarely, which keeps incremental builds
//! of the server crate cheap.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Application-wide constants organized by domain

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants and configuration values organized by domain
pub mod constants;
