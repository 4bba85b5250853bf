// ABOUTME: Shopping list service layer sitting between the HTTP routes and the database
// ABOUTME: Resolution, list editing and the visibility gate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

/// List creation, editing and meal plan rescaling
pub mod editor;
/// Recipe ingredient resolution and scaling
pub mod resolver;
/// Creator-or-shared visibility checks
pub mod visibility;

pub use editor::{ManualEntryRequest, RecipeShoppingRequest, ShoppingListEditor};
pub use resolver::{RecipeGraph, ResolveOptions, ResolvedIngredient};
pub use visibility::Visibility;
