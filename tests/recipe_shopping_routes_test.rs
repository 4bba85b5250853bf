// ABOUTME: HTTP integration tests for adding recipes to the shopping list
// ABOUTME: Covers nested recipe expansion, scaling, narrowing, sharing and verb handling
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use axum::http::{Method, StatusCode};
use common::{assert_close, total_amount, RecipeShape, TestApp, FIXTURE_SERVINGS};
use helpers::axum_test::AxumTestRequest;
use larder::database::{ShoppingListRecipe, UpdatePreference};
use serde_json::json;
use uuid::Uuid;

fn shopping_uri(recipe_id: Uuid) -> String {
    format!("/api/recipe/{recipe_id}/shopping")
}

async fn add_to_list(app: &TestApp, token: &str, recipe_id: Uuid, body: serde_json::Value) {
    AxumTestRequest::put(&shopping_uri(recipe_id))
        .bearer(token)
        .json(&body)
        .send(app.router())
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

async fn only_list_recipe(app: &TestApp, token: &str) -> ShoppingListRecipe {
    let mut lists: Vec<ShoppingListRecipe> = AxumTestRequest::get("/api/shopping-list-recipe")
        .bearer(token)
        .send(app.router())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(lists.len(), 1);
    lists.remove(0)
}

#[tokio::test]
async fn test_flat_recipe_adds_one_entry_per_ingredient() {
    let app = TestApp::new().await.unwrap();
    let cook = app.user("cook").await.unwrap();
    let fixture = app.recipe(&cook, RecipeShape::default()).await.unwrap();

    AxumTestRequest::put(&shopping_uri(fixture.recipe.id))
        .bearer(&cook.token)
        .send(app.router())
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let entries = app.visible_entries(&cook).await.unwrap();
    assert_eq!(entries.len(), 10);
    assert_close(total_amount(&entries), 55.0);
}

#[tokio::test]
async fn test_nested_recipes_are_expanded() {
    let app = TestApp::new().await.unwrap();
    let cook = app.user("cook").await.unwrap();

    let shapes = [
        (RecipeShape::default(), 10),
        (
            RecipeShape {
                step_recipe: true,
                ..Default::default()
            },
            20,
        ),
        (
            RecipeShape {
                food_recipe: true,
                ..Default::default()
            },
            19,
        ),
        (
            RecipeShape {
                step_recipe: true,
                food_recipe: true,
                ..Default::default()
            },
            29,
        ),
    ];

    for (shape, expected) in shapes {
        let fixture = app.recipe(&cook, shape).await.unwrap();
        assert_eq!(fixture.expected_entries(), expected);

        add_to_list(&app, &cook.token, fixture.recipe.id, json!({})).await;

        let entries = app
            .database()
            .shopping()
            .list_entries(
                cook.id(),
                cook.user.space_id,
                &larder::database::EntryFilter {
                    checked: larder::database::CheckedFilter::Both,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let for_recipe = entries
            .iter()
            .filter(|e| {
                e.recipe_mealplan
                    .as_ref()
                    .is_some_and(|lr| lr.recipe == Some(fixture.recipe.id))
            })
            .count();
        assert_eq!(for_recipe, expected, "shape {shape:?}");
    }
}

#[tokio::test]
async fn test_servings_scale_every_entry() {
    let app = TestApp::new().await.unwrap();
    let cook = app.user("cook").await.unwrap();
    let fixture = app
        .recipe(
            &cook,
            RecipeShape {
                step_recipe: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    add_to_list(
        &app,
        &cook.token,
        fixture.recipe.id,
        json!({ "servings": FIXTURE_SERVINGS * 3.0 }),
    )
    .await;

    let entries = app.visible_entries(&cook).await.unwrap();
    assert_eq!(entries.len(), 20);
    assert_close(total_amount(&entries), 110.0 * 3.0);

    let list = only_list_recipe(&app, &cook.token).await;
    assert_close(list.servings, FIXTURE_SERVINGS * 3.0);
}

#[tokio::test]
async fn test_rescale_existing_list() {
    let app = TestApp::new().await.unwrap();
    let cook = app.user("cook").await.unwrap();
    let fixture = app.recipe(&cook, RecipeShape::default()).await.unwrap();

    add_to_list(&app, &cook.token, fixture.recipe.id, json!({})).await;
    let list = only_list_recipe(&app, &cook.token).await;

    for _ in 0..2 {
        add_to_list(
            &app,
            &cook.token,
            fixture.recipe.id,
            json!({ "list_recipe": list.id, "servings": 4 }),
        )
        .await;
    }

    let entries = app.visible_entries(&cook).await.unwrap();
    assert_eq!(entries.len(), 10);
    assert_close(total_amount(&entries), 110.0);
}

#[tokio::test]
async fn test_narrow_then_widen_ingredients() {
    let app = TestApp::new().await.unwrap();
    let cook = app.user("cook").await.unwrap();
    let fixture = app.recipe(&cook, RecipeShape::default()).await.unwrap();

    add_to_list(&app, &cook.token, fixture.recipe.id, json!({})).await;
    let list = only_list_recipe(&app, &cook.token).await;

    let manual = AxumTestRequest::post("/api/shopping-list-entry")
        .bearer(&cook.token)
        .json(&json!({ "amount": 1, "unit": "bag", "list_recipe": list.id }))
        .send(app.router())
        .await
        .assert_status(StatusCode::CREATED)
        .json::<serde_json::Value>();

    let keep: Vec<Uuid> = fixture.ingredients[..4].iter().map(|i| i.id).collect();
    add_to_list(
        &app,
        &cook.token,
        fixture.recipe.id,
        json!({ "list_recipe": list.id, "ingredients": keep }),
    )
    .await;

    let entries = app.visible_entries(&cook).await.unwrap();
    assert_eq!(entries.len(), 5);
    assert!(entries
        .iter()
        .any(|e| e.id.to_string() == manual["id"].as_str().unwrap()));
    assert_close(total_amount(&entries), 1.0 + 2.0 + 3.0 + 4.0 + 1.0);

    let all: Vec<Uuid> = fixture.ingredients.iter().map(|i| i.id).collect();
    add_to_list(
        &app,
        &cook.token,
        fixture.recipe.id,
        json!({ "list_recipe": list.id, "ingredients": all }),
    )
    .await;

    let entries = app.visible_entries(&cook).await.unwrap();
    assert_eq!(entries.len(), 11);
    assert_close(total_amount(&entries), 56.0);
}

#[tokio::test]
async fn test_ingredient_subset_on_new_list() {
    let app = TestApp::new().await.unwrap();
    let cook = app.user("cook").await.unwrap();
    let fixture = app.recipe(&cook, RecipeShape::default()).await.unwrap();

    let keep: Vec<Uuid> = fixture.ingredients[5..].iter().map(|i| i.id).collect();
    add_to_list(&app, &cook.token, fixture.recipe.id, json!({ "ingredients": keep })).await;

    let entries = app.visible_entries(&cook).await.unwrap();
    assert_eq!(entries.len(), 5);
    assert_close(total_amount(&entries), 6.0 + 7.0 + 8.0 + 9.0 + 10.0);
}

#[tokio::test]
async fn test_list_recipe_of_other_recipe_is_not_found() {
    let app = TestApp::new().await.unwrap();
    let cook = app.user("cook").await.unwrap();
    let first = app.recipe(&cook, RecipeShape::default()).await.unwrap();
    let second = app.recipe(&cook, RecipeShape::default()).await.unwrap();

    add_to_list(&app, &cook.token, first.recipe.id, json!({})).await;
    let list = only_list_recipe(&app, &cook.token).await;

    AxumTestRequest::put(&shopping_uri(second.recipe.id))
        .bearer(&cook.token)
        .json(&json!({ "list_recipe": list.id, "servings": 4 }))
        .send(app.router())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_other_verbs_are_not_allowed() {
    let app = TestApp::new().await.unwrap();
    let cook = app.user("cook").await.unwrap();
    let outsider = app.user_in_other_space("outsider").await.unwrap();
    let fixture = app.recipe(&cook, RecipeShape::default()).await.unwrap();
    let uri = shopping_uri(fixture.recipe.id);

    for method in [Method::GET, Method::POST, Method::DELETE, Method::PATCH] {
        for token in [None, Some(&cook.token), Some(&outsider.token)] {
            let mut request = AxumTestRequest::new(method.clone(), &uri);
            if let Some(token) = token {
                request = request.bearer(token);
            }
            request
                .send(app.router())
                .await
                .assert_status(StatusCode::METHOD_NOT_ALLOWED);
        }
    }
    assert!(app.visible_entries(&cook).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recipe_visibility() {
    let app = TestApp::new().await.unwrap();
    let cook = app.user("cook").await.unwrap();
    let roommate = app.user("roommate").await.unwrap();
    let outsider = app.user_in_other_space("outsider").await.unwrap();

    let public = app.recipe(&cook, RecipeShape::default()).await.unwrap();
    let private = app
        .recipe(
            &cook,
            RecipeShape {
                private: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    AxumTestRequest::put(&shopping_uri(public.recipe.id))
        .bearer(&outsider.token)
        .send(app.router())
        .await
        .assert_status(StatusCode::NOT_FOUND);

    AxumTestRequest::put(&shopping_uri(private.recipe.id))
        .bearer(&roommate.token)
        .send(app.router())
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.database()
        .recipes()
        .share_recipe(private.recipe.id, roommate.id())
        .await
        .unwrap();
    add_to_list(&app, &roommate.token, private.recipe.id, json!({})).await;
    add_to_list(&app, &roommate.token, public.recipe.id, json!({})).await;
    assert_eq!(app.visible_entries(&roommate).await.unwrap().len(), 20);

    AxumTestRequest::put(&shopping_uri(Uuid::new_v4()))
        .bearer(&cook.token)
        .send(app.router())
        .await
        .assert_status(StatusCode::NOT_FOUND);

    AxumTestRequest::put("/api/recipe/not-a-uuid/shopping")
        .bearer(&cook.token)
        .send(app.router())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unauthenticated_put_is_rejected() {
    let app = TestApp::new().await.unwrap();
    let cook = app.user("cook").await.unwrap();
    let fixture = app.recipe(&cook, RecipeShape::default()).await.unwrap();

    AxumTestRequest::put(&shopping_uri(fixture.recipe.id))
        .send(app.router())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    AxumTestRequest::put(&shopping_uri(fixture.recipe.id))
        .bearer("not-a-token")
        .send(app.router())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_shared_list_becomes_visible() {
    let app = TestApp::new().await.unwrap();
    let cook = app.user("cook").await.unwrap();
    let partner = app.user("partner").await.unwrap();
    let fixture = app
        .recipe(
            &cook,
            RecipeShape {
                step_recipe: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    add_to_list(&app, &cook.token, fixture.recipe.id, json!({})).await;
    assert_eq!(app.visible_entries(&cook).await.unwrap().len(), 20);
    assert!(app.visible_entries(&partner).await.unwrap().is_empty());

    app.database()
        .users()
        .update_preference(
            cook.id(),
            cook.user.space_id,
            &UpdatePreference {
                shopping_share: Some(vec![partner.id()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(app.visible_entries(&partner).await.unwrap().len(), 20);

    // sharing is one-directional
    let own = app.recipe(&partner, RecipeShape::default()).await.unwrap();
    add_to_list(&app, &partner.token, own.recipe.id, json!({})).await;
    assert_eq!(app.visible_entries(&cook).await.unwrap().len(), 20);
    assert_eq!(app.visible_entries(&partner).await.unwrap().len(), 30);
}

#[tokio::test]
async fn test_shared_user_can_edit_list() {
    let app = TestApp::new().await.unwrap();
    let cook = app.user("cook").await.unwrap();
    let partner = app.user("partner").await.unwrap();
    let fixture = app.recipe(&cook, RecipeShape::default()).await.unwrap();

    add_to_list(&app, &cook.token, fixture.recipe.id, json!({})).await;
    let list = only_list_recipe(&app, &cook.token).await;

    AxumTestRequest::put(&shopping_uri(fixture.recipe.id))
        .bearer(&partner.token)
        .json(&json!({ "list_recipe": list.id, "servings": 1 }))
        .send(app.router())
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.database()
        .users()
        .update_preference(
            cook.id(),
            cook.user.space_id,
            &UpdatePreference {
                shopping_share: Some(vec![partner.id()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    add_to_list(
        &app,
        &partner.token,
        fixture.recipe.id,
        json!({ "list_recipe": list.id, "servings": 1 }),
    )
    .await;
    assert_close(total_amount(&app.visible_entries(&cook).await.unwrap()), 27.5);
}

#[tokio::test]
async fn test_shared_user_narrows_and_widens_owner_list() {
    let app = TestApp::new().await.unwrap();
    let cook = app.user("cook").await.unwrap();
    let partner = app.user("partner").await.unwrap();
    let fixture = app.recipe(&cook, RecipeShape::default()).await.unwrap();

    app.database()
        .users()
        .update_preference(
            cook.id(),
            cook.user.space_id,
            &UpdatePreference {
                shopping_share: Some(vec![partner.id()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    add_to_list(&app, &cook.token, fixture.recipe.id, json!({})).await;
    let list = only_list_recipe(&app, &partner.token).await;

    let keep: Vec<Uuid> = fixture.ingredients[3..].iter().map(|i| i.id).collect();
    add_to_list(
        &app,
        &partner.token,
        fixture.recipe.id,
        json!({ "list_recipe": list.id, "ingredients": keep }),
    )
    .await;
    assert_eq!(app.visible_entries(&cook).await.unwrap().len(), 7);
    assert_eq!(app.visible_entries(&partner).await.unwrap().len(), 7);

    let all: Vec<Uuid> = fixture.ingredients.iter().map(|i| i.id).collect();
    add_to_list(
        &app,
        &partner.token,
        fixture.recipe.id,
        json!({ "list_recipe": list.id, "ingredients": all }),
    )
    .await;

    let entries = app.visible_entries(&cook).await.unwrap();
    assert_eq!(entries.len(), 10);
    assert_close(total_amount(&entries), 55.0);
    assert!(entries.iter().all(|e| e.created_by.id == cook.id()));
    assert_eq!(app.visible_entries(&partner).await.unwrap().len(), 10);
}

#[tokio::test]
async fn test_invalid_bodies_are_rejected() {
    let app = TestApp::new().await.unwrap();
    let cook = app.user("cook").await.unwrap();
    let fixture = app.recipe(&cook, RecipeShape::default()).await.unwrap();

    AxumTestRequest::put(&shopping_uri(fixture.recipe.id))
        .bearer(&cook.token)
        .json(&json!({ "servings": 0 }))
        .send(app.router())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    AxumTestRequest::put(&shopping_uri(fixture.recipe.id))
        .bearer(&cook.token)
        .json(&json!({ "servings": "lots" }))
        .send(app.router())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    assert!(app.visible_entries(&cook).await.unwrap().is_empty());
}
