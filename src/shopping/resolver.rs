// ABOUTME: Resolves a recipe into the flat, scaled ingredient list a shopping list is built from
// ABOUTME: Expands step recipes and food recipes, skips headers, ignored and on-hand foods
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Larder Contributors

//! Recipe ingredient resolution
//!
//! Resolution runs in two phases. [`RecipeGraph::load`] pulls the root recipe
//! and every recipe reachable from it into memory, then
//! [`RecipeGraph::resolve`] walks that graph without touching the database.
//! Keeping the walk pure lets it run before a write transaction is opened.

use crate::database::{IngredientLine, Recipe, RecipesManager, Step, UserPreference};
use larder_core::constants::limits::MAX_RECIPE_DEPTH;
use larder_core::errors::AppResult;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};
use uuid::Uuid;

/// Preference switches that change what resolution returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Expand step recipes and food recipes
    pub include_related: bool,
    /// Skip foods the caller has on hand
    pub exclude_onhand: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            include_related: true,
            exclude_onhand: false,
        }
    }
}

impl From<&UserPreference> for ResolveOptions {
    fn from(prefs: &UserPreference) -> Self {
        Self {
            include_related: prefs.mealplan_autoinclude_related,
            exclude_onhand: prefs.mealplan_autoexclude_onhand,
        }
    }
}

/// One ingredient, scaled to the requested servings
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIngredient {
    /// Source ingredient
    pub ingredient_id: Uuid,
    /// Recipe the ingredient belongs to (root or nested)
    pub recipe_id: Uuid,
    /// Food to buy
    pub food_id: Option<Uuid>,
    /// Unit name
    pub unit: Option<String>,
    /// Scaled amount
    pub amount: f64,
}

#[derive(Debug, Clone)]
struct StepNode {
    step_recipe_id: Option<Uuid>,
    ingredients: Vec<IngredientLine>,
}

#[derive(Debug, Clone)]
struct RecipeNode {
    servings: f64,
    steps: Vec<StepNode>,
}

/// A recipe plus every recipe reachable from it, held in memory
#[derive(Debug, Clone)]
pub struct RecipeGraph {
    root: Uuid,
    nodes: HashMap<Uuid, RecipeNode>,
}

impl RecipeGraph {
    /// Load `root` and, when related recipes are included, everything it embeds
    ///
    /// Nested recipes are looked up in the root's space. Dangling references
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails
    pub async fn load(
        recipes: &RecipesManager,
        root: &Recipe,
        user_id: Uuid,
        options: ResolveOptions,
    ) -> AppResult<Self> {
        let mut nodes = HashMap::new();
        let mut queue = VecDeque::from([(root.id, root.servings)]);
        let mut seen = HashSet::from([root.id]);

        while let Some((recipe_id, servings)) = queue.pop_front() {
            let steps = recipes.steps(recipe_id).await?;
            let lines = recipes.ingredient_lines(recipe_id, user_id).await?;
            let node = build_node(servings, &steps, lines);

            if options.include_related {
                let related = node.steps.iter().flat_map(|step| {
                    step.ingredients
                        .iter()
                        .filter_map(|line| line.food_recipe_id)
                        .chain(step.step_recipe_id)
                });
                for related_id in related.collect::<Vec<_>>() {
                    if !seen.insert(related_id) {
                        continue;
                    }
                    match recipes.get_recipe(related_id, root.space_id).await? {
                        Some(nested) => queue.push_back((nested.id, nested.servings)),
                        None => warn!(recipe.id = %related_id, "Skipping missing related recipe"),
                    }
                }
            }

            nodes.insert(recipe_id, node);
        }

        debug!(recipe.id = %root.id, recipes = nodes.len(), "Loaded recipe graph");
        Ok(Self {
            root: root.id,
            nodes,
        })
    }

    /// Flatten the graph into scaled ingredients for `servings`
    #[must_use]
    pub fn resolve(&self, servings: f64, options: ResolveOptions) -> Vec<ResolvedIngredient> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.walk(self.root, servings, options, &mut path, &mut out);
        out
    }

    fn walk(
        &self,
        recipe_id: Uuid,
        servings: f64,
        options: ResolveOptions,
        path: &mut Vec<Uuid>,
        out: &mut Vec<ResolvedIngredient>,
    ) {
        let Some(node) = self.nodes.get(&recipe_id) else {
            return;
        };
        if path.contains(&recipe_id) || path.len() >= MAX_RECIPE_DEPTH {
            warn!(recipe.id = %recipe_id, depth = path.len(), "Cutting recursive recipe reference");
            return;
        }
        path.push(recipe_id);

        let factor = servings / node.servings;
        for step in &node.steps {
            for line in &step.ingredients {
                if line.is_header || line.ignore_shopping {
                    continue;
                }
                if options.exclude_onhand && line.on_hand {
                    continue;
                }
                if options.include_related {
                    if let Some(food_recipe) = line.food_recipe_id {
                        if self.expandable(food_recipe, path) {
                            self.walk(food_recipe, servings, options, path, out);
                            continue;
                        }
                    }
                }
                out.push(ResolvedIngredient {
                    ingredient_id: line.id,
                    recipe_id,
                    food_id: line.food_id,
                    unit: line.unit.clone(),
                    amount: if line.no_amount {
                        0.0
                    } else {
                        line.amount * factor
                    },
                });
            }

            if options.include_related {
                if let Some(step_recipe) = step.step_recipe_id {
                    self.walk(step_recipe, servings, options, path, out);
                }
            }
        }

        path.pop();
    }

    /// A food recipe replaces its ingredient only when it can actually be expanded
    fn expandable(&self, recipe_id: Uuid, path: &[Uuid]) -> bool {
        self.nodes.contains_key(&recipe_id)
            && !path.contains(&recipe_id)
            && path.len() < MAX_RECIPE_DEPTH
    }
}

fn build_node(servings: f64, steps: &[Step], lines: Vec<IngredientLine>) -> RecipeNode {
    let mut by_step: HashMap<Uuid, Vec<IngredientLine>> = HashMap::new();
    for line in lines {
        by_step.entry(line.step_id).or_default().push(line);
    }

    RecipeNode {
        servings,
        steps: steps
            .iter()
            .map(|step| StepNode {
                step_recipe_id: step.step_recipe_id,
                ingredients: by_step.remove(&step.id).unwrap_or_default(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(amount: f64) -> IngredientLine {
        IngredientLine {
            id: Uuid::new_v4(),
            step_id: Uuid::nil(),
            food_id: Some(Uuid::new_v4()),
            unit: Some("g".into()),
            amount,
            is_header: false,
            no_amount: false,
            ignore_shopping: false,
            food_recipe_id: None,
            on_hand: false,
        }
    }

    fn node(servings: f64, ingredients: Vec<IngredientLine>, step_recipe: Option<Uuid>) -> RecipeNode {
        RecipeNode {
            servings,
            steps: vec![StepNode {
                step_recipe_id: step_recipe,
                ingredients,
            }],
        }
    }

    fn graph(root: Uuid, nodes: Vec<(Uuid, RecipeNode)>) -> RecipeGraph {
        RecipeGraph {
            root,
            nodes: nodes.into_iter().collect(),
        }
    }

    #[test]
    fn test_amounts_scale_with_servings() {
        let root = Uuid::new_v4();
        let g = graph(root, vec![(root, node(4.0, vec![line(100.0), line(2.0)], None))]);

        let same = g.resolve(4.0, ResolveOptions::default());
        assert_eq!(same.len(), 2);
        assert!((same[0].amount - 100.0).abs() < f64::EPSILON);

        let doubled = g.resolve(8.0, ResolveOptions::default());
        assert!((doubled[0].amount - 200.0).abs() < f64::EPSILON);
        assert!((doubled[1].amount - 4.0).abs() < f64::EPSILON);

        let halved = g.resolve(2.0, ResolveOptions::default());
        assert!((halved[0].amount - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_step_recipe_appends_after_step_and_scales_by_own_servings() {
        let root = Uuid::new_v4();
        let nested = Uuid::new_v4();
        let g = graph(
            root,
            vec![
                (root, node(2.0, vec![line(10.0)], Some(nested))),
                (nested, node(1.0, vec![line(5.0), line(1.0)], None)),
            ],
        );

        let resolved = g.resolve(2.0, ResolveOptions::default());
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0].recipe_id, root);
        assert_eq!(resolved[1].recipe_id, nested);
        assert!((resolved[1].amount - 10.0).abs() < f64::EPSILON);

        let flat = g.resolve(
            2.0,
            ResolveOptions {
                include_related: false,
                exclude_onhand: false,
            },
        );
        assert_eq!(flat.len(), 1);
    }

    #[test]
    fn test_food_recipe_replaces_ingredient() {
        let root = Uuid::new_v4();
        let sauce = Uuid::new_v4();
        let mut backed = line(1.0);
        backed.food_recipe_id = Some(sauce);
        let g = graph(
            root,
            vec![
                (root, node(1.0, vec![line(1.0), backed.clone()], None)),
                (sauce, node(1.0, vec![line(3.0), line(4.0), line(5.0)], None)),
            ],
        );

        let resolved = g.resolve(1.0, ResolveOptions::default());
        assert_eq!(resolved.len(), 4);
        assert!(resolved.iter().all(|r| r.ingredient_id != backed.id));

        let flat = g.resolve(
            1.0,
            ResolveOptions {
                include_related: false,
                exclude_onhand: false,
            },
        );
        assert_eq!(flat.len(), 2);
        assert!(flat.iter().any(|r| r.ingredient_id == backed.id));
    }

    #[test]
    fn test_skips_headers_ignored_and_onhand() {
        let root = Uuid::new_v4();
        let mut header = line(0.0);
        header.is_header = true;
        let mut ignored = line(1.0);
        ignored.ignore_shopping = true;
        let mut on_hand = line(1.0);
        on_hand.on_hand = true;
        let mut to_taste = line(3.0);
        to_taste.no_amount = true;

        let g = graph(
            root,
            vec![(
                root,
                node(1.0, vec![header, ignored, on_hand, to_taste, line(1.0)], None),
            )],
        );

        let kept = g.resolve(1.0, ResolveOptions::default());
        assert_eq!(kept.len(), 3);
        assert!(kept[1].amount.abs() < f64::EPSILON);

        let without_onhand = g.resolve(
            1.0,
            ResolveOptions {
                include_related: true,
                exclude_onhand: true,
            },
        );
        assert_eq!(without_onhand.len(), 2);
    }

    #[test]
    fn test_cycles_are_cut() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let g = graph(
            a,
            vec![
                (a, node(1.0, vec![line(1.0)], Some(b))),
                (b, node(1.0, vec![line(1.0)], Some(a))),
            ],
        );

        assert_eq!(g.resolve(1.0, ResolveOptions::default()).len(), 2);
    }
}
