use std::collections::{HashMap, HashSet};

use nestplan_core::{
    AggregatedNeeds, CandidateRecipe, ChosenRecipe, HitlPayload, HitlResponse, HitlStep,
    ModificationContext, ModificationItem, NewMealPlanEntry, RecipeDetails, RecipeId, SaveStatus,
    StatePatch, UiPlanItem, WorkflowState, WorkflowStatus, WorkflowStep,
};

use crate::engine::WorkflowEngine;

impl WorkflowEngine {
    /// Enriches the draft plan with display details in one batched catalog
    /// read, then pauses for the full-plan review.
    pub(crate) async fn step_assemble_review(&self, state: &WorkflowState) -> StatePatch {
        let mut ids: Vec<RecipeId> = Vec::new();
        let mut seen = HashSet::new();
        for draft in &state.draft_plan_items {
            for recipe in draft.chosen.recipe().into_iter().chain(draft.candidates.iter()) {
                if seen.insert(recipe.id.0.clone()) {
                    ids.push(recipe.id.clone());
                }
            }
        }

        let details: HashMap<String, RecipeDetails> = match self.recipes.details_by_ids(&ids).await
        {
            Ok(rows) => rows.into_iter().map(|row| (row.id.0.clone(), row)).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "detail lookup failed, review will lack macros");
                HashMap::new()
            }
        };

        let items: Vec<UiPlanItem> = state
            .draft_plan_items
            .iter()
            .map(|draft| {
                let chosen_details =
                    draft.chosen.recipe().and_then(|recipe| details.get(&recipe.id.0));
                let alternatives = draft
                    .candidates
                    .iter()
                    .filter(|candidate| {
                        draft.chosen.recipe().map(|recipe| recipe.id != candidate.id).unwrap_or(true)
                    })
                    .cloned()
                    .collect();

                UiPlanItem {
                    day: draft.day.clone(),
                    date: draft.date,
                    meal_type: draft.meal_type,
                    attendees: draft.attendees.clone(),
                    recipe: draft.chosen.clone(),
                    image_url: chosen_details
                        .and_then(|d| d.image_url.clone())
                        .or_else(|| draft.chosen.recipe().and_then(|r| r.image_url.clone())),
                    fat_grams_portion: chosen_details.and_then(|d| d.fat_grams_portion),
                    carb_grams_portion: chosen_details.and_then(|d| d.carb_grams_portion),
                    protein_grams_portion: chosen_details.and_then(|d| d.protein_grams_portion),
                    calories_kcal: chosen_details.and_then(|d| d.calories_kcal),
                    alternatives,
                    aggregated_needs: draft.aggregated_needs.clone(),
                    attendee_profiles: draft.attendee_profiles.clone(),
                }
            })
            .collect();

        StatePatch {
            ui_plan: Some(items.clone()),
            step: Some(WorkflowStep::AwaitPlanReview),
            status: Some(WorkflowStatus::Paused),
            hitl_step_required: Some(Some(HitlStep::ReviewFullPlan)),
            hitl_payload: Some(Some(HitlPayload::PlanReview { items })),
            ..StatePatch::default()
        }
    }

    /// Consumes the review response, applying any per-slot recipe swaps the
    /// reviewer requested, keyed `{day}_{meal_type}`.
    pub(crate) fn step_apply_review(&self, state: &WorkflowState) -> StatePatch {
        match &state.hitl_response {
            Some(HitlResponse::ReviewPlan { confirmed_plan, recipe_swaps }) => {
                let swaps = recipe_swaps.clone().unwrap_or_default();
                let items: Vec<UiPlanItem> = confirmed_plan
                    .iter()
                    .cloned()
                    .map(|mut item| {
                        if let Some(swap) = swaps.get(&item.swap_key()) {
                            let replacement = item
                                .alternatives
                                .iter()
                                .find(|candidate| candidate.id == swap.id)
                                .cloned()
                                .unwrap_or_else(|| CandidateRecipe {
                                    id: swap.id.clone(),
                                    name: swap.name.clone(),
                                    provider_id: None,
                                    image_url: None,
                                });
                            tracing::info!(
                                slot = %item.swap_key(),
                                recipe = %replacement.name,
                                "applying reviewer recipe swap"
                            );
                            item.recipe = ChosenRecipe::Selected { recipe: replacement };
                        }
                        item
                    })
                    .collect();

                StatePatch {
                    ui_plan: Some(items),
                    step: Some(WorkflowStep::PersistPlan),
                    hitl_step_required: Some(None),
                    hitl_payload: Some(None),
                    hitl_response: Some(None),
                    ..StatePatch::default()
                }
            }
            _ => StatePatch::failed("expected a plan review on resume"),
        }
    }

    /// Writes the confirmed plan in one all-or-nothing batch. Placeholder
    /// slots are skipped, not persisted. On success the modification queue
    /// is built from the persisted entries.
    pub(crate) async fn step_persist_plan(&self, state: &WorkflowState) -> StatePatch {
        let Some(plan_id) = state.plan_id.clone() else {
            return StatePatch::failed("no plan id at persist");
        };
        let items = state.ui_plan.clone().unwrap_or_default();

        let mut entries = Vec::new();
        let mut queue = Vec::new();
        for item in &items {
            let Some(recipe) = item.recipe.recipe() else {
                tracing::info!(
                    date = %item.date,
                    meal_type = %item.meal_type,
                    "placeholder slot skipped at persist"
                );
                continue;
            };

            entries.push(NewMealPlanEntry {
                meal_date: item.date,
                meal_type: item.meal_type,
                primary_recipe_id: recipe.id.clone(),
                servings: item.attendees.len() as u32,
                notes: describe_needs(&item.aggregated_needs),
                modification_context: ModificationContext {
                    base_recipe_id: recipe.id.clone(),
                    base_recipe_name: recipe.name.clone(),
                    aggregated_needs: item.aggregated_needs.clone(),
                    attendee_profiles: item.attendee_profiles.clone(),
                },
            });
            queue.push(ModificationItem {
                meal_date: item.date,
                meal_type: item.meal_type,
                recipe_id: recipe.id.clone(),
                recipe_name: recipe.name.clone(),
                provider_id: recipe.provider_id,
                attendees: item.attendees.clone(),
                attendee_profiles: item.attendee_profiles.clone(),
                aggregated_needs: item.aggregated_needs.clone(),
            });
        }

        if !entries.is_empty() {
            if let Err(e) = self.plans.insert_entries(&plan_id, &entries).await {
                let mut patch = StatePatch::failed(format!("persisting the plan failed: {e}"));
                patch.plan_saved_status = Some(SaveStatus::Failure);
                return patch;
            }
        }
        tracing::info!(
            thread_id = %state.thread_id,
            plan_id = %plan_id.0,
            entries = entries.len(),
            "plan persisted"
        );

        if queue.is_empty() {
            StatePatch {
                plan_saved_status: Some(SaveStatus::Success),
                modifications_completed: Some(true),
                step: Some(WorkflowStep::Done),
                status: Some(WorkflowStatus::Completed),
                ..StatePatch::default()
            }
        } else {
            StatePatch {
                plan_saved_status: Some(SaveStatus::Success),
                modification_queue: Some(queue),
                modification_cursor: Some(0),
                step: Some(WorkflowStep::ModifyEntry),
                status: Some(WorkflowStatus::RunningModifications),
                ..StatePatch::default()
            }
        }
    }
}

fn describe_needs(needs: &AggregatedNeeds) -> String {
    match (needs.allergies.is_empty(), needs.diets.is_empty()) {
        (true, true) => String::new(),
        (false, true) => format!("Allergies: {}.", needs.allergies.join(", ")),
        (true, false) => format!("Diets: {}.", needs.diets.join(", ")),
        (false, false) => format!(
            "Allergies: {}. Diets: {}.",
            needs.allergies.join(", "),
            needs.diets.join(", ")
        ),
    }
}
