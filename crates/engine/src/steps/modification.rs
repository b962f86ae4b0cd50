use nestplan_agent::fetch_with_retries;
use nestplan_core::{
    LiveRecipe, ModificationItem, ModificationOutcome, ModificationResult, NewParticipant,
    NewRecipeVersion, PlanId, StatePatch, UserProfile, WorkflowState, WorkflowStep,
};

use crate::engine::WorkflowEngine;

impl WorkflowEngine {
    /// Processes one modification queue item end to end. The cursor always
    /// advances, whatever happens: a bad item must never wedge the loop.
    pub(crate) async fn step_modify_entry(&self, state: &WorkflowState) -> StatePatch {
        let Some(plan_id) = state.plan_id.clone() else {
            return StatePatch::failed("no plan id in modification loop");
        };
        let item = state.modification_queue[state.modification_cursor].clone();

        let outcome = self.modify_one(&plan_id, &item).await;
        tracing::info!(
            thread_id = %state.thread_id,
            date = %item.meal_date,
            meal_type = %item.meal_type,
            outcome = ?outcome,
            "modification item processed"
        );

        StatePatch {
            push_modification_result: Some(ModificationResult {
                meal_date: item.meal_date,
                meal_type: item.meal_type,
                outcome,
            }),
            modification_cursor: Some(state.modification_cursor + 1),
            step: Some(WorkflowStep::ModifyEntry),
            ..StatePatch::default()
        }
    }

    async fn modify_one(&self, plan_id: &PlanId, item: &ModificationItem) -> ModificationOutcome {
        if item.attendees.is_empty() {
            return ModificationOutcome::NoAttendeesSkipped;
        }

        let entry_id = match self
            .plans
            .find_entry_id(plan_id, item.meal_date, item.meal_type)
            .await
        {
            Ok(Some(entry_id)) => entry_id,
            Ok(None) => return ModificationOutcome::EntryNotFound,
            Err(e) => {
                tracing::warn!(date = %item.meal_date, error = %e, "entry lookup failed");
                return ModificationOutcome::EntryNotFound;
            }
        };

        let profiles = self.profiles_for_item(item).await;
        if profiles.is_empty() {
            // Attendee names that resolve to no profiles leave nobody to
            // adapt for or assign; the entry keeps its base recipe untouched.
            tracing::warn!(
                date = %item.meal_date,
                attendees = ?item.attendees,
                "no profiles resolved for entry, skipping modification"
            );
            return ModificationOutcome::NoAttendeesSkipped;
        }

        let live = self.live_recipe_for_item(item).await;
        let version = self.build_version(item, live.as_ref(), &profiles).await;
        let is_modified = version.is_modified;
        let suitability = version.suitability_notes.clone();

        // On version-insert failure participants fall back to the unmodified
        // base recipe rather than losing their assignment entirely.
        let version_id = match self.plans.insert_recipe_version(&version).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(date = %item.meal_date, error = %e, "version insert failed");
                None
            }
        };
        let effective_modified = version_id.is_some() && is_modified;

        let notes = format!("Base recipe: {}. Assessment: {}", item.recipe_name, suitability);
        match self
            .plans
            .update_entry_notes(plan_id, item.meal_date, item.meal_type, &notes)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(date = %item.meal_date, "entry note update matched no row")
            }
            Err(e) => tracing::warn!(date = %item.meal_date, error = %e, "entry note update failed"),
        }

        let participants: Vec<NewParticipant> = profiles
            .iter()
            .map(|profile| NewParticipant {
                entry_id: entry_id.clone(),
                user_id: profile.id.clone(),
                assigned_recipe_id: item.recipe_id.clone(),
                recipe_version_id: version_id.clone(),
                is_modified_version: effective_modified,
                notes: suitability.clone(),
            })
            .collect();

        match self.plans.insert_participants(&participants).await {
            Ok(saved) => ModificationOutcome::Completed {
                is_modified: effective_modified,
                participants_saved: saved,
            },
            Err(e) => {
                tracing::warn!(date = %item.meal_date, error = %e, "participant insert failed");
                ModificationOutcome::ParticipantSaveFailed
            }
        }
    }

    /// Profiles ride along in the queue item; re-fetch only when absent.
    async fn profiles_for_item(&self, item: &ModificationItem) -> Vec<UserProfile> {
        if !item.attendee_profiles.is_empty() {
            return item.attendee_profiles.clone();
        }
        match self.profiles.find_by_names(&item.attendees).await {
            Ok(profiles) => profiles,
            Err(e) => {
                tracing::warn!(date = %item.meal_date, error = %e, "profile refetch failed");
                Vec::new()
            }
        }
    }

    async fn live_recipe_for_item(&self, item: &ModificationItem) -> Option<LiveRecipe> {
        let provider_id = item.provider_id?;
        match fetch_with_retries(
            self.recipe_info.as_ref(),
            provider_id,
            self.settings.rate_policy,
            self.settings.quota_policy,
        )
        .await
        {
            Ok(live) => Some(live),
            Err(e) => {
                tracing::warn!(provider_id, error = %e, "live recipe lookup failed");
                None
            }
        }
    }

    /// Exactly one version row per item: the LLM-adapted recipe when
    /// everything works, otherwise a snapshot of the original.
    async fn build_version(
        &self,
        item: &ModificationItem,
        live: Option<&LiveRecipe>,
        profiles: &[UserProfile],
    ) -> NewRecipeVersion {
        let Some(live) = live else {
            return NewRecipeVersion {
                name: item.recipe_name.clone(),
                source_recipe_id: Some(item.recipe_id.clone()),
                provider_id: item.provider_id,
                ingredients: Vec::new(),
                instructions: Vec::new(),
                image_url: None,
                nutrition: None,
                is_modified: false,
                suitability_notes: "Original recipe kept; live recipe data unavailable."
                    .to_string(),
            };
        };

        match self.modifier.modify(live, profiles).await {
            Ok(modified) => NewRecipeVersion {
                name: modified.name,
                source_recipe_id: Some(item.recipe_id.clone()),
                provider_id: item.provider_id,
                ingredients: modified.ingredients,
                instructions: modified.instructions,
                image_url: live.image_url.clone(),
                nutrition: live.nutrition.clone(),
                is_modified: modified.modifications_were_made,
                suitability_notes: modified.suitability_notes,
            },
            Err(e) => {
                tracing::warn!(provider_id = live.provider_id, error = %e, "recipe adaptation failed");
                NewRecipeVersion {
                    name: live.title.clone(),
                    source_recipe_id: Some(item.recipe_id.clone()),
                    provider_id: item.provider_id,
                    ingredients: live.ingredients.clone(),
                    instructions: live.instructions.clone(),
                    image_url: live.image_url.clone(),
                    nutrition: live.nutrition.clone(),
                    is_modified: false,
                    suitability_notes: format!("Original recipe kept; adaptation failed: {e}"),
                }
            }
        }
    }
}
