use nestplan_core::selection::resolve_choice;
use nestplan_core::{
    expand_slots, AggregatedNeeds, DraftPlanItem, SlotScratch, StatePatch, WorkflowState,
    WorkflowStep,
};

use crate::engine::WorkflowEngine;

impl WorkflowEngine {
    pub(crate) fn step_expand_slots(&self, state: &WorkflowState) -> StatePatch {
        let Some(calendar) = &state.confirmed_calendar else {
            return StatePatch::failed("no confirmed calendar to expand");
        };

        let slots = expand_slots(calendar, state.start_date, state.days_to_generate);
        tracing::info!(thread_id = %state.thread_id, slots = slots.len(), "expanded meal slots");

        StatePatch {
            meal_slots: Some(slots),
            current_slot_index: Some(0),
            step: Some(WorkflowStep::PlanSlot),
            ..StatePatch::default()
        }
    }

    /// Plans the slot under the cursor: resolve profiles, aggregate needs,
    /// query candidates, and let the LLM pick. Each lookup degrades to an
    /// empty result on failure; a slot never fails the thread, it falls back
    /// to a placeholder instead.
    pub(crate) async fn step_plan_slot(&self, state: &WorkflowState) -> StatePatch {
        let slot = &state.meal_slots[state.current_slot_index];

        let profiles = match self.profiles.find_by_names(&slot.attendees).await {
            Ok(profiles) => profiles,
            Err(e) => {
                tracing::warn!(date = %slot.date, error = %e, "profile lookup failed");
                Vec::new()
            }
        };
        let needs = AggregatedNeeds::from_profiles(&profiles);

        let candidates = match self
            .recipes
            .find_candidates(&needs, slot.meal_type, self.settings.candidate_limit)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(date = %slot.date, error = %e, "candidate lookup failed");
                Vec::new()
            }
        };

        let selection = if candidates.is_empty() {
            None
        } else {
            let already: Vec<String> = state
                .draft_plan_items
                .iter()
                .filter_map(|item| item.chosen.recipe().map(|recipe| recipe.name.clone()))
                .collect();
            match self.selector.choose(&candidates, &needs, slot.meal_type, &already).await {
                Ok(selection) => Some(selection),
                Err(e) => {
                    tracing::warn!(date = %slot.date, error = %e, "recipe selection failed");
                    None
                }
            }
        };

        let chosen = resolve_choice(&candidates, selection.as_ref());
        StatePatch {
            slot_scratch: Some(SlotScratch {
                attendee_profiles: profiles,
                aggregated_needs: needs,
                candidates,
                chosen: Some(chosen),
            }),
            step: Some(WorkflowStep::StoreSlot),
            ..StatePatch::default()
        }
    }

    /// Commits the scratch as a draft item, advances the cursor, and clears
    /// the scratch so the next slot starts clean.
    pub(crate) fn step_store_slot(&self, state: &WorkflowState) -> StatePatch {
        let Some(scratch) = state.slot_scratch.clone() else {
            return StatePatch::failed("slot scratch missing at store");
        };
        let Some(chosen) = scratch.chosen else {
            return StatePatch::failed("no chosen recipe in slot scratch");
        };
        let Some(slot) = state.meal_slots.get(state.current_slot_index) else {
            return StatePatch::failed("slot cursor out of range at store");
        };

        let item = DraftPlanItem {
            day: slot.day.clone(),
            date: slot.date,
            meal_type: slot.meal_type,
            attendees: slot.attendees.clone(),
            chosen,
            candidates: scratch.candidates,
            aggregated_needs: scratch.aggregated_needs,
            attendee_profiles: scratch.attendee_profiles,
        };

        StatePatch {
            push_draft_item: Some(item),
            current_slot_index: Some(state.current_slot_index + 1),
            clear_slot_scratch: true,
            step: Some(WorkflowStep::PlanSlot),
            ..StatePatch::default()
        }
    }
}
