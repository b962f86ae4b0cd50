use std::collections::BTreeMap;
use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::calendar::AttendeeCalendar;
use crate::domain::plan::{
    DraftPlanItem, ModificationItem, PlanId, RecipeSwap, UiPlanItem,
};
use crate::domain::profile::{AggregatedNeeds, UserId, UserProfile};
use crate::domain::recipe::{CandidateRecipe, ChosenRecipe};
use crate::domain::slot::MealSlot;
use crate::errors::DomainError;
use crate::workflow::step::WorkflowStep;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Paused,
    RunningModifications,
    Completed,
    Error,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Running => "running",
            WorkflowStatus::Paused => "paused",
            WorkflowStatus::RunningModifications => "running_modifications",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Error => "error",
        }
    }
}

/// Which human input the paused workflow is waiting for. `Error` marks an
/// unrecoverable pause surfaced to the caller rather than a resumable one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlStep {
    ConfirmCalendar,
    ReviewFullPlan,
    Error,
}

/// What the caller is shown at a pause point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HitlPayload {
    Calendar { calendar: AttendeeCalendar },
    PlanReview { items: Vec<UiPlanItem> },
    Error { message: String },
}

/// Human input supplied on resume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HitlResponse {
    ConfirmCalendar {
        confirmed_calendar: AttendeeCalendar,
    },
    ReviewPlan {
        confirmed_plan: Vec<UiPlanItem>,
        #[serde(default)]
        recipe_swaps: Option<BTreeMap<String, RecipeSwap>>,
    },
}

impl HitlResponse {
    pub fn expected_step(&self) -> HitlStep {
        match self {
            HitlResponse::ConfirmCalendar { .. } => HitlStep::ConfirmCalendar,
            HitlResponse::ReviewPlan { .. } => HitlStep::ReviewFullPlan,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    pub user_id: UserId,
    pub start_date: NaiveDate,
    pub days_to_generate: u32,
    pub plan_description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Success,
    Failure,
}

/// Per-iteration outcome of the modification loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModificationOutcome {
    Completed { is_modified: bool, participants_saved: usize },
    NoAttendeesSkipped,
    EntryNotFound,
    ParticipantSaveFailed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModificationResult {
    pub meal_date: NaiveDate,
    pub meal_type: crate::domain::calendar::MealType,
    pub outcome: ModificationOutcome,
}

/// Scratch for the slot currently being planned; cleared when the slot's
/// draft item is stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotScratch {
    pub attendee_profiles: Vec<UserProfile>,
    pub aggregated_needs: AggregatedNeeds,
    pub candidates: Vec<CandidateRecipe>,
    pub chosen: Option<ChosenRecipe>,
}

/// The complete serializable workflow record for one logical thread.
/// Checkpointed after every step; a thread can be resumed from any
/// checkpoint with no other process state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub thread_id: ThreadId,
    pub step: WorkflowStep,
    pub status: WorkflowStatus,

    // Immutable start inputs.
    pub user_id: UserId,
    pub start_date: NaiveDate,
    pub days_to_generate: u32,
    pub plan_description: String,

    // Phase outputs, populated as the workflow advances.
    pub plan_id: Option<PlanId>,
    pub raw_calendar: Option<AttendeeCalendar>,
    pub confirmed_calendar: Option<AttendeeCalendar>,
    pub meal_slots: Vec<MealSlot>,
    pub current_slot_index: usize,
    pub slot_scratch: Option<SlotScratch>,
    pub draft_plan_items: Vec<DraftPlanItem>,
    pub ui_plan: Option<Vec<UiPlanItem>>,
    pub plan_saved_status: Option<SaveStatus>,
    pub modification_queue: Vec<ModificationItem>,
    pub modification_cursor: usize,
    pub modification_results: Vec<ModificationResult>,
    pub modifications_completed: bool,

    // Control fields.
    pub hitl_step_required: Option<HitlStep>,
    pub hitl_payload: Option<HitlPayload>,
    pub hitl_response: Option<HitlResponse>,
    pub error_message: Option<String>,
    pub steps_executed: u32,
}

impl WorkflowState {
    pub fn new(thread_id: ThreadId, request: StartRequest) -> Self {
        Self {
            thread_id,
            step: WorkflowStep::Start,
            status: WorkflowStatus::Running,
            user_id: request.user_id,
            start_date: request.start_date,
            days_to_generate: request.days_to_generate,
            plan_description: request.plan_description,
            plan_id: None,
            raw_calendar: None,
            confirmed_calendar: None,
            meal_slots: Vec::new(),
            current_slot_index: 0,
            slot_scratch: None,
            draft_plan_items: Vec::new(),
            ui_plan: None,
            plan_saved_status: None,
            modification_queue: Vec::new(),
            modification_cursor: 0,
            modification_results: Vec::new(),
            modifications_completed: false,
            hitl_step_required: None,
            hitl_payload: None,
            hitl_response: None,
            error_message: None,
            steps_executed: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, WorkflowStatus::Completed | WorkflowStatus::Error)
    }

    /// Structural invariants every post-step state must satisfy.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        let resumable_hitl = matches!(
            self.hitl_step_required,
            Some(HitlStep::ConfirmCalendar) | Some(HitlStep::ReviewFullPlan)
        );
        if resumable_hitl != (self.status == WorkflowStatus::Paused) {
            return Err(DomainError::InvariantViolation(
                "a resumable hitl step must be set exactly when the workflow is paused"
                    .to_string(),
            ));
        }
        if self.hitl_step_required == Some(HitlStep::Error)
            && self.status != WorkflowStatus::Error
        {
            return Err(DomainError::InvariantViolation(
                "an error hitl step requires error status".to_string(),
            ));
        }

        if self.current_slot_index > self.meal_slots.len() {
            return Err(DomainError::InvariantViolation(
                "slot cursor is past the end of the slot list".to_string(),
            ));
        }
        if self.modification_cursor > self.modification_queue.len() {
            return Err(DomainError::InvariantViolation(
                "modification cursor is past the end of the queue".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for slot in &self.meal_slots {
            if !seen.insert((slot.date, slot.meal_type)) {
                return Err(DomainError::InvariantViolation(format!(
                    "duplicate meal slot for {} {}",
                    slot.date, slot.meal_type
                )));
            }
        }

        Ok(())
    }
}

/// Partial state update returned by a step function. `None` fields are left
/// untouched; double-`Option` fields distinguish "leave alone" from "clear".
/// Merging is last-write-wins except for cursors, which must never move
/// backwards.
#[derive(Clone, Debug, Default)]
pub struct StatePatch {
    pub step: Option<WorkflowStep>,
    pub status: Option<WorkflowStatus>,
    pub plan_id: Option<PlanId>,
    pub raw_calendar: Option<AttendeeCalendar>,
    pub confirmed_calendar: Option<AttendeeCalendar>,
    pub meal_slots: Option<Vec<MealSlot>>,
    pub current_slot_index: Option<usize>,
    pub slot_scratch: Option<SlotScratch>,
    pub clear_slot_scratch: bool,
    pub push_draft_item: Option<DraftPlanItem>,
    pub ui_plan: Option<Vec<UiPlanItem>>,
    pub plan_saved_status: Option<SaveStatus>,
    pub modification_queue: Option<Vec<ModificationItem>>,
    pub modification_cursor: Option<usize>,
    pub push_modification_result: Option<ModificationResult>,
    pub modifications_completed: Option<bool>,
    pub hitl_step_required: Option<Option<HitlStep>>,
    pub hitl_payload: Option<Option<HitlPayload>>,
    pub hitl_response: Option<Option<HitlResponse>>,
    pub error_message: Option<Option<String>>,
}

impl StatePatch {
    pub fn apply(self, state: &mut WorkflowState) -> Result<(), DomainError> {
        if let Some(index) = self.current_slot_index {
            if index < state.current_slot_index {
                return Err(DomainError::CursorRegression {
                    field: "current_slot_index",
                    from: state.current_slot_index,
                    to: index,
                });
            }
            state.current_slot_index = index;
        }
        if let Some(cursor) = self.modification_cursor {
            if cursor < state.modification_cursor {
                return Err(DomainError::CursorRegression {
                    field: "modification_cursor",
                    from: state.modification_cursor,
                    to: cursor,
                });
            }
            state.modification_cursor = cursor;
        }

        if let Some(step) = self.step {
            state.step = step;
        }
        if let Some(status) = self.status {
            state.status = status;
        }
        if let Some(plan_id) = self.plan_id {
            state.plan_id = Some(plan_id);
        }
        if let Some(calendar) = self.raw_calendar {
            state.raw_calendar = Some(calendar);
        }
        if let Some(calendar) = self.confirmed_calendar {
            state.confirmed_calendar = Some(calendar);
        }
        if let Some(slots) = self.meal_slots {
            state.meal_slots = slots;
        }
        if let Some(scratch) = self.slot_scratch {
            state.slot_scratch = Some(scratch);
        }
        if self.clear_slot_scratch {
            state.slot_scratch = None;
        }
        if let Some(item) = self.push_draft_item {
            state.draft_plan_items.push(item);
        }
        if let Some(plan) = self.ui_plan {
            state.ui_plan = Some(plan);
        }
        if let Some(saved) = self.plan_saved_status {
            state.plan_saved_status = Some(saved);
        }
        if let Some(queue) = self.modification_queue {
            state.modification_queue = queue;
        }
        if let Some(result) = self.push_modification_result {
            state.modification_results.push(result);
        }
        if let Some(completed) = self.modifications_completed {
            state.modifications_completed = completed;
        }
        if let Some(hitl_step) = self.hitl_step_required {
            state.hitl_step_required = hitl_step;
        }
        if let Some(payload) = self.hitl_payload {
            state.hitl_payload = payload;
        }
        if let Some(response) = self.hitl_response {
            state.hitl_response = response;
        }
        if let Some(message) = self.error_message {
            state.error_message = message;
        }

        Ok(())
    }

    /// A patch that parks the workflow in the terminal error state.
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            step: Some(WorkflowStep::Failed),
            status: Some(WorkflowStatus::Error),
            hitl_step_required: Some(Some(HitlStep::Error)),
            hitl_payload: Some(Some(HitlPayload::Error { message: message.clone() })),
            hitl_response: Some(None),
            error_message: Some(Some(message)),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::calendar::MealType;
    use crate::domain::profile::UserId;
    use crate::domain::slot::MealSlot;
    use crate::errors::DomainError;
    use crate::workflow::step::WorkflowStep;

    use super::{
        HitlStep, StartRequest, StatePatch, ThreadId, WorkflowState, WorkflowStatus,
    };

    fn state() -> WorkflowState {
        WorkflowState::new(
            ThreadId("t-1".to_string()),
            StartRequest {
                user_id: UserId("u-1".to_string()),
                start_date: NaiveDate::parse_from_str("2025-06-02", "%Y-%m-%d")
                    .expect("valid date"),
                days_to_generate: 3,
                plan_description: "family dinners".to_string(),
            },
        )
    }

    #[test]
    fn patch_merge_is_last_write_wins_for_plain_fields() {
        let mut state = state();

        StatePatch { status: Some(WorkflowStatus::RunningModifications), ..StatePatch::default() }
            .apply(&mut state)
            .expect("apply");
        StatePatch { status: Some(WorkflowStatus::Completed), ..StatePatch::default() }
            .apply(&mut state)
            .expect("apply");

        assert_eq!(state.status, WorkflowStatus::Completed);
    }

    #[test]
    fn cursor_regression_is_rejected() {
        let mut state = state();
        StatePatch { current_slot_index: Some(2), ..StatePatch::default() }
            .apply(&mut state)
            .expect("advance");

        let error = StatePatch { current_slot_index: Some(1), ..StatePatch::default() }
            .apply(&mut state)
            .expect_err("regression must fail");

        assert_eq!(
            error,
            DomainError::CursorRegression { field: "current_slot_index", from: 2, to: 1 }
        );
        assert_eq!(state.current_slot_index, 2);
    }

    #[test]
    fn none_fields_leave_state_untouched() {
        let mut state = state();
        state.error_message = Some("previous".to_string());

        StatePatch::default().apply(&mut state).expect("apply");
        assert_eq!(state.error_message.as_deref(), Some("previous"));

        StatePatch { error_message: Some(None), ..StatePatch::default() }
            .apply(&mut state)
            .expect("apply");
        assert_eq!(state.error_message, None);
    }

    #[test]
    fn paused_state_requires_resumable_hitl_step() {
        let mut state = state();
        state.status = WorkflowStatus::Paused;
        assert!(state.check_invariants().is_err());

        state.hitl_step_required = Some(HitlStep::ConfirmCalendar);
        assert!(state.check_invariants().is_ok());

        state.status = WorkflowStatus::Running;
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn duplicate_slots_violate_invariants() {
        let mut state = state();
        let slot = MealSlot {
            day: "Monday".to_string(),
            date: NaiveDate::parse_from_str("2025-06-02", "%Y-%m-%d").expect("valid date"),
            meal_type: MealType::Dinner,
            attendees: vec!["alice".to_string()],
        };
        state.meal_slots = vec![slot.clone(), slot];

        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn failed_patch_parks_workflow_in_error_state() {
        let mut state = state();
        StatePatch::failed("calendar extraction failed").apply(&mut state).expect("apply");

        assert_eq!(state.step, WorkflowStep::Failed);
        assert_eq!(state.status, WorkflowStatus::Error);
        assert_eq!(state.hitl_step_required, Some(HitlStep::Error));
        assert_eq!(state.error_message.as_deref(), Some("calendar extraction failed"));
        assert!(state.check_invariants().is_ok());
    }
}
