use chrono::Days;

use nestplan_core::{
    HitlPayload, HitlResponse, HitlStep, NewMealPlan, StatePatch, WorkflowState, WorkflowStatus,
    WorkflowStep,
};

use crate::engine::WorkflowEngine;

impl WorkflowEngine {
    /// Creates the plan shell. The plan row anchors every later phase, so a
    /// failure here is fatal to the thread.
    pub(crate) async fn step_start(&self, state: &WorkflowState) -> StatePatch {
        let offset = u64::from(state.days_to_generate.saturating_sub(1));
        let Some(end_date) = state.start_date.checked_add_days(Days::new(offset)) else {
            return StatePatch::failed("plan end date is out of range");
        };

        let plan = NewMealPlan {
            user_id: state.user_id.clone(),
            name: format!("Meal plan {} to {}", state.start_date, end_date),
            description: Some(state.plan_description.clone()),
            start_date: state.start_date,
            end_date,
        };

        match self.plans.create_plan(plan).await {
            Ok(plan_id) => {
                tracing::info!(thread_id = %state.thread_id, plan_id = %plan_id.0, "plan shell created");
                StatePatch {
                    plan_id: Some(plan_id),
                    step: Some(WorkflowStep::ExtractCalendar),
                    ..StatePatch::default()
                }
            }
            Err(e) => StatePatch::failed(format!("failed to create plan shell: {e}")),
        }
    }

    /// Extracts the attendance calendar and pauses for confirmation. An
    /// empty extraction is fatal: there is nothing for a human to confirm.
    pub(crate) async fn step_extract_calendar(&self, state: &WorkflowState) -> StatePatch {
        let extracted = self
            .extractor
            .extract(&state.plan_description, state.start_date, state.days_to_generate)
            .await;

        match extracted {
            Ok(calendar) if calendar.is_empty() => {
                StatePatch::failed("calendar extraction found no attendance")
            }
            Ok(calendar) => StatePatch {
                raw_calendar: Some(calendar.clone()),
                step: Some(WorkflowStep::AwaitCalendarConfirmation),
                status: Some(WorkflowStatus::Paused),
                hitl_step_required: Some(Some(HitlStep::ConfirmCalendar)),
                hitl_payload: Some(Some(HitlPayload::Calendar { calendar })),
                ..StatePatch::default()
            },
            Err(e) => StatePatch::failed(format!("calendar extraction failed: {e}")),
        }
    }

    /// Consumes the human calendar confirmation and moves on to slot
    /// expansion. The confirmed calendar replaces the extracted one wholesale.
    pub(crate) fn step_apply_confirmation(&self, state: &WorkflowState) -> StatePatch {
        match &state.hitl_response {
            Some(HitlResponse::ConfirmCalendar { confirmed_calendar }) => {
                let confirmed = confirmed_calendar.clone().normalized();
                if confirmed.is_empty() {
                    return StatePatch::failed("confirmed calendar is empty");
                }
                StatePatch {
                    confirmed_calendar: Some(confirmed),
                    step: Some(WorkflowStep::ExpandSlots),
                    hitl_step_required: Some(None),
                    hitl_payload: Some(None),
                    hitl_response: Some(None),
                    ..StatePatch::default()
                }
            }
            _ => StatePatch::failed("expected a calendar confirmation on resume"),
        }
    }
}
