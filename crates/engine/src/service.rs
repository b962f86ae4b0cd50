use std::sync::Arc;

use serde::Serialize;

use nestplan_core::{
    ApplicationError, HitlPayload, HitlResponse, HitlStep, SaveStatus, StartRequest, ThreadId,
    WorkflowState, WorkflowStatus,
};
use nestplan_db::repositories::CheckpointRepository;

use crate::engine::WorkflowEngine;

/// The caller-facing view of a workflow thread after a start, resume, or
/// status call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkflowResponse {
    pub thread_id: ThreadId,
    pub status: WorkflowStatus,
    pub hitl_step_required: Option<HitlStep>,
    pub hitl_payload: Option<HitlPayload>,
    pub error_message: Option<String>,
    pub final_plan_saved_status: Option<SaveStatus>,
}

impl WorkflowResponse {
    pub fn from_state(state: &WorkflowState) -> Self {
        Self {
            thread_id: state.thread_id.clone(),
            status: state.status,
            hitl_step_required: state.hitl_step_required,
            hitl_payload: state.hitl_payload.clone(),
            error_message: state.error_message.clone(),
            final_plan_saved_status: state.plan_saved_status,
        }
    }
}

const MAX_PLAN_DAYS: u32 = 31;

/// Public workflow surface: start a thread, resume a paused one with human
/// input, or read its current status.
pub struct PlannerService {
    engine: WorkflowEngine,
    checkpoints: Arc<dyn CheckpointRepository>,
}

impl PlannerService {
    pub fn new(engine: WorkflowEngine, checkpoints: Arc<dyn CheckpointRepository>) -> Self {
        Self { engine, checkpoints }
    }

    /// Starts a new thread and runs it to its first pause (or failure).
    /// Invalid input is rejected before any state exists.
    pub async fn start(&self, request: StartRequest) -> Result<WorkflowResponse, ApplicationError> {
        if request.days_to_generate == 0 || request.days_to_generate > MAX_PLAN_DAYS {
            return Err(ApplicationError::InvalidRequest(format!(
                "days_to_generate must be between 1 and {MAX_PLAN_DAYS}"
            )));
        }
        if request.plan_description.trim().is_empty() {
            return Err(ApplicationError::InvalidRequest(
                "plan_description must not be empty".to_string(),
            ));
        }
        if request.user_id.0.trim().is_empty() {
            return Err(ApplicationError::InvalidRequest(
                "user_id must not be empty".to_string(),
            ));
        }

        let mut state = WorkflowState::new(ThreadId::new(), request);
        tracing::info!(thread_id = %state.thread_id, "starting workflow thread");
        self.engine.run(&mut state).await?;
        Ok(WorkflowResponse::from_state(&state))
    }

    /// Resumes a paused thread with human input. Threads that are not
    /// paused, or paused on a different step than the input answers, are
    /// left untouched.
    pub async fn resume(
        &self,
        thread_id: &ThreadId,
        input: HitlResponse,
    ) -> Result<WorkflowResponse, ApplicationError> {
        let mut state = self.load(thread_id).await?.ok_or_else(|| {
            ApplicationError::UnknownThread(thread_id.to_string())
        })?;

        if state.status != WorkflowStatus::Paused {
            let mut response = WorkflowResponse::from_state(&state);
            response.error_message = Some(format!(
                "workflow is not awaiting input (status: {})",
                state.status.as_str()
            ));
            return Ok(response);
        }
        if state.hitl_step_required != Some(input.expected_step()) {
            return Err(ApplicationError::InvalidRequest(format!(
                "workflow is waiting for {:?}, not {:?}",
                state.hitl_step_required,
                input.expected_step()
            )));
        }

        tracing::info!(thread_id = %thread_id, step = ?state.step, "resuming workflow thread");
        state.hitl_response = Some(input);
        state.status = WorkflowStatus::Running;
        state.hitl_step_required = None;
        state.hitl_payload = None;
        self.engine.run(&mut state).await?;
        Ok(WorkflowResponse::from_state(&state))
    }

    /// Read-only thread status; never mutates the checkpoint.
    pub async fn status(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Option<WorkflowResponse>, ApplicationError> {
        Ok(self.load(thread_id).await?.as_ref().map(WorkflowResponse::from_state))
    }

    async fn load(&self, thread_id: &ThreadId) -> Result<Option<WorkflowState>, ApplicationError> {
        self.checkpoints
            .load(thread_id)
            .await
            .map_err(|e| ApplicationError::Persistence(e.to_string()))
    }
}
