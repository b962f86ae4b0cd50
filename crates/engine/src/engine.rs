use std::sync::Arc;

use nestplan_agent::{CalendarExtractor, RecipeInfoProvider, RecipeModifier, RecipeSelector};
use nestplan_core::retry::RetryPolicy;
use nestplan_core::{ApplicationError, StatePatch, WorkflowState, WorkflowStatus, WorkflowStep};
use nestplan_db::repositories::{
    CheckpointRepository, MealPlanRepository, ProfileRepository, RecipeRepository,
};

/// Tuning knobs for one engine instance.
#[derive(Clone, Copy, Debug)]
pub struct EngineSettings {
    /// Retry budget for rate-limited or flaky upstream calls.
    pub rate_policy: RetryPolicy,
    /// Retry budget for provider quota exhaustion, on a longer clock.
    pub quota_policy: RetryPolicy,
    /// Hard bound on steps per run; exceeding it fails the thread.
    pub step_ceiling: u32,
    pub candidate_limit: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        use std::time::Duration;
        Self {
            rate_policy: RetryPolicy::new(3, Duration::from_secs(30), Duration::from_secs(60)),
            quota_policy: RetryPolicy::new(1, Duration::from_secs(30), Duration::from_secs(240)),
            step_ceiling: 250,
            candidate_limit: 3,
        }
    }
}

/// Drives a [`WorkflowState`] through its steps, checkpointing after each
/// one, until the thread pauses for human input or terminates.
pub struct WorkflowEngine {
    pub(crate) profiles: Arc<dyn ProfileRepository>,
    pub(crate) recipes: Arc<dyn RecipeRepository>,
    pub(crate) plans: Arc<dyn MealPlanRepository>,
    pub(crate) checkpoints: Arc<dyn CheckpointRepository>,
    pub(crate) recipe_info: Arc<dyn RecipeInfoProvider>,
    pub(crate) extractor: CalendarExtractor,
    pub(crate) selector: RecipeSelector,
    pub(crate) modifier: RecipeModifier,
    pub(crate) settings: EngineSettings,
}

impl WorkflowEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        recipes: Arc<dyn RecipeRepository>,
        plans: Arc<dyn MealPlanRepository>,
        checkpoints: Arc<dyn CheckpointRepository>,
        recipe_info: Arc<dyn RecipeInfoProvider>,
        extractor: CalendarExtractor,
        selector: RecipeSelector,
        modifier: RecipeModifier,
        settings: EngineSettings,
    ) -> Self {
        Self {
            profiles,
            recipes,
            plans,
            checkpoints,
            recipe_info,
            extractor,
            selector,
            modifier,
            settings,
        }
    }

    /// Runs the thread until it pauses or terminates. Every applied step is
    /// checkpointed before the next one starts, so a crash between steps
    /// loses at most the step in flight.
    pub async fn run(&self, state: &mut WorkflowState) -> Result<(), ApplicationError> {
        loop {
            state.steps_executed += 1;
            let patch = if state.steps_executed > self.settings.step_ceiling {
                tracing::error!(
                    thread_id = %state.thread_id,
                    steps = state.steps_executed,
                    "step ceiling exceeded, failing thread"
                );
                StatePatch::failed(format!(
                    "step ceiling of {} exceeded",
                    self.settings.step_ceiling
                ))
            } else {
                tracing::debug!(
                    thread_id = %state.thread_id,
                    step = ?state.step,
                    "executing workflow step"
                );
                self.dispatch(state).await
            };

            patch.apply(state)?;
            state.check_invariants()?;
            self.checkpoint(state).await?;

            if state.is_terminal() || state.status == WorkflowStatus::Paused {
                return Ok(());
            }
        }
    }

    async fn dispatch(&self, state: &WorkflowState) -> StatePatch {
        match state.step {
            WorkflowStep::Start => self.step_start(state).await,
            WorkflowStep::ExtractCalendar => self.step_extract_calendar(state).await,
            WorkflowStep::AwaitCalendarConfirmation => self.step_apply_confirmation(state),
            WorkflowStep::ExpandSlots => self.step_expand_slots(state),
            WorkflowStep::PlanSlot => {
                if state.current_slot_index >= state.meal_slots.len() {
                    self.step_assemble_review(state).await
                } else {
                    self.step_plan_slot(state).await
                }
            }
            WorkflowStep::StoreSlot => self.step_store_slot(state),
            WorkflowStep::AwaitPlanReview => self.step_apply_review(state),
            WorkflowStep::PersistPlan => self.step_persist_plan(state).await,
            WorkflowStep::ModifyEntry => {
                if state.modification_cursor >= state.modification_queue.len() {
                    Self::modifications_complete()
                } else {
                    self.step_modify_entry(state).await
                }
            }
            WorkflowStep::Done => {
                StatePatch { status: Some(WorkflowStatus::Completed), ..StatePatch::default() }
            }
            WorkflowStep::Failed => {
                StatePatch { status: Some(WorkflowStatus::Error), ..StatePatch::default() }
            }
        }
    }

    fn modifications_complete() -> StatePatch {
        StatePatch {
            step: Some(WorkflowStep::Done),
            status: Some(WorkflowStatus::Completed),
            modifications_completed: Some(true),
            ..StatePatch::default()
        }
    }

    async fn checkpoint(&self, state: &WorkflowState) -> Result<(), ApplicationError> {
        self.checkpoints
            .save(state)
            .await
            .map_err(|e| ApplicationError::Persistence(e.to_string()))
    }
}
