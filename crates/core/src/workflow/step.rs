use serde::{Deserialize, Serialize};

/// Position in the planning state machine. Persisted with the state so a
/// resumed thread re-enters exactly where it left off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Start,
    ExtractCalendar,
    AwaitCalendarConfirmation,
    ExpandSlots,
    /// Cursor-guarded: selects candidates and a recipe for the current slot.
    PlanSlot,
    /// Stores the current slot's draft item and advances the cursor.
    StoreSlot,
    AwaitPlanReview,
    PersistPlan,
    /// Cursor-guarded: runs the modification chain for the current entry.
    ModifyEntry,
    Done,
    Failed,
}

impl WorkflowStep {
    /// Steps at which execution suspends until human input arrives.
    pub fn is_pause(&self) -> bool {
        matches!(self, WorkflowStep::AwaitCalendarConfirmation | WorkflowStep::AwaitPlanReview)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStep::Done | WorkflowStep::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::WorkflowStep;

    #[test]
    fn only_the_two_hitl_steps_pause() {
        let pauses: Vec<WorkflowStep> = [
            WorkflowStep::Start,
            WorkflowStep::ExtractCalendar,
            WorkflowStep::AwaitCalendarConfirmation,
            WorkflowStep::ExpandSlots,
            WorkflowStep::PlanSlot,
            WorkflowStep::StoreSlot,
            WorkflowStep::AwaitPlanReview,
            WorkflowStep::PersistPlan,
            WorkflowStep::ModifyEntry,
            WorkflowStep::Done,
            WorkflowStep::Failed,
        ]
        .into_iter()
        .filter(WorkflowStep::is_pause)
        .collect();

        assert_eq!(
            pauses,
            vec![WorkflowStep::AwaitCalendarConfirmation, WorkflowStep::AwaitPlanReview]
        );
    }

    #[test]
    fn terminal_steps_are_done_and_failed() {
        assert!(WorkflowStep::Done.is_terminal());
        assert!(WorkflowStep::Failed.is_terminal());
        assert!(!WorkflowStep::PlanSlot.is_terminal());
    }
}
