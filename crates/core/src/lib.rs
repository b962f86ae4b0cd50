pub mod config;
pub mod domain;
pub mod errors;
pub mod retry;
pub mod selection;
pub mod workflow;

pub use domain::calendar::{AttendeeCalendar, MealAttendees, MealType};
pub use domain::plan::{
    DraftPlanItem, EntryId, ModificationContext, ModificationItem, NewMealPlan, NewMealPlanEntry,
    NewParticipant, PlanId, RecipeSwap, UiPlanItem,
};
pub use domain::profile::{AggregatedNeeds, UserId, UserProfile};
pub use domain::recipe::{
    CandidateRecipe, ChosenRecipe, LiveRecipe, ModifiedRecipe, NewRecipeVersion, RecipeDetails,
    RecipeId, RecipeSelection, RecipeVersionId,
};
pub use domain::slot::{expand_slots, MealSlot};
pub use errors::{ApplicationError, DomainError};
pub use retry::{retry_with_backoff, RetryPolicy, Transient};
pub use workflow::state::{
    HitlPayload, HitlResponse, HitlStep, ModificationOutcome, ModificationResult, SaveStatus,
    SlotScratch, StartRequest, StatePatch, ThreadId, WorkflowState, WorkflowStatus,
};
pub use workflow::step::WorkflowStep;
