use async_trait::async_trait;
use thiserror::Error;

use nestplan_core::domain::plan::{
    EntryId, NewMealPlan, NewMealPlanEntry, NewParticipant, PlanId,
};
use nestplan_core::domain::profile::{AggregatedNeeds, UserProfile};
use nestplan_core::domain::recipe::{
    CandidateRecipe, NewRecipeVersion, RecipeDetails, RecipeId, RecipeVersionId,
};
use nestplan_core::workflow::state::WorkflowState;
use nestplan_core::MealType;

pub mod checkpoint;
pub mod meal_plan;
pub mod memory;
pub mod profile;
pub mod recipe;

pub use checkpoint::SqlCheckpointRepository;
pub use meal_plan::SqlMealPlanRepository;
pub use memory::{
    InMemoryCheckpointRepository, InMemoryMealPlanRepository, InMemoryProfileRepository,
    InMemoryRecipeRepository,
};
pub use profile::SqlProfileRepository;
pub use recipe::SqlRecipeRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Looks up profiles (with allergies resolved to attribute names) by
    /// case-folded user name. Unknown names are silently dropped.
    async fn find_by_names(&self, names: &[String]) -> Result<Vec<UserProfile>, RepositoryError>;
}

#[async_trait]
pub trait RecipeRepository: Send + Sync {
    /// Tiered candidate lookup for one meal slot. Tier 1 requires every
    /// hard and soft attribute, tier 2 relaxes to hard-only, and with no
    /// criteria at all an unfiltered sample is returned. A slot whose hard
    /// constraints match nothing yields an empty list.
    async fn find_candidates(
        &self,
        needs: &AggregatedNeeds,
        meal_type: MealType,
        limit: u32,
    ) -> Result<Vec<CandidateRecipe>, RepositoryError>;

    /// Batched display-detail fetch for plan assembly.
    async fn details_by_ids(
        &self,
        ids: &[RecipeId],
    ) -> Result<Vec<RecipeDetails>, RepositoryError>;
}

#[async_trait]
pub trait MealPlanRepository: Send + Sync {
    async fn create_plan(&self, plan: NewMealPlan) -> Result<PlanId, RepositoryError>;

    /// Inserts every entry in one transaction; partial acceptance is a
    /// failure and rolls back.
    async fn insert_entries(
        &self,
        plan_id: &PlanId,
        entries: &[NewMealPlanEntry],
    ) -> Result<(), RepositoryError>;

    async fn update_entry_notes(
        &self,
        plan_id: &PlanId,
        meal_date: chrono::NaiveDate,
        meal_type: MealType,
        notes: &str,
    ) -> Result<bool, RepositoryError>;

    async fn find_entry_id(
        &self,
        plan_id: &PlanId,
        meal_date: chrono::NaiveDate,
        meal_type: MealType,
    ) -> Result<Option<EntryId>, RepositoryError>;

    async fn insert_recipe_version(
        &self,
        version: &NewRecipeVersion,
    ) -> Result<RecipeVersionId, RepositoryError>;

    /// Inserts one participant row per attendee; all-or-nothing.
    async fn insert_participants(
        &self,
        participants: &[NewParticipant],
    ) -> Result<usize, RepositoryError>;
}

#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    async fn load(
        &self,
        thread_id: &nestplan_core::ThreadId,
    ) -> Result<Option<WorkflowState>, RepositoryError>;

    async fn save(&self, state: &WorkflowState) -> Result<(), RepositoryError>;
}
