use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::NaiveDate;
use tokio::sync::RwLock;

use nestplan_core::domain::plan::{
    EntryId, NewMealPlan, NewMealPlanEntry, NewParticipant, PlanId,
};
use nestplan_core::domain::profile::{AggregatedNeeds, UserProfile};
use nestplan_core::domain::recipe::{
    CandidateRecipe, NewRecipeVersion, RecipeDetails, RecipeId, RecipeVersionId,
};
use nestplan_core::workflow::state::WorkflowState;
use nestplan_core::{MealType, ThreadId};

use super::{
    CheckpointRepository, MealPlanRepository, ProfileRepository, RecipeRepository,
    RepositoryError,
};

fn simulated(what: &str) -> RepositoryError {
    RepositoryError::Decode(format!("simulated {what} failure"))
}

#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<Vec<UserProfile>>,
}

impl InMemoryProfileRepository {
    pub async fn insert(&self, profile: UserProfile) {
        self.profiles.write().await.push(profile);
    }
}

#[async_trait::async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find_by_names(&self, names: &[String]) -> Result<Vec<UserProfile>, RepositoryError> {
        let lowered: Vec<String> = names.iter().map(|name| name.trim().to_lowercase()).collect();
        let profiles = self.profiles.read().await;
        Ok(profiles
            .iter()
            .filter(|profile| lowered.contains(&profile.user_name.to_lowercase()))
            .cloned()
            .collect())
    }
}

/// Scripted catalog: candidates are keyed by meal type so one slot can be
/// given an empty candidate set while others stay populated.
#[derive(Default)]
pub struct InMemoryRecipeRepository {
    by_meal_type: RwLock<HashMap<MealType, Vec<CandidateRecipe>>>,
    details: RwLock<HashMap<String, RecipeDetails>>,
}

impl InMemoryRecipeRepository {
    pub async fn set_candidates(&self, meal_type: MealType, candidates: Vec<CandidateRecipe>) {
        self.by_meal_type.write().await.insert(meal_type, candidates);
    }

    pub async fn insert_details(&self, details: RecipeDetails) {
        self.details.write().await.insert(details.id.0.clone(), details);
    }
}

#[async_trait::async_trait]
impl RecipeRepository for InMemoryRecipeRepository {
    async fn find_candidates(
        &self,
        _needs: &AggregatedNeeds,
        meal_type: MealType,
        limit: u32,
    ) -> Result<Vec<CandidateRecipe>, RepositoryError> {
        let by_meal_type = self.by_meal_type.read().await;
        let mut candidates = by_meal_type.get(&meal_type).cloned().unwrap_or_default();
        candidates.truncate(limit as usize);
        Ok(candidates)
    }

    async fn details_by_ids(
        &self,
        ids: &[RecipeId],
    ) -> Result<Vec<RecipeDetails>, RepositoryError> {
        let details = self.details.read().await;
        Ok(ids.iter().filter_map(|id| details.get(&id.0).cloned()).collect())
    }
}

struct StoredEntry {
    id: EntryId,
    plan_id: PlanId,
    entry: NewMealPlanEntry,
}

#[derive(Default)]
pub struct InMemoryMealPlanRepository {
    plans: RwLock<HashMap<String, NewMealPlan>>,
    entries: RwLock<Vec<StoredEntry>>,
    versions: RwLock<Vec<(RecipeVersionId, NewRecipeVersion)>>,
    participants: RwLock<Vec<NewParticipant>>,
    next_id: AtomicUsize,
    fail_insert_entries: AtomicBool,
    fail_insert_versions: AtomicBool,
    fail_insert_participants: AtomicBool,
}

impl InMemoryMealPlanRepository {
    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn fail_insert_entries(&self) {
        self.fail_insert_entries.store(true, Ordering::SeqCst);
    }

    pub fn fail_insert_versions(&self) {
        self.fail_insert_versions.store(true, Ordering::SeqCst);
    }

    pub fn fail_insert_participants(&self) {
        self.fail_insert_participants.store(true, Ordering::SeqCst);
    }

    pub async fn plan_count(&self) -> usize {
        self.plans.read().await.len()
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn entry_notes(
        &self,
        plan_id: &PlanId,
        meal_date: NaiveDate,
        meal_type: MealType,
    ) -> Option<String> {
        self.entries
            .read()
            .await
            .iter()
            .find(|stored| {
                &stored.plan_id == plan_id
                    && stored.entry.meal_date == meal_date
                    && stored.entry.meal_type == meal_type
            })
            .map(|stored| stored.entry.notes.clone())
    }

    pub async fn entry_servings(
        &self,
        plan_id: &PlanId,
        meal_date: NaiveDate,
        meal_type: MealType,
    ) -> Option<u32> {
        self.entries
            .read()
            .await
            .iter()
            .find(|stored| {
                &stored.plan_id == plan_id
                    && stored.entry.meal_date == meal_date
                    && stored.entry.meal_type == meal_type
            })
            .map(|stored| stored.entry.servings)
    }

    pub async fn versions(&self) -> Vec<NewRecipeVersion> {
        self.versions.read().await.iter().map(|(_, version)| version.clone()).collect()
    }

    pub async fn participants(&self) -> Vec<NewParticipant> {
        self.participants.read().await.clone()
    }
}

#[async_trait::async_trait]
impl MealPlanRepository for InMemoryMealPlanRepository {
    async fn create_plan(&self, plan: NewMealPlan) -> Result<PlanId, RepositoryError> {
        let id = PlanId(self.next_id("plan"));
        self.plans.write().await.insert(id.0.clone(), plan);
        Ok(id)
    }

    async fn insert_entries(
        &self,
        plan_id: &PlanId,
        entries: &[NewMealPlanEntry],
    ) -> Result<(), RepositoryError> {
        if self.fail_insert_entries.load(Ordering::SeqCst) {
            return Err(simulated("entry insert"));
        }

        let mut stored = self.entries.write().await;
        for entry in entries {
            let duplicate = stored.iter().any(|existing| {
                &existing.plan_id == plan_id
                    && existing.entry.meal_date == entry.meal_date
                    && existing.entry.meal_type == entry.meal_type
            });
            if duplicate {
                return Err(simulated("duplicate entry"));
            }
            stored.push(StoredEntry {
                id: EntryId(self.next_id("entry")),
                plan_id: plan_id.clone(),
                entry: entry.clone(),
            });
        }
        Ok(())
    }

    async fn update_entry_notes(
        &self,
        plan_id: &PlanId,
        meal_date: NaiveDate,
        meal_type: MealType,
        notes: &str,
    ) -> Result<bool, RepositoryError> {
        let mut stored = self.entries.write().await;
        match stored.iter_mut().find(|existing| {
            &existing.plan_id == plan_id
                && existing.entry.meal_date == meal_date
                && existing.entry.meal_type == meal_type
        }) {
            Some(existing) => {
                existing.entry.notes = notes.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_entry_id(
        &self,
        plan_id: &PlanId,
        meal_date: NaiveDate,
        meal_type: MealType,
    ) -> Result<Option<EntryId>, RepositoryError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .find(|existing| {
                &existing.plan_id == plan_id
                    && existing.entry.meal_date == meal_date
                    && existing.entry.meal_type == meal_type
            })
            .map(|existing| existing.id.clone()))
    }

    async fn insert_recipe_version(
        &self,
        version: &NewRecipeVersion,
    ) -> Result<RecipeVersionId, RepositoryError> {
        if self.fail_insert_versions.load(Ordering::SeqCst) {
            return Err(simulated("version insert"));
        }

        let id = RecipeVersionId(self.next_id("version"));
        self.versions.write().await.push((id.clone(), version.clone()));
        Ok(id)
    }

    async fn insert_participants(
        &self,
        participants: &[NewParticipant],
    ) -> Result<usize, RepositoryError> {
        if self.fail_insert_participants.load(Ordering::SeqCst) {
            return Err(simulated("participant insert"));
        }

        self.participants.write().await.extend(participants.iter().cloned());
        Ok(participants.len())
    }
}

#[derive(Default)]
pub struct InMemoryCheckpointRepository {
    checkpoints: RwLock<HashMap<String, WorkflowState>>,
    saves: AtomicUsize,
}

impl InMemoryCheckpointRepository {
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CheckpointRepository for InMemoryCheckpointRepository {
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<WorkflowState>, RepositoryError> {
        Ok(self.checkpoints.read().await.get(&thread_id.0).cloned())
    }

    async fn save(&self, state: &WorkflowState) -> Result<(), RepositoryError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.checkpoints.write().await.insert(state.thread_id.0.clone(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use nestplan_core::domain::plan::{
        ModificationContext, NewMealPlan, NewMealPlanEntry, PlanId,
    };
    use nestplan_core::domain::profile::{UserId, UserProfile};
    use nestplan_core::domain::recipe::{CandidateRecipe, RecipeId};
    use nestplan_core::{AggregatedNeeds, MealType};

    use crate::repositories::{
        InMemoryMealPlanRepository, InMemoryProfileRepository, InMemoryRecipeRepository,
        MealPlanRepository, ProfileRepository, RecipeRepository,
    };

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }

    #[tokio::test]
    async fn profile_lookup_matches_case_insensitively() {
        let repo = InMemoryProfileRepository::default();
        repo.insert(UserProfile {
            id: UserId("u-1".to_string()),
            user_name: "alice".to_string(),
            lifestyle: None,
            diet_type: None,
            allergies: vec![],
        })
        .await;

        let found = repo.find_by_names(&["ALICE".to_string()]).await.expect("find profiles");
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn scripted_candidates_respect_the_limit() {
        let repo = InMemoryRecipeRepository::default();
        let candidates: Vec<CandidateRecipe> = (0..5)
            .map(|i| CandidateRecipe {
                id: RecipeId(format!("r-{i}")),
                name: format!("Recipe {i}"),
                provider_id: None,
                image_url: None,
            })
            .collect();
        repo.set_candidates(MealType::Dinner, candidates).await;

        let found = repo
            .find_candidates(&AggregatedNeeds::default(), MealType::Dinner, 3)
            .await
            .expect("find candidates");
        assert_eq!(found.len(), 3);

        let empty = repo
            .find_candidates(&AggregatedNeeds::default(), MealType::Lunch, 3)
            .await
            .expect("find candidates");
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn duplicate_entries_are_rejected() {
        let repo = InMemoryMealPlanRepository::default();
        let plan_id = repo
            .create_plan(NewMealPlan {
                user_id: UserId("u-1".to_string()),
                name: "week".to_string(),
                description: Some("test".to_string()),
                start_date: date("2025-06-02"),
                end_date: date("2025-06-04"),
            })
            .await
            .expect("create plan");

        let entry = NewMealPlanEntry {
            meal_date: date("2025-06-02"),
            meal_type: MealType::Dinner,
            primary_recipe_id: RecipeId("r-1".to_string()),
            servings: 2,
            notes: String::new(),
            modification_context: ModificationContext {
                base_recipe_id: RecipeId("r-1".to_string()),
                base_recipe_name: "Lentil Soup".to_string(),
                aggregated_needs: AggregatedNeeds::default(),
                attendee_profiles: vec![],
            },
        };
        repo.insert_entries(&plan_id, &[entry.clone()]).await.expect("first insert");
        let duplicate = repo.insert_entries(&plan_id, &[entry]).await;
        assert!(duplicate.is_err());
        assert_eq!(repo.entry_count().await, 1);
    }

    #[tokio::test]
    async fn failure_injection_rejects_entry_inserts() {
        let repo = InMemoryMealPlanRepository::default();
        repo.fail_insert_entries();

        let result = repo.insert_entries(&PlanId("plan-1".to_string()), &[]).await;
        assert!(result.is_err());
    }
}
