use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::calendar::MealType;
use crate::domain::profile::{AggregatedNeeds, UserId, UserProfile};
use crate::domain::recipe::{CandidateRecipe, ChosenRecipe, RecipeId, RecipeVersionId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

/// Plan shell created before extraction; the id anchors every later phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewMealPlan {
    pub user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// One slot's planning result, accumulated while the slot loop runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DraftPlanItem {
    pub day: String,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub attendees: Vec<String>,
    pub chosen: ChosenRecipe,
    pub candidates: Vec<CandidateRecipe>,
    pub aggregated_needs: AggregatedNeeds,
    pub attendee_profiles: Vec<UserProfile>,
}

/// A draft item enriched with display details for the review pause.
/// Profiles ride along so the modification loop never has to guess them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UiPlanItem {
    pub day: String,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub attendees: Vec<String>,
    pub recipe: ChosenRecipe,
    pub image_url: Option<String>,
    pub fat_grams_portion: Option<f64>,
    pub carb_grams_portion: Option<f64>,
    pub protein_grams_portion: Option<f64>,
    pub calories_kcal: Option<f64>,
    pub alternatives: Vec<CandidateRecipe>,
    pub aggregated_needs: AggregatedNeeds,
    pub attendee_profiles: Vec<UserProfile>,
}

impl UiPlanItem {
    /// Key used by the reviewer's swap map, e.g. `Monday_dinner`.
    pub fn swap_key(&self) -> String {
        format!("{}_{}", self.day, self.meal_type)
    }
}

/// Reviewer-requested recipe override for one slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecipeSwap {
    pub id: RecipeId,
    pub name: String,
}

/// Context persisted with each entry so the modification loop can run
/// without re-deriving profiles or the selected base recipe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModificationContext {
    pub base_recipe_id: RecipeId,
    pub base_recipe_name: String,
    pub aggregated_needs: AggregatedNeeds,
    pub attendee_profiles: Vec<UserProfile>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewMealPlanEntry {
    pub meal_date: NaiveDate,
    pub meal_type: MealType,
    pub primary_recipe_id: RecipeId,
    pub servings: u32,
    pub notes: String,
    pub modification_context: ModificationContext,
}

/// One unit of work for the modification loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModificationItem {
    pub meal_date: NaiveDate,
    pub meal_type: MealType,
    pub recipe_id: RecipeId,
    pub recipe_name: String,
    pub provider_id: Option<i64>,
    pub attendees: Vec<String>,
    pub attendee_profiles: Vec<UserProfile>,
    pub aggregated_needs: AggregatedNeeds,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewParticipant {
    pub entry_id: EntryId,
    pub user_id: UserId,
    pub assigned_recipe_id: RecipeId,
    pub recipe_version_id: Option<RecipeVersionId>,
    pub is_modified_version: bool,
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::calendar::MealType;
    use crate::domain::profile::AggregatedNeeds;
    use crate::domain::recipe::ChosenRecipe;

    use super::UiPlanItem;

    #[test]
    fn swap_key_combines_day_and_meal_type() {
        let item = UiPlanItem {
            day: "Monday".to_string(),
            date: NaiveDate::parse_from_str("2025-06-02", "%Y-%m-%d").expect("valid date"),
            meal_type: MealType::Dinner,
            attendees: vec![],
            recipe: ChosenRecipe::Placeholder,
            image_url: None,
            fat_grams_portion: None,
            carb_grams_portion: None,
            protein_grams_portion: None,
            calories_kcal: None,
            alternatives: vec![],
            aggregated_needs: AggregatedNeeds::default(),
            attendee_profiles: vec![],
        };

        assert_eq!(item.swap_key(), "Monday_dinner");
    }
}
