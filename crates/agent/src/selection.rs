use std::fmt::Write as _;
use std::sync::Arc;

use nestplan_core::domain::profile::AggregatedNeeds;
use nestplan_core::domain::recipe::{CandidateRecipe, RecipeSelection};
use nestplan_core::retry::{retry_with_backoff, RetryPolicy};
use nestplan_core::MealType;

use crate::llm::{parse_structured, LlmClient, LlmError};

/// Picks one candidate per slot, steering away from recipes already chosen
/// earlier in the same plan so the week stays varied.
pub struct RecipeSelector {
    llm: Arc<dyn LlmClient>,
    retry: RetryPolicy,
}

impl RecipeSelector {
    pub fn new(llm: Arc<dyn LlmClient>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    pub async fn choose(
        &self,
        candidates: &[CandidateRecipe],
        needs: &AggregatedNeeds,
        meal_type: MealType,
        already_selected: &[String],
    ) -> Result<RecipeSelection, LlmError> {
        let prompt = build_prompt(candidates, needs, meal_type, already_selected);

        let completion =
            retry_with_backoff(self.retry, "recipe_selection", || self.llm.complete(&prompt))
                .await?;

        parse_structured(&completion)
    }
}

fn build_prompt(
    candidates: &[CandidateRecipe],
    needs: &AggregatedNeeds,
    meal_type: MealType,
    already_selected: &[String],
) -> String {
    let mut listing = String::new();
    for candidate in candidates {
        let _ = writeln!(listing, "- id: {}, name: {}", candidate.id.0, candidate.name);
    }

    let allergies =
        if needs.allergies.is_empty() { "none".to_string() } else { needs.allergies.join(", ") };
    let diets = if needs.diets.is_empty() { "none".to_string() } else { needs.diets.join(", ") };
    let prior = if already_selected.is_empty() {
        "none yet".to_string()
    } else {
        already_selected.join(", ")
    };

    format!(
        "Choose the best {meal_type} recipe for this group.\n\n\
         Allergies (must avoid): {allergies}\nDietary preferences: {diets}\n\
         Already planned this week: {prior}\n\nCandidates:\n{listing}\n\
         Respond with strict JSON only:\n\
         {{\"chosen_recipe_id\": \"...\", \"chosen_recipe_name\": \"...\", \
         \"reasoning\": \"...\", \"no_suitable_candidate_found\": false}}\n\
         Set no_suitable_candidate_found to true only when every candidate \
         conflicts with an allergy."
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use nestplan_core::domain::profile::AggregatedNeeds;
    use nestplan_core::domain::recipe::{CandidateRecipe, RecipeId};
    use nestplan_core::retry::RetryPolicy;
    use nestplan_core::MealType;

    use super::RecipeSelector;
    use crate::llm::{LlmClient, LlmError};

    struct FixedLlm {
        completion: String,
    }

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok(self.completion.clone())
        }
    }

    fn candidates() -> Vec<CandidateRecipe> {
        vec![CandidateRecipe {
            id: RecipeId("r-1".to_string()),
            name: "Lentil Soup".to_string(),
            provider_id: None,
            image_url: None,
        }]
    }

    #[tokio::test]
    async fn parses_a_selection() {
        let selector = RecipeSelector::new(
            Arc::new(FixedLlm {
                completion: r#"{"chosen_recipe_id": "r-1", "chosen_recipe_name": "Lentil Soup",
                               "reasoning": "fits the vegetarian preference"}"#
                    .to_string(),
            }),
            RetryPolicy::none(),
        );

        let selection = selector
            .choose(&candidates(), &AggregatedNeeds::default(), MealType::Dinner, &[])
            .await
            .expect("choose");

        assert_eq!(selection.chosen_recipe_id, "r-1");
        assert!(!selection.no_suitable_candidate_found);
    }

    #[tokio::test]
    async fn parses_the_no_suitable_candidate_flag() {
        let selector = RecipeSelector::new(
            Arc::new(FixedLlm {
                completion: r#"{"chosen_recipe_id": "", "chosen_recipe_name": "",
                               "no_suitable_candidate_found": true}"#
                    .to_string(),
            }),
            RetryPolicy::none(),
        );

        let selection = selector
            .choose(&candidates(), &AggregatedNeeds::default(), MealType::Dinner, &[])
            .await
            .expect("choose");

        assert!(selection.no_suitable_candidate_found);
    }
}
