use std::fmt::Write as _;
use std::sync::Arc;

use nestplan_core::domain::profile::UserProfile;
use nestplan_core::domain::recipe::{LiveRecipe, ModifiedRecipe};
use nestplan_core::retry::{retry_with_backoff, RetryPolicy};

use crate::llm::{parse_structured, LlmClient, LlmError};

/// Adapts a live recipe to the allergies and diets of the people eating it.
pub struct RecipeModifier {
    llm: Arc<dyn LlmClient>,
    retry: RetryPolicy,
}

impl RecipeModifier {
    pub fn new(llm: Arc<dyn LlmClient>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    pub async fn modify(
        &self,
        recipe: &LiveRecipe,
        profiles: &[UserProfile],
    ) -> Result<ModifiedRecipe, LlmError> {
        let prompt = build_prompt(recipe, profiles);

        let completion =
            retry_with_backoff(self.retry, "recipe_modification", || self.llm.complete(&prompt))
                .await?;

        parse_structured(&completion)
    }
}

fn build_prompt(recipe: &LiveRecipe, profiles: &[UserProfile]) -> String {
    let mut eaters = String::new();
    for profile in profiles {
        let allergies = if profile.allergies.is_empty() {
            "no allergies".to_string()
        } else {
            format!("allergic to {}", profile.allergies.join(", "))
        };
        let diet = match (&profile.lifestyle, &profile.diet_type) {
            (Some(lifestyle), Some(diet)) => format!("{lifestyle}, {diet}"),
            (Some(lifestyle), None) => lifestyle.clone(),
            (None, Some(diet)) => diet.clone(),
            (None, None) => "no stated diet".to_string(),
        };
        let _ = writeln!(eaters, "- {}: {allergies}; diet: {diet}", profile.user_name);
    }

    format!(
        "Adapt this recipe so everyone below can safely eat it. Keep the dish \
         recognizable; substitute rather than remove where possible.\n\n\
         Recipe: {title}\nIngredients:\n{ingredients}\nInstructions:\n{instructions}\n\
         Eaters:\n{eaters}\n\
         Respond with strict JSON only:\n\
         {{\"name\": \"...\", \"ingredients\": [\"...\"], \"instructions\": [\"...\"], \
         \"suitability_notes\": \"...\", \"modifications_were_made\": true}}\n\
         If the recipe is already suitable, return it unchanged with \
         modifications_were_made set to false.",
        title = recipe.title,
        ingredients = recipe.ingredients.join("\n"),
        instructions = recipe.instructions.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use nestplan_core::domain::profile::{UserId, UserProfile};
    use nestplan_core::domain::recipe::LiveRecipe;
    use nestplan_core::retry::RetryPolicy;

    use super::RecipeModifier;
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

    fn live_recipe() -> LiveRecipe {
        LiveRecipe {
            provider_id: 715415,
            title: "Pad Thai".to_string(),
            ingredients: vec!["rice noodles".to_string(), "peanuts".to_string()],
            instructions: vec!["Soak noodles.".to_string(), "Stir fry.".to_string()],
            image_url: None,
            nutrition: None,
        }
    }

    fn allergic_profile() -> UserProfile {
        UserProfile {
            id: UserId("u-1".to_string()),
            user_name: "alice".to_string(),
            lifestyle: None,
            diet_type: None,
            allergies: vec!["peanut".to_string()],
        }
    }

    #[tokio::test]
    async fn parses_a_modified_recipe() {
        let modifier = RecipeModifier::new(
            Arc::new(FixedLlm {
                completion: r#"{"name": "Pad Thai (peanut-free)",
                               "ingredients": ["rice noodles", "sunflower seeds"],
                               "instructions": ["Soak noodles.", "Stir fry."],
                               "suitability_notes": "Peanuts replaced with sunflower seeds.",
                               "modifications_were_made": true}"#
                    .to_string(),
            }),
            RetryPolicy::none(),
        );

        let modified = modifier
            .modify(&live_recipe(), &[allergic_profile()])
            .await
            .expect("modify");

        assert!(modified.modifications_were_made);
        assert_eq!(modified.name, "Pad Thai (peanut-free)");
        assert!(modified.ingredients.contains(&"sunflower seeds".to_string()));
    }

    #[tokio::test]
    async fn malformed_completions_are_errors() {
        let modifier = RecipeModifier::new(
            Arc::new(FixedLlm { completion: "not json".to_string() }),
            RetryPolicy::none(),
        );

        let result = modifier.modify(&live_recipe(), &[allergic_profile()]).await;
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }
}
