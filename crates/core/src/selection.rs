//! Deterministic validation of the LLM's recipe choice. The LLM only ever
//! picks among candidates the datastore already produced; anything else
//! falls back without blocking the workflow.

use crate::domain::recipe::{CandidateRecipe, ChosenRecipe, RecipeSelection};

/// Resolves an LLM selection against the candidate list.
///
/// - an explicit "no suitable candidate" verdict yields the placeholder;
/// - a chosen id that matches a candidate yields that candidate;
/// - anything else (missing selection, unknown id) falls back to the first
///   candidate, or the placeholder when there are no candidates at all.
pub fn resolve_choice(
    candidates: &[CandidateRecipe],
    selection: Option<&RecipeSelection>,
) -> ChosenRecipe {
    if candidates.is_empty() {
        return ChosenRecipe::Placeholder;
    }

    if let Some(selection) = selection {
        if selection.no_suitable_candidate_found {
            return ChosenRecipe::Placeholder;
        }
        if let Some(recipe) =
            candidates.iter().find(|candidate| candidate.id.0 == selection.chosen_recipe_id)
        {
            return ChosenRecipe::Selected { recipe: recipe.clone() };
        }
        tracing::warn!(
            chosen_recipe_id = %selection.chosen_recipe_id,
            "llm chose an id outside the candidate set, falling back to first candidate"
        );
    }

    ChosenRecipe::Selected { recipe: candidates[0].clone() }
}

#[cfg(test)]
mod tests {
    use crate::domain::recipe::{CandidateRecipe, ChosenRecipe, RecipeId, RecipeSelection};

    use super::resolve_choice;

    fn candidates() -> Vec<CandidateRecipe> {
        vec![
            CandidateRecipe {
                id: RecipeId("r-1".to_string()),
                name: "Lentil Soup".to_string(),
                provider_id: Some(101),
                image_url: None,
            },
            CandidateRecipe {
                id: RecipeId("r-2".to_string()),
                name: "Chickpea Curry".to_string(),
                provider_id: Some(102),
                image_url: None,
            },
        ]
    }

    fn selection(id: &str) -> RecipeSelection {
        RecipeSelection {
            chosen_recipe_id: id.to_string(),
            chosen_recipe_name: "whatever".to_string(),
            reasoning: String::new(),
            no_suitable_candidate_found: false,
        }
    }

    #[test]
    fn valid_choice_is_honored() {
        let chosen = resolve_choice(&candidates(), Some(&selection("r-2")));
        assert_eq!(chosen.recipe().map(|r| r.id.0.as_str()), Some("r-2"));
    }

    #[test]
    fn unknown_id_falls_back_to_first_candidate() {
        let chosen = resolve_choice(&candidates(), Some(&selection("r-99")));
        assert_eq!(chosen.recipe().map(|r| r.id.0.as_str()), Some("r-1"));
    }

    #[test]
    fn missing_selection_falls_back_to_first_candidate() {
        let chosen = resolve_choice(&candidates(), None);
        assert_eq!(chosen.recipe().map(|r| r.id.0.as_str()), Some("r-1"));
    }

    #[test]
    fn explicit_no_suitable_verdict_yields_placeholder() {
        let mut verdict = selection("r-1");
        verdict.no_suitable_candidate_found = true;

        assert_eq!(resolve_choice(&candidates(), Some(&verdict)), ChosenRecipe::Placeholder);
    }

    #[test]
    fn empty_candidates_always_yield_placeholder() {
        assert_eq!(resolve_choice(&[], Some(&selection("r-1"))), ChosenRecipe::Placeholder);
        assert_eq!(resolve_choice(&[], None), ChosenRecipe::Placeholder);
    }
}
