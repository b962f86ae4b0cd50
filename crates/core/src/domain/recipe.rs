use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecipeId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecipeVersionId(pub String);

/// A catalog recipe offered as a candidate for one meal slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecipe {
    pub id: RecipeId,
    pub name: String,
    /// Numeric id in the external recipe-information provider, when known.
    pub provider_id: Option<i64>,
    pub image_url: Option<String>,
}

/// The outcome of recipe selection for one slot. A slot with no usable
/// candidates carries an explicit placeholder rather than a null id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChosenRecipe {
    Selected { recipe: CandidateRecipe },
    Placeholder,
}

impl ChosenRecipe {
    pub fn recipe(&self) -> Option<&CandidateRecipe> {
        match self {
            ChosenRecipe::Selected { recipe } => Some(recipe),
            ChosenRecipe::Placeholder => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ChosenRecipe::Placeholder)
    }
}

/// Catalog recipe row with display macros, fetched in batch for review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecipeDetails {
    pub id: RecipeId,
    pub name: String,
    pub provider_id: Option<i64>,
    pub image_url: Option<String>,
    pub fat_grams_portion: Option<f64>,
    pub carb_grams_portion: Option<f64>,
    pub protein_grams_portion: Option<f64>,
    pub calories_kcal: Option<f64>,
}

/// Full recipe data as returned live by the external provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveRecipe {
    pub provider_id: i64,
    pub title: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub image_url: Option<String>,
    pub nutrition: Option<serde_json::Value>,
}

/// Structured output of the LLM recipe-selection capability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecipeSelection {
    pub chosen_recipe_id: String,
    pub chosen_recipe_name: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub no_suitable_candidate_found: bool,
}

/// Structured output of the LLM recipe-modification capability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModifiedRecipe {
    pub name: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    pub suitability_notes: String,
    #[serde(default)]
    pub modifications_were_made: bool,
}

/// An immutable per-plan recipe version: either an LLM-modified variant or
/// a snapshot of the provider's original.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewRecipeVersion {
    pub name: String,
    pub source_recipe_id: Option<RecipeId>,
    pub provider_id: Option<i64>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub image_url: Option<String>,
    pub nutrition: Option<serde_json::Value>,
    pub is_modified: bool,
    pub suitability_notes: String,
}

#[cfg(test)]
mod tests {
    use super::{CandidateRecipe, ChosenRecipe, RecipeId};

    #[test]
    fn placeholder_carries_no_recipe() {
        let chosen = ChosenRecipe::Placeholder;
        assert!(chosen.is_placeholder());
        assert!(chosen.recipe().is_none());
    }

    #[test]
    fn chosen_recipe_serializes_with_kind_tag() {
        let chosen = ChosenRecipe::Selected {
            recipe: CandidateRecipe {
                id: RecipeId("r-1".to_string()),
                name: "Lentil Soup".to_string(),
                provider_id: Some(715415),
                image_url: None,
            },
        };

        let json = serde_json::to_value(&chosen).expect("serialize");
        assert_eq!(json["kind"], "selected");
        assert_eq!(json["recipe"]["id"], "r-1");

        let placeholder = serde_json::to_value(ChosenRecipe::Placeholder).expect("serialize");
        assert_eq!(placeholder["kind"], "placeholder");
    }
}
