use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub user_name: String,
    pub lifestyle: Option<String>,
    pub diet_type: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
}

/// Dietary constraints aggregated across a slot's attendees. Allergies are
/// hard constraints; diets may be relaxed during candidate selection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedNeeds {
    pub allergies: Vec<String>,
    pub diets: Vec<String>,
}

impl AggregatedNeeds {
    pub fn from_profiles(profiles: &[UserProfile]) -> Self {
        let mut allergies: Vec<String> = profiles
            .iter()
            .flat_map(|profile| profile.allergies.iter())
            .map(|allergy| allergy.trim().to_lowercase())
            .filter(|allergy| !allergy.is_empty())
            .collect();
        allergies.sort();
        allergies.dedup();

        let mut diets: Vec<String> = profiles
            .iter()
            .flat_map(|profile| [profile.lifestyle.as_deref(), profile.diet_type.as_deref()])
            .flatten()
            .map(|diet| diet.trim().to_lowercase())
            .filter(|diet| !diet.is_empty())
            .collect();
        diets.sort();
        diets.dedup();

        Self { allergies, diets }
    }

    pub fn is_empty(&self) -> bool {
        self.allergies.is_empty() && self.diets.is_empty()
    }
}
