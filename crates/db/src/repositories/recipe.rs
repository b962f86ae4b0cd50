use sqlx::Row;

use nestplan_core::domain::profile::AggregatedNeeds;
use nestplan_core::domain::recipe::{CandidateRecipe, RecipeDetails, RecipeId};
use nestplan_core::MealType;

use super::{RecipeRepository, RepositoryError};
use crate::DbPool;

pub struct SqlRecipeRepository {
    pool: DbPool,
}

impl SqlRecipeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Attribute ids split by strictness. Allergen suitability is always hard;
/// diet and meal-type attributes carry their own hardness flag.
#[derive(Debug, Default)]
struct ClassifiedAttributes {
    hard: Vec<String>,
    soft: Vec<String>,
}

fn placeholders(count: usize) -> String {
    std::iter::repeat("?").take(count).collect::<Vec<_>>().join(", ")
}

fn row_to_candidate(row: &sqlx::sqlite::SqliteRow) -> Result<CandidateRecipe, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let provider_id: Option<i64> =
        row.try_get("provider_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let image_url: Option<String> =
        row.try_get("image_url").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(CandidateRecipe { id: RecipeId(id), name, provider_id, image_url })
}

impl SqlRecipeRepository {
    async fn classify_attributes(
        &self,
        needs: &AggregatedNeeds,
        meal_type: MealType,
    ) -> Result<ClassifiedAttributes, RepositoryError> {
        let mut names: Vec<String> = needs
            .diets
            .iter()
            .chain(needs.allergies.iter())
            .map(|name| name.trim().to_lowercase())
            .collect();
        names.push(meal_type.as_str().to_string());
        names.sort();
        names.dedup();

        let sql = format!(
            "SELECT id, name, type, is_hard_trait FROM attributes WHERE lower(name) IN ({})",
            placeholders(names.len())
        );
        let mut query = sqlx::query(&sql);
        for name in &names {
            query = query.bind(name);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut classified = ClassifiedAttributes::default();
        for row in rows {
            let id: String =
                row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let kind: String =
                row.try_get("type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let is_hard: bool =
                row.try_get("is_hard_trait").map_err(|e| RepositoryError::Decode(e.to_string()))?;

            match (kind.as_str(), is_hard) {
                ("allergen", _) => classified.hard.push(id),
                (_, true) => classified.hard.push(id),
                (_, false) => classified.soft.push(id),
            }
        }

        Ok(classified)
    }

    /// Recipes carrying every one of the given attributes, by intersection.
    async fn recipes_with_all_attributes(
        &self,
        attribute_ids: &[String],
        limit: u32,
    ) -> Result<Vec<CandidateRecipe>, RepositoryError> {
        if attribute_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT r.id, r.name, r.provider_id, r.image_url
             FROM recipes r
             JOIN recipe_attributes ra ON ra.recipe_id = r.id
             WHERE ra.attribute_id IN ({})
             GROUP BY r.id
             HAVING COUNT(DISTINCT ra.attribute_id) = ?
             ORDER BY r.name
             LIMIT ?",
            placeholders(attribute_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in attribute_ids {
            query = query.bind(id);
        }
        let rows =
            query.bind(attribute_ids.len() as i64).bind(limit).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_candidate).collect()
    }

    async fn sample(&self, limit: u32) -> Result<Vec<CandidateRecipe>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, provider_id, image_url FROM recipes ORDER BY name LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_candidate).collect()
    }
}

#[async_trait::async_trait]
impl RecipeRepository for SqlRecipeRepository {
    async fn find_candidates(
        &self,
        needs: &AggregatedNeeds,
        meal_type: MealType,
        limit: u32,
    ) -> Result<Vec<CandidateRecipe>, RepositoryError> {
        let classified = self.classify_attributes(needs, meal_type).await?;

        if classified.hard.is_empty() && classified.soft.is_empty() {
            tracing::debug!(meal_type = %meal_type, "no attribute criteria, sampling catalog");
            return self.sample(limit).await;
        }

        let mut ideal: Vec<String> = classified
            .hard
            .iter()
            .chain(classified.soft.iter())
            .cloned()
            .collect();
        ideal.sort();
        ideal.dedup();

        let candidates = self.recipes_with_all_attributes(&ideal, limit).await?;
        if !candidates.is_empty() {
            return Ok(candidates);
        }

        // Relax soft preferences; hard constraints are never dropped.
        if !classified.soft.is_empty() && !classified.hard.is_empty() {
            tracing::debug!(meal_type = %meal_type, "ideal tier empty, relaxing to hard-only");
            let candidates =
                self.recipes_with_all_attributes(&classified.hard, limit).await?;
            if !candidates.is_empty() {
                return Ok(candidates);
            }
        }

        Ok(Vec::new())
    }

    async fn details_by_ids(
        &self,
        ids: &[RecipeId],
    ) -> Result<Vec<RecipeDetails>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, name, provider_id, image_url, fat_grams_portion, carb_grams_portion,
                    protein_grams_portion, calories_kcal
             FROM recipes WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(&id.0);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let id: String =
                    row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let name: String =
                    row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let provider_id: Option<i64> = row
                    .try_get("provider_id")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let image_url: Option<String> = row
                    .try_get("image_url")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let fat_grams_portion: Option<f64> = row
                    .try_get("fat_grams_portion")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let carb_grams_portion: Option<f64> = row
                    .try_get("carb_grams_portion")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let protein_grams_portion: Option<f64> = row
                    .try_get("protein_grams_portion")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let calories_kcal: Option<f64> = row
                    .try_get("calories_kcal")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;

                Ok(RecipeDetails {
                    id: RecipeId(id),
                    name,
                    provider_id,
                    image_url,
                    fat_grams_portion,
                    carb_grams_portion,
                    protein_grams_portion,
                    calories_kcal,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use nestplan_core::domain::profile::AggregatedNeeds;
    use nestplan_core::domain::recipe::RecipeId;
    use nestplan_core::MealType;

    use super::SqlRecipeRepository;
    use crate::repositories::RecipeRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn insert_attribute(pool: &sqlx::SqlitePool, id: &str, name: &str, kind: &str, hard: bool) {
        sqlx::query("INSERT INTO attributes (id, name, type, is_hard_trait) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(kind)
            .bind(hard)
            .execute(pool)
            .await
            .expect("insert attribute");
    }

    async fn insert_recipe(pool: &sqlx::SqlitePool, id: &str, name: &str, attrs: &[&str]) {
        sqlx::query(
            "INSERT INTO recipes (id, name, provider_id, image_url, calories_kcal)
             VALUES (?, ?, 1000, 'https://img.example/r.jpg', 450.0)",
        )
        .bind(id)
        .bind(name)
        .execute(pool)
        .await
        .expect("insert recipe");

        for attr in attrs {
            sqlx::query("INSERT INTO recipe_attributes (recipe_id, attribute_id) VALUES (?, ?)")
                .bind(id)
                .bind(attr)
                .execute(pool)
                .await
                .expect("insert recipe attribute");
        }
    }

    async fn seed_catalog(pool: &sqlx::SqlitePool) {
        insert_attribute(pool, "a-dinner", "dinner", "meal_type", false).await;
        insert_attribute(pool, "a-veg", "vegetarian", "diet", true).await;
        insert_attribute(pool, "a-lowcarb", "low-carb", "diet", false).await;
        insert_attribute(pool, "a-peanut", "peanut", "allergen", true).await;

        // Fully suitable: every hard and soft attribute.
        insert_recipe(pool, "r-ideal", "Ideal Bowl", &["a-dinner", "a-veg", "a-lowcarb", "a-peanut"])
            .await;
        // Satisfies hard constraints but not the soft low-carb preference.
        insert_recipe(pool, "r-hard", "Hearty Stew", &["a-veg", "a-peanut"]).await;
        // No relevant attributes at all.
        insert_recipe(pool, "r-plain", "Plain Pasta", &[]).await;
    }

    fn needs(diets: &[&str], allergies: &[&str]) -> AggregatedNeeds {
        AggregatedNeeds {
            diets: diets.iter().map(|d| d.to_string()).collect(),
            allergies: allergies.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn ideal_tier_matches_every_attribute() {
        let pool = setup().await;
        seed_catalog(&pool).await;

        let repo = SqlRecipeRepository::new(pool);
        let candidates = repo
            .find_candidates(&needs(&["vegetarian", "low-carb"], &["peanut"]), MealType::Dinner, 3)
            .await
            .expect("find candidates");

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id.0, "r-ideal");
    }

    #[tokio::test]
    async fn second_tier_relaxes_soft_preferences_only() {
        let pool = setup().await;
        seed_catalog(&pool).await;
        // Remove the ideal recipe so tier 1 comes back empty.
        sqlx::query("DELETE FROM recipes WHERE id = 'r-ideal'")
            .execute(&pool)
            .await
            .expect("delete");

        let repo = SqlRecipeRepository::new(pool);
        let candidates = repo
            .find_candidates(&needs(&["vegetarian", "low-carb"], &["peanut"]), MealType::Dinner, 3)
            .await
            .expect("find candidates");

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id.0, "r-hard");
    }

    #[tokio::test]
    async fn unmatchable_hard_constraints_yield_empty() {
        let pool = setup().await;
        seed_catalog(&pool).await;
        insert_attribute(&pool, "a-shellfish", "shellfish", "allergen", true).await;

        let repo = SqlRecipeRepository::new(pool);
        let candidates = repo
            .find_candidates(&needs(&[], &["shellfish"]), MealType::Dinner, 3)
            .await
            .expect("find candidates");

        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn no_known_criteria_samples_the_catalog() {
        let pool = setup().await;
        // Recipes exist but none of the requested names are in the
        // attribute vocabulary, breakfast included.
        insert_recipe(&pool, "r-1", "Anything Omelette", &[]).await;
        insert_recipe(&pool, "r-2", "Basic Toast", &[]).await;

        let repo = SqlRecipeRepository::new(pool);
        let candidates = repo
            .find_candidates(&needs(&[], &[]), MealType::Breakfast, 3)
            .await
            .expect("find candidates");

        assert_eq!(candidates.len(), 2);
    }

    #[tokio::test]
    async fn details_fetch_is_batched_by_id() {
        let pool = setup().await;
        seed_catalog(&pool).await;

        let repo = SqlRecipeRepository::new(pool);
        let details = repo
            .details_by_ids(&[RecipeId("r-ideal".to_string()), RecipeId("r-plain".to_string())])
            .await
            .expect("details");

        assert_eq!(details.len(), 2);
        assert!(details.iter().all(|d| d.calories_kcal == Some(450.0)));
    }
}
