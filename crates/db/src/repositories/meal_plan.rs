use chrono::NaiveDate;
use sqlx::Row;
use uuid::Uuid;

use nestplan_core::domain::plan::{
    EntryId, NewMealPlan, NewMealPlanEntry, NewParticipant, PlanId,
};
use nestplan_core::domain::recipe::{NewRecipeVersion, RecipeVersionId};
use nestplan_core::MealType;

use super::{MealPlanRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMealPlanRepository {
    pool: DbPool,
}

impl SqlMealPlanRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn date_str(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Decode(e.to_string()))
}

#[async_trait::async_trait]
impl MealPlanRepository for SqlMealPlanRepository {
    async fn create_plan(&self, plan: NewMealPlan) -> Result<PlanId, RepositoryError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO meal_plans (id, user_id, name, description, start_date, end_date)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&plan.user_id.0)
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(date_str(plan.start_date))
        .bind(date_str(plan.end_date))
        .execute(&self.pool)
        .await?;

        Ok(PlanId(id))
    }

    async fn insert_entries(
        &self,
        plan_id: &PlanId,
        entries: &[NewMealPlanEntry],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            let id = Uuid::new_v4().to_string();
            let context = to_json(&entry.modification_context)?;
            sqlx::query(
                "INSERT INTO meal_plan_entries
                     (id, meal_plan_id, meal_date, meal_type, primary_recipe_id,
                      servings, notes, modification_context)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&plan_id.0)
            .bind(date_str(entry.meal_date))
            .bind(entry.meal_type.as_str())
            .bind(&entry.primary_recipe_id.0)
            .bind(entry.servings as i64)
            .bind(&entry.notes)
            .bind(&context)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_entry_notes(
        &self,
        plan_id: &PlanId,
        meal_date: NaiveDate,
        meal_type: MealType,
        notes: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE meal_plan_entries
             SET notes = ?, updated_at = datetime('now')
             WHERE meal_plan_id = ? AND meal_date = ? AND meal_type = ?",
        )
        .bind(notes)
        .bind(&plan_id.0)
        .bind(date_str(meal_date))
        .bind(meal_type.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_entry_id(
        &self,
        plan_id: &PlanId,
        meal_date: NaiveDate,
        meal_type: MealType,
    ) -> Result<Option<EntryId>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id FROM meal_plan_entries
             WHERE meal_plan_id = ? AND meal_date = ? AND meal_type = ?
             LIMIT 1",
        )
        .bind(&plan_id.0)
        .bind(date_str(meal_date))
        .bind(meal_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let id: String =
                    row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                Ok(Some(EntryId(id)))
            }
            None => Ok(None),
        }
    }

    async fn insert_recipe_version(
        &self,
        version: &NewRecipeVersion,
    ) -> Result<RecipeVersionId, RepositoryError> {
        let id = Uuid::new_v4().to_string();
        let ingredients = to_json(&version.ingredients)?;
        let instructions = to_json(&version.instructions)?;
        let nutrition = version.nutrition.as_ref().map(to_json).transpose()?;

        sqlx::query(
            "INSERT INTO recipe_versions
                 (id, name, source_recipe_id, provider_id, ingredients, instructions,
                  image_url, nutrition, is_modified, suitability_notes)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&version.name)
        .bind(version.source_recipe_id.as_ref().map(|id| id.0.as_str()))
        .bind(version.provider_id)
        .bind(&ingredients)
        .bind(&instructions)
        .bind(&version.image_url)
        .bind(&nutrition)
        .bind(version.is_modified)
        .bind(&version.suitability_notes)
        .execute(&self.pool)
        .await?;

        Ok(RecipeVersionId(id))
    }

    async fn insert_participants(
        &self,
        participants: &[NewParticipant],
    ) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for participant in participants {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO meal_plan_entry_participants
                     (id, meal_plan_entry_id, user_id, assigned_recipe_id,
                      recipe_version_id, is_modified_version, participant_notes)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&participant.entry_id.0)
            .bind(&participant.user_id.0)
            .bind(&participant.assigned_recipe_id.0)
            .bind(participant.recipe_version_id.as_ref().map(|id| id.0.as_str()))
            .bind(participant.is_modified_version)
            .bind(&participant.notes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(participants.len())
    }
}
