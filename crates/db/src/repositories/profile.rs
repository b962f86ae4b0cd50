use sqlx::Row;

use nestplan_core::domain::profile::{UserId, UserProfile};

use super::{ProfileRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProfileRepository {
    pool: DbPool,
}

impl SqlProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn placeholders(count: usize) -> String {
    std::iter::repeat("?").take(count).collect::<Vec<_>>().join(", ")
}

#[async_trait::async_trait]
impl ProfileRepository for SqlProfileRepository {
    async fn find_by_names(&self, names: &[String]) -> Result<Vec<UserProfile>, RepositoryError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let lowered: Vec<String> = names.iter().map(|name| name.trim().to_lowercase()).collect();

        let sql = format!(
            "SELECT id, user_name, lifestyle, diet_type
             FROM users
             WHERE lower(user_name) IN ({})
             ORDER BY user_name",
            placeholders(lowered.len())
        );
        let mut query = sqlx::query(&sql);
        for name in &lowered {
            query = query.bind(name);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut profiles = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String =
                row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let user_name: String =
                row.try_get("user_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let lifestyle: Option<String> =
                row.try_get("lifestyle").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let diet_type: Option<String> =
                row.try_get("diet_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;

            let allergies = self.allergies_for_user(&id).await?;
            profiles.push(UserProfile {
                id: UserId(id),
                user_name,
                lifestyle,
                diet_type,
                allergies,
            });
        }

        Ok(profiles)
    }
}

impl SqlProfileRepository {
    async fn allergies_for_user(&self, user_id: &str) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT a.name
             FROM user_allergies ua
             JOIN attributes a ON a.id = ua.attribute_id
             WHERE ua.user_id = ? AND a.type = 'allergen'
             ORDER BY a.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::SqlProfileRepository;
    use crate::repositories::ProfileRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn insert_user(pool: &sqlx::SqlitePool, id: &str, name: &str, lifestyle: Option<&str>) {
        sqlx::query("INSERT INTO users (id, user_name, lifestyle, diet_type) VALUES (?, ?, ?, NULL)")
            .bind(id)
            .bind(name)
            .bind(lifestyle)
            .execute(pool)
            .await
            .expect("insert user");
    }

    async fn insert_allergy(pool: &sqlx::SqlitePool, user_id: &str, attr_id: &str, name: &str) {
        sqlx::query("INSERT INTO attributes (id, name, type, is_hard_trait) VALUES (?, ?, 'allergen', 1)")
            .bind(attr_id)
            .bind(name)
            .execute(pool)
            .await
            .expect("insert attribute");
        sqlx::query("INSERT INTO user_allergies (user_id, attribute_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(attr_id)
            .execute(pool)
            .await
            .expect("insert user allergy");
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive_and_joins_allergies() {
        let pool = setup().await;
        insert_user(&pool, "u-1", "alice", Some("vegetarian")).await;
        insert_allergy(&pool, "u-1", "a-peanut", "peanut").await;

        let repo = SqlProfileRepository::new(pool);
        let profiles =
            repo.find_by_names(&["ALICE ".to_string()]).await.expect("find profiles");

        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].user_name, "alice");
        assert_eq!(profiles[0].lifestyle.as_deref(), Some("vegetarian"));
        assert_eq!(profiles[0].allergies, vec!["peanut".to_string()]);
    }

    #[tokio::test]
    async fn unknown_names_are_dropped() {
        let pool = setup().await;
        insert_user(&pool, "u-1", "alice", None).await;

        let repo = SqlProfileRepository::new(pool);
        let profiles = repo
            .find_by_names(&["alice".to_string(), "nobody".to_string()])
            .await
            .expect("find profiles");

        assert_eq!(profiles.len(), 1);
    }

    #[tokio::test]
    async fn empty_name_list_short_circuits() {
        let pool = setup().await;
        let repo = SqlProfileRepository::new(pool);

        let profiles = repo.find_by_names(&[]).await.expect("find profiles");
        assert!(profiles.is_empty());
    }
}
