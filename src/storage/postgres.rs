use crate::models::{Project, UserProfile};
use crate::storage::{ProfileStore, StorageError, StorageResult};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let row = sqlx::query_as::<_, (String, Option<String>, i64, String)>(
            r#"
            SELECT user_id, email, created_at, projects
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(decode_profile).transpose()
    }

    async fn store_projects(&self, user_id: &str, projects: &[Project]) -> Result<()> {
        let raw = serde_json::to_string(projects).context("failed to encode project list")?;

        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET projects = $1
            WHERE user_id = $2
            "#,
        )
        .bind(raw)
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("no profile document for user '{user_id}'"));
        }

        Ok(())
    }
}

#[async_trait]
impl ProfileStore for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                email TEXT,
                created_at BIGINT NOT NULL,
                projects TEXT NOT NULL DEFAULT '[]'
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn ensure_profile(&self, user_id: &str, email: Option<&str>) -> Result<UserProfile> {
        let created_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_secs() as i64;

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, email, created_at, projects)
            VALUES ($1, $2, $3, '[]')
            ON CONFLICT (user_id) DO UPDATE SET
                email = COALESCE(profiles.email, excluded.email)
            "#,
        )
        .bind(user_id)
        .bind(email)
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await?;

        self.load_profile(user_id)
            .await?
            .ok_or_else(|| anyhow!("profile for user '{user_id}' missing after upsert"))
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.load_profile(user_id).await
    }

    async fn list_projects(&self, user_id: &str) -> Result<Vec<Project>> {
        Ok(self
            .load_profile(user_id)
            .await?
            .map(|profile| profile.projects)
            .unwrap_or_default())
    }

    async fn add_project(&self, user_id: &str, project: &Project) -> StorageResult<Vec<Project>> {
        let profile = self
            .load_profile(user_id)
            .await?
            .ok_or_else(|| anyhow!("no profile document for user '{user_id}'"))?;

        let mut projects = profile.projects;
        if projects.iter().any(|p| p.id == project.id) {
            return Err(StorageError::Conflict);
        }

        projects.push(project.clone());
        self.store_projects(user_id, &projects).await?;

        Ok(projects)
    }

    async fn remove_project(&self, user_id: &str, project_id: &str) -> StorageResult<Vec<Project>> {
        let profile = self
            .load_profile(user_id)
            .await?
            .ok_or_else(|| anyhow!("no profile document for user '{user_id}'"))?;

        let mut projects = profile.projects;
        let before = projects.len();
        projects.retain(|p| p.id != project_id);

        if projects.len() == before {
            return Err(StorageError::NotFound);
        }

        self.store_projects(user_id, &projects).await?;

        Ok(projects)
    }
}

fn decode_profile(row: (String, Option<String>, i64, String)) -> Result<UserProfile> {
    let (user_id, email, created_at, raw_projects) = row;
    let projects: Vec<Project> =
        serde_json::from_str(&raw_projects).context("failed to decode stored project list")?;

    Ok(UserProfile {
        user_id,
        email,
        created_at,
        projects,
    })
}
