use crate::models::{Project, UserProfile};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("project id already registered")]
    Conflict,
    #[error("project not found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Document store holding one profile per user. The profile's project list
/// is read-modify-written as a whole; concurrent writers are last-wins.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Create the profile document if absent. Idempotent; called on first
    /// authenticated request. A later email claim fills a missing email but
    /// never clears one.
    async fn ensure_profile(&self, user_id: &str, email: Option<&str>) -> Result<UserProfile>;

    /// Get a profile document by user id
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// List the user's registered projects
    async fn list_projects(&self, user_id: &str) -> Result<Vec<Project>>;

    /// Append a project to the user's list. Fails with `Conflict` when a
    /// project with the same id is already registered.
    async fn add_project(&self, user_id: &str, project: &Project) -> StorageResult<Vec<Project>>;

    /// Remove the project with the given id. Fails with `NotFound` when no
    /// project in the list matches.
    async fn remove_project(&self, user_id: &str, project_id: &str) -> StorageResult<Vec<Project>>;
}
