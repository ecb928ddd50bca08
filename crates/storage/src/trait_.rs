//! Storage trait abstraction.

use std::collections::BTreeSet;

use async_trait::async_trait;
use stepwise_core::{Project, ProjectId, ProgressRecord, UserAccount, UserId};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Repository for Stepwise data.
///
/// Every backend stores the same canonical records; schema differences stay
/// inside the implementation.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Project operations ===

    /// Save a project (create or update).
    async fn save_project(&mut self, project: &Project) -> Result<()>;

    /// Load a project by ID.
    async fn fetch_project(&self, id: ProjectId) -> Result<Option<Project>>;

    /// List all projects.
    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Delete a project. Missing projects are not an error.
    async fn delete_project(&mut self, id: ProjectId) -> Result<()>;

    // === Progress operations ===

    /// Load one learner's record for one project.
    async fn fetch_progress(&self, user: &UserId, project: ProjectId) -> Result<Option<ProgressRecord>>;

    /// Save a progress record (create or update).
    async fn persist_progress(&mut self, record: &ProgressRecord) -> Result<()>;

    /// All records of one learner.
    async fn list_progress(&self, user: &UserId) -> Result<Vec<ProgressRecord>>;

    /// All records against one project.
    async fn list_project_progress(&self, project: ProjectId) -> Result<Vec<ProgressRecord>>;

    // === User operations ===

    /// Save a user account (create or update).
    async fn save_user(&mut self, user: &UserAccount) -> Result<()>;

    /// Load a user account.
    async fn fetch_user(&self, id: &UserId) -> Result<Option<UserAccount>>;

    /// List all user accounts.
    async fn list_users(&self) -> Result<Vec<UserAccount>>;

    /// Overwrite a user's points and completed-project set.
    ///
    /// Fails with [`StorageError::NotFound`] when the account does not exist.
    async fn persist_user_points_and_completion(
        &mut self,
        id: &UserId,
        total_points: u32,
        completed_project_ids: &BTreeSet<ProjectId>,
    ) -> Result<()>;

    /// Delete an account together with all of its progress records.
    async fn delete_user(&mut self, id: &UserId) -> Result<()>;
}
