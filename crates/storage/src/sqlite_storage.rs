//! SQLite storage backend.
//!
//! Relational layout: projects and users are kept as JSON rows, progress is a
//! real table keyed by `(user_id, project_id)` with a `progress_percent`
//! column, so percentages can be queried without decoding documents.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use stepwise_core::{Project, ProjectId, ProgressRecord, UserAccount, UserId};
use tracing::debug;

use super::trait_::{Storage, StorageError, Result};

/// SQLite storage implementation.
#[derive(Clone)]
pub struct SqliteStorage {
    /// Database connection pool
    pool: sqlx::SqlitePool,
}

fn db_err(e: sqlx::Error) -> StorageError {
    StorageError::Other(e.to_string())
}

impl SqliteStorage {
    /// Open (creating if needed) a database file.
    pub async fn new_from_path(path: &Path) -> Result<Self> {
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .connect(&url)
            .await
            .map_err(db_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create an in-memory SQLite storage for testing.
    pub async fn in_memory() -> Result<Self> {
        // every pooled connection would get its own private memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(db_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Initialize the database schema.
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS progress (
                user_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                completed_steps TEXT NOT NULL,
                progress_percent INTEGER NOT NULL,
                current_step INTEGER NOT NULL,
                completed INTEGER NOT NULL,
                completed_at TEXT,
                started_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, project_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_progress_project ON progress(project_id)")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    fn decode_data<T: serde::de::DeserializeOwned>(row: &SqliteRow) -> Result<T> {
        let data: String = row.try_get("data").map_err(db_err)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn decode_progress(row: &SqliteRow) -> Result<ProgressRecord> {
        let user_id: String = row.try_get("user_id").map_err(db_err)?;
        let project_id: String = row.try_get("project_id").map_err(db_err)?;
        let steps: String = row.try_get("completed_steps").map_err(db_err)?;
        let percent: i64 = row.try_get("progress_percent").map_err(db_err)?;
        let current_step: i64 = row.try_get("current_step").map_err(db_err)?;
        let completed: bool = row.try_get("completed").map_err(db_err)?;
        let completed_at: Option<String> = row.try_get("completed_at").map_err(db_err)?;
        let started_at: String = row.try_get("started_at").map_err(db_err)?;
        let updated_at: String = row.try_get("updated_at").map_err(db_err)?;

        Ok(ProgressRecord {
            user_id: UserId::new(user_id),
            project_id: project_id
                .parse()
                .map_err(|e| StorageError::Other(format!("bad project id {project_id}: {e}")))?,
            completed_steps: serde_json::from_str(&steps)?,
            progress_percent: u8::try_from(percent)
                .map_err(|_| StorageError::Other(format!("bad progress_percent {percent}")))?,
            current_step: usize::try_from(current_step)
                .map_err(|_| StorageError::Other(format!("bad current_step {current_step}")))?,
            completed,
            completed_at: completed_at.as_deref().map(parse_time).transpose()?,
            started_at: parse_time(&started_at)?,
            updated_at: parse_time(&updated_at)?,
        })
    }
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Other(format!("bad timestamp {s}: {e}")))
}

#[async_trait]
impl Storage for SqliteStorage {
    // === Project operations ===

    async fn save_project(&mut self, project: &Project) -> Result<()> {
        let data = serde_json::to_string(project)?;

        sqlx::query("INSERT OR REPLACE INTO projects (id, data, updated_at) VALUES (?, ?, ?)")
            .bind(project.id.to_string())
            .bind(data)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        debug!(project = %project.id, "saved project row");
        Ok(())
    }

    async fn fetch_project(&self, id: ProjectId) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT data FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(Self::decode_data).transpose()
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query("SELECT data FROM projects")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(Self::decode_data).collect()
    }

    async fn delete_project(&mut self, id: ProjectId) -> Result<()> {
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // === Progress operations ===

    async fn fetch_progress(&self, user: &UserId, project: ProjectId) -> Result<Option<ProgressRecord>> {
        let row = sqlx::query("SELECT * FROM progress WHERE user_id = ? AND project_id = ?")
            .bind(user.as_str())
            .bind(project.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(Self::decode_progress).transpose()
    }

    async fn persist_progress(&mut self, record: &ProgressRecord) -> Result<()> {
        let steps = serde_json::to_string(&record.completed_steps)?;

        sqlx::query(
            "INSERT OR REPLACE INTO progress
                (user_id, project_id, completed_steps, progress_percent, current_step,
                 completed, completed_at, started_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.user_id.as_str())
        .bind(record.project_id.to_string())
        .bind(steps)
        .bind(i64::from(record.progress_percent))
        .bind(record.current_step as i64)
        .bind(record.completed)
        .bind(record.completed_at.map(|t| t.to_rfc3339()))
        .bind(record.started_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn list_progress(&self, user: &UserId) -> Result<Vec<ProgressRecord>> {
        let rows = sqlx::query("SELECT * FROM progress WHERE user_id = ?")
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(Self::decode_progress).collect()
    }

    async fn list_project_progress(&self, project: ProjectId) -> Result<Vec<ProgressRecord>> {
        let rows = sqlx::query("SELECT * FROM progress WHERE project_id = ?")
            .bind(project.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(Self::decode_progress).collect()
    }

    // === User operations ===

    async fn save_user(&mut self, user: &UserAccount) -> Result<()> {
        let data = serde_json::to_string(user)?;

        sqlx::query("INSERT OR REPLACE INTO users (id, data, updated_at) VALUES (?, ?, ?)")
            .bind(user.id.as_str())
            .bind(data)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn fetch_user(&self, id: &UserId) -> Result<Option<UserAccount>> {
        let row = sqlx::query("SELECT data FROM users WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(Self::decode_data).transpose()
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>> {
        let rows = sqlx::query("SELECT data FROM users")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(Self::decode_data).collect()
    }

    async fn persist_user_points_and_completion(
        &mut self,
        id: &UserId,
        total_points: u32,
        completed_project_ids: &BTreeSet<ProjectId>,
    ) -> Result<()> {
        let Some(mut user) = self.fetch_user(id).await? else {
            return Err(StorageError::NotFound(format!("user {}", id)));
        };
        user.total_points = total_points;
        user.completed_project_ids = completed_project_ids.clone();
        self.save_user(&user).await
    }

    async fn delete_user(&mut self, id: &UserId) -> Result<()> {
        sqlx::query("DELETE FROM progress WHERE user_id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::{Difficulty, Step};

    #[tokio::test]
    async fn test_progress_columns_roundtrip() {
        let mut storage = SqliteStorage::in_memory().await.unwrap();
        let now = Utc::now();
        let mut record = ProgressRecord::new(UserId::new("u|1"), ProjectId::new(), now);
        record.completed_steps.extend([0, 1]);
        record.progress_percent = 50;
        record.current_step = 2;

        storage.persist_progress(&record).await.unwrap();
        let loaded = storage
            .fetch_progress(&record.user_id, record.project_id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(loaded.completed_steps, record.completed_steps);
        assert_eq!(loaded.progress_percent, 50);
        assert_eq!(loaded.current_step, 2);
        assert!(!loaded.completed);
        assert!(loaded.completed_at.is_none());
    }

    fn sample_user(uid: &str) -> UserAccount {
        UserAccount {
            id: UserId::new(uid),
            email: format!("{uid}@example.com"),
            display_name: uid.to_string(),
            is_admin: false,
            total_points: 0,
            completed_project_ids: BTreeSet::new(),
            current_streak: 2,
            last_active_on: Some(Utc::now().date_naive()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_completed_record_roundtrip() {
        let mut storage = SqliteStorage::in_memory().await.unwrap();
        let now = Utc::now();
        let mut record = ProgressRecord::new(UserId::new("u|1"), ProjectId::new(), now);
        record.completed_steps.extend([0, 1, 2]);
        record.progress_percent = 100;
        record.current_step = 2;
        record.completed = true;
        record.completed_at = Some(now);

        storage.persist_progress(&record).await.unwrap();
        let loaded = storage.fetch_progress(&record.user_id, record.project_id).await.unwrap();
        assert_eq!(loaded, Some(record));
    }

    #[tokio::test]
    async fn test_progress_by_user_and_by_project() {
        let mut storage = SqliteStorage::in_memory().await.unwrap();
        let project = ProjectId::new();
        let other = ProjectId::new();
        let now = Utc::now();

        let alice = UserId::new("oauth|alice");
        let bob = UserId::new("oauth|bob");
        storage.persist_progress(&ProgressRecord::new(alice.clone(), project, now)).await.unwrap();
        storage.persist_progress(&ProgressRecord::new(alice.clone(), other, now)).await.unwrap();
        storage.persist_progress(&ProgressRecord::new(bob.clone(), project, now)).await.unwrap();

        assert_eq!(storage.list_progress(&alice).await.unwrap().len(), 2);
        assert_eq!(storage.list_project_progress(project).await.unwrap().len(), 2);
        assert!(storage.fetch_progress(&bob, other).await.unwrap().is_none());
        assert!(storage.list_progress(&UserId::new("nobody")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_rows() {
        let mut storage = SqliteStorage::in_memory().await.unwrap();
        let user = sample_user("ada");

        storage.save_user(&user).await.unwrap();
        assert_eq!(storage.fetch_user(&user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(storage.list_users().await.unwrap(), vec![user]);
        assert!(storage.fetch_user(&UserId::new("ghost")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_points_update_requires_existing_user() {
        let mut storage = SqliteStorage::in_memory().await.unwrap();
        let ids: BTreeSet<ProjectId> = [ProjectId::new()].into_iter().collect();

        let err = storage
            .persist_user_points_and_completion(&UserId::new("ghost"), 10, &ids)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));

        let before = sample_user("ada");
        storage.save_user(&before).await.unwrap();
        storage
            .persist_user_points_and_completion(&before.id, 10, &ids)
            .await
            .unwrap();
        let user = storage.fetch_user(&before.id).await.unwrap().unwrap();
        assert_eq!(user.total_points, 10);
        assert_eq!(user.completed_project_ids, ids);
        assert_eq!(user.current_streak, before.current_streak);
    }

    #[tokio::test]
    async fn test_project_rows() {
        let mut storage = SqliteStorage::in_memory().await.unwrap();
        let project = Project::new("Quiz app", Difficulty::Intermediate).with_step(Step::new("State"));

        storage.save_project(&project).await.unwrap();
        assert_eq!(storage.fetch_project(project.id).await.unwrap(), Some(project.clone()));
        assert_eq!(storage.list_projects().await.unwrap().len(), 1);

        storage.delete_project(project.id).await.unwrap();
        assert!(storage.fetch_project(project.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_user_removes_progress_rows() {
        let mut storage = SqliteStorage::in_memory().await.unwrap();
        let user = UserId::new("u1");
        let project = ProjectId::new();
        storage
            .persist_progress(&ProgressRecord::new(user.clone(), project, Utc::now()))
            .await
            .unwrap();

        storage.delete_user(&user).await.unwrap();
        assert!(storage.list_project_progress(project).await.unwrap().is_empty());
    }
}
