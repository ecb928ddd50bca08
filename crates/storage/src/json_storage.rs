//! JSON file storage implementation.
//!
//! Document-store layout: one JSON document per entity under a root directory,
//! plus a small per-object meta marker (version + updated_at).
//!
//! ```text
//! <root>/projects/<project>.json
//! <root>/users/<user>.json
//! <root>/progress/<user>/<project>.json
//! <root>/meta/<kind>/<id>.meta.json
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use stepwise_core::{Project, ProjectId, ProgressRecord, UserAccount, UserId};
use tokio::fs;
use tracing::{debug, warn};

use super::{Storage, StorageError, Result};

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
}

impl JsonStorage {
    /// Create storage rooted at `root`, creating the directory layout.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("projects")).await?;
        fs::create_dir_all(root.join("users")).await?;
        fs::create_dir_all(root.join("progress")).await?;

        fs::create_dir_all(root.join("meta").join("projects")).await?;
        fs::create_dir_all(root.join("meta").join("users")).await?;
        fs::create_dir_all(root.join("meta").join("progress")).await?;

        debug!(root = %root.display(), "opened json storage");
        Ok(Self { root })
    }

    fn project_path(&self, id: ProjectId) -> PathBuf {
        self.root.join("projects").join(format!("{}.json", id))
    }
    fn user_path(&self, id: &UserId) -> PathBuf {
        self.root.join("users").join(format!("{}.json", file_key(id)))
    }
    fn user_progress_dir(&self, id: &UserId) -> PathBuf {
        self.root.join("progress").join(file_key(id))
    }
    fn progress_path(&self, user: &UserId, project: ProjectId) -> PathBuf {
        self.user_progress_dir(user).join(format!("{}.json", project))
    }

    fn meta_path(&self, kind: &str, id: &str) -> PathBuf {
        self.root.join("meta").join(kind).join(format!("{}.meta.json", id))
    }

    /// Read and increment per-object version, return new version.
    async fn bump_version(&self, kind: &str, id: &str) -> Result<u64> {
        let path = self.meta_path(kind, id);
        let mut version = 0u64;
        if let Ok(s) = fs::read_to_string(&path).await {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&s) {
                if let Some(v) = json.get("version").and_then(|v| v.as_u64()) {
                    version = v;
                }
            }
        }
        version += 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(&path, serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }

    /// Remove the version markers of every progress record of `user`.
    async fn remove_progress_meta(&self, user: &UserId) -> Result<()> {
        let prefix = format!("{}-", file_key(user));
        let mut rd = fs::read_dir(self.root.join("meta").join("progress")).await?;
        while let Some(entry) = rd.next_entry().await? {
            let name = entry.file_name();
            let Some(project) = name
                .to_str()
                .and_then(|n| n.strip_prefix(&prefix))
                .and_then(|n| n.strip_suffix(".meta.json"))
            else {
                continue;
            };
            // "a-" must not match the markers of user "a-b"
            if project.parse::<ProjectId>().is_ok() {
                remove_if_exists(&entry.path()).await?;
            }
        }
        Ok(())
    }

    async fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_project(&mut self, project: &Project) -> Result<()> {
        self.write_json(&self.project_path(project.id), project).await?;
        let ver = self.bump_version("projects", &project.id.to_string()).await?;
        debug!(project = %project.id, version = ver, "saved project");
        Ok(())
    }

    async fn fetch_project(&self, id: ProjectId) -> Result<Option<Project>> {
        read_json(&self.project_path(id)).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        list_dir(&self.root.join("projects")).await
    }

    async fn delete_project(&mut self, id: ProjectId) -> Result<()> {
        remove_if_exists(&self.project_path(id)).await?;
        remove_if_exists(&self.meta_path("projects", &id.to_string())).await?;
        Ok(())
    }

    async fn fetch_progress(&self, user: &UserId, project: ProjectId) -> Result<Option<ProgressRecord>> {
        read_json(&self.progress_path(user, project)).await
    }

    async fn persist_progress(&mut self, record: &ProgressRecord) -> Result<()> {
        fs::create_dir_all(self.user_progress_dir(&record.user_id)).await?;
        self.write_json(&self.progress_path(&record.user_id, record.project_id), record).await?;

        let id_str = format!("{}-{}", file_key(&record.user_id), record.project_id);
        self.bump_version("progress", &id_str).await?;
        Ok(())
    }

    async fn list_progress(&self, user: &UserId) -> Result<Vec<ProgressRecord>> {
        let dir = self.user_progress_dir(user);
        if !fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }
        list_dir(&dir).await
    }

    async fn list_project_progress(&self, project: ProjectId) -> Result<Vec<ProgressRecord>> {
        let mut records = Vec::new();
        let mut rd = fs::read_dir(self.root.join("progress")).await?;
        while let Some(entry) = rd.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let path = entry.path().join(format!("{}.json", project));
            if let Some(record) = read_json(&path).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn save_user(&mut self, user: &UserAccount) -> Result<()> {
        self.write_json(&self.user_path(&user.id), user).await?;
        self.bump_version("users", &file_key(&user.id)).await?;
        Ok(())
    }

    async fn fetch_user(&self, id: &UserId) -> Result<Option<UserAccount>> {
        read_json(&self.user_path(id)).await
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>> {
        list_dir(&self.root.join("users")).await
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
        remove_if_exists(&self.user_path(id)).await?;
        remove_if_exists(&self.meta_path("users", &file_key(id))).await?;

        self.remove_progress_meta(id).await?;
        let dir = self.user_progress_dir(id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// File-name-safe encoding of a provider uid.
///
/// Provider uids may contain `|`, `/` or `@`; anything outside
/// `[A-Za-z0-9._-]` is written as `~XX` (hex byte).
fn file_key(id: &UserId) -> String {
    let mut out = String::with_capacity(id.as_str().len());
    for b in id.as_str().bytes() {
        if b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("~{:02X}", b));
        }
    }
    out
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    fs::remove_file(path).await.or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }
    })?;
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let item = read_json::<T>(&entry.path())
            .await
            .inspect_err(|e| warn!(path = %entry.path().display(), error = %e, "unreadable document"))?;
        if let Some(item) = item {
            items.push(item);
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::{Difficulty, Step};

    fn sample_project() -> Project {
        Project::new("Landing page", Difficulty::Beginner)
            .with_step(Step::new("HTML skeleton"))
            .with_step(Step::new("CSS layout"))
    }

    fn sample_user(uid: &str) -> UserAccount {
        UserAccount {
            id: UserId::new(uid),
            email: format!("{uid}@example.com"),
            display_name: uid.to_string(),
            is_admin: false,
            total_points: 0,
            completed_project_ids: BTreeSet::new(),
            current_streak: 0,
            last_active_on: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_file_key_escapes_separators() {
        assert_eq!(file_key(&UserId::new("github|12/3")), "github~7C12~2F3");
        assert_eq!(file_key(&UserId::new("plain-id_1.x")), "plain-id_1.x");
    }

    #[tokio::test]
    async fn test_project_save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let project = sample_project();

        storage.save_project(&project).await.unwrap();
        let loaded = storage.fetch_project(project.id).await.unwrap().unwrap();
        assert_eq!(loaded, project);
        assert_eq!(storage.list_projects().await.unwrap().len(), 1);

        storage.delete_project(project.id).await.unwrap();
        assert!(storage.fetch_project(project.id).await.unwrap().is_none());
        // deleting twice is fine
        storage.delete_project(project.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_meta_version_increments() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let project = sample_project();

        storage.save_project(&project).await.unwrap();
        storage.save_project(&project).await.unwrap();
        let version = storage.bump_version("projects", &project.id.to_string()).await.unwrap();
        assert_eq!(version, 3);
    }

    #[tokio::test]
    async fn test_progress_by_user_and_by_project() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let project = sample_project();
        let other = ProjectId::new();
        let now = chrono::Utc::now();

        let alice = UserId::new("oauth|alice");
        let bob = UserId::new("oauth|bob");
        storage.persist_progress(&ProgressRecord::new(alice.clone(), project.id, now)).await.unwrap();
        storage.persist_progress(&ProgressRecord::new(alice.clone(), other, now)).await.unwrap();
        storage.persist_progress(&ProgressRecord::new(bob.clone(), project.id, now)).await.unwrap();

        assert_eq!(storage.list_progress(&alice).await.unwrap().len(), 2);
        assert_eq!(storage.list_project_progress(project.id).await.unwrap().len(), 2);
        assert!(storage.fetch_progress(&bob, other).await.unwrap().is_none());
        assert!(storage.list_progress(&UserId::new("nobody")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_points_update_requires_existing_user() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let ids: BTreeSet<ProjectId> = [ProjectId::new()].into_iter().collect();

        let err = storage
            .persist_user_points_and_completion(&UserId::new("ghost"), 10, &ids)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));

        storage.save_user(&sample_user("ada")).await.unwrap();
        storage
            .persist_user_points_and_completion(&UserId::new("ada"), 10, &ids)
            .await
            .unwrap();
        let user = storage.fetch_user(&UserId::new("ada")).await.unwrap().unwrap();
        assert_eq!(user.total_points, 10);
        assert_eq!(user.completed_project_ids, ids);
    }

    #[tokio::test]
    async fn test_delete_user_cascades_progress() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let user = sample_user("grace");
        let project = sample_project();

        storage.save_user(&user).await.unwrap();
        storage
            .persist_progress(&ProgressRecord::new(user.id.clone(), project.id, chrono::Utc::now()))
            .await
            .unwrap();

        let neighbour = UserId::new("grace-b");
        storage
            .persist_progress(&ProgressRecord::new(neighbour.clone(), project.id, chrono::Utc::now()))
            .await
            .unwrap();

        storage.delete_user(&user.id).await.unwrap();
        assert!(storage.fetch_user(&user.id).await.unwrap().is_none());
        assert!(storage.list_progress(&user.id).await.unwrap().is_empty());
        assert_eq!(storage.list_project_progress(project.id).await.unwrap().len(), 1);

        let markers: Vec<String> = std::fs::read_dir(dir.path().join("meta").join("progress"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(markers, vec![format!("grace-b-{}.meta.json", project.id)]);
    }

    #[tokio::test]
    async fn test_corrupt_progress_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let ada = UserId::new("ada");
        let project = sample_project();
        storage
            .persist_progress(&ProgressRecord::new(ada.clone(), project.id, chrono::Utc::now()))
            .await
            .unwrap();

        let path = dir.path().join("progress").join("ada").join(format!("{}.json", project.id));
        std::fs::write(&path, "{ truncated").unwrap();

        assert!(matches!(storage.list_progress(&ada).await, Err(StorageError::Json(_))));
        assert!(matches!(storage.fetch_progress(&ada, project.id).await, Err(StorageError::Json(_))));
        assert!(storage.list_project_progress(project.id).await.is_err());
    }
}
