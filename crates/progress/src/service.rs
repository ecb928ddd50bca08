//! Learning service: storage-backed use cases over the pure tracker.
//!
//! Every operation follows the same shape: fetch records, derive the next
//! state with [`crate::tracker`] / [`crate::gamification`], write it back.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use stepwise_core::{
    AuthIdentity, Project, ProjectId, ProgressRecord, UserAccount, UserId, ValidationError,
};
use stepwise_storage::{Storage, StorageError};
use tracing::{debug, info, warn};

use crate::admin::AdminAllowList;
use crate::catalog::{dashboard_stats, search, CatalogQuery, DashboardStats};
use crate::gamification::{award_completion, leaderboard, update_streak, LeaderboardEntry};
use crate::tracker::{mark_step_complete, view_step};
use crate::unlock::UnlockPolicy;

/// Error type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Backend failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// No such project
    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),

    /// No such account
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// Unlock rule not satisfied yet
    #[error("project {0} is locked")]
    ProjectLocked(ProjectId),

    /// Step index outside the project
    #[error("step {index} out of range ({total} steps)")]
    StepOutOfRange {
        /// Requested index
        index: usize,
        /// Steps in the project
        total: usize,
    },

    /// Admin-only operation attempted by a learner
    #[error("{0} is not an admin")]
    NotAuthorized(UserId),

    /// Project content rejected
    #[error("invalid project: {0}")]
    InvalidProject(#[from] ValidationError),

    /// Create with an id that is already taken
    #[error("project already exists: {0}")]
    ProjectExists(ProjectId),

    /// Update would drop steps learners have progress on
    #[error("project {id} has recorded progress; cannot shrink from {existing} to {proposed} steps")]
    StepsRemoved {
        /// Project
        id: ProjectId,
        /// Current step count
        existing: usize,
        /// Step count of the update
        proposed: usize,
    },
}

/// Configuration injected at startup.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Admin email allow-list
    pub admins: AdminAllowList,
    /// Unlock mode applied to every project
    pub unlock_policy: UnlockPolicy,
}

/// A project opened by a learner.
#[derive(Debug, Clone)]
pub struct ProjectView {
    /// Project content
    pub project: Project,
    /// Learner's record (created on first visit)
    pub record: ProgressRecord,
}

impl ProjectView {
    /// The step the learner is on.
    pub fn current_step(&self) -> Option<&stepwise_core::Step> {
        self.project.step(self.record.current_step)
    }
}

/// Result of completing a step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Record after the step
    pub record: ProgressRecord,
    /// True when this call finished the project
    pub newly_completed: bool,
    /// Points granted by this call
    pub points_awarded: u32,
    /// Account after the step
    pub account: UserAccount,
}

/// One catalog row with the learner's state.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Project
    pub project: Project,
    /// Learner's progress, 0 when never started
    pub progress_percent: u8,
    /// Learner completed it
    pub completed: bool,
    /// Learner may open it
    pub unlocked: bool,
}

/// Storage-backed learning service.
pub struct LearningService<S: Storage> {
    storage: S,
    config: ServiceConfig,
}

impl<S: Storage> LearningService<S> {
    /// Create a new service.
    pub fn new(storage: S, config: ServiceConfig) -> Self {
        Self { storage, config }
    }

    /// Active unlock mode.
    pub fn unlock_policy(&self) -> UnlockPolicy {
        self.config.unlock_policy
    }

    /// Borrow the backing storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    // === Accounts ===

    /// Load or create the account for a signed-in identity.
    ///
    /// The admin flag is recomputed from the allow-list on every sign-in, and
    /// `today` counts towards the streak.
    pub async fn sign_in(&mut self, identity: &AuthIdentity, today: NaiveDate) -> Result<UserAccount> {
        let id = UserId::new(identity.uid.clone());
        let existing = self.storage.fetch_user(&id).await?;
        let is_new = existing.is_none();

        let mut account = existing.unwrap_or_else(|| UserAccount::from_identity(identity, Utc::now()));
        account.email = identity.email.clone();
        account.display_name = identity.display_name.clone();
        account.is_admin = self.config.admins.is_admin(&identity.email);
        let account = update_streak(&account, today);

        self.storage.save_user(&account).await?;
        info!(user = %account.id, new = is_new, admin = account.is_admin, "signed in");
        Ok(account)
    }

    /// Load an account.
    pub async fn account(&self, user: &UserId) -> Result<UserAccount> {
        self.storage
            .fetch_user(user)
            .await?
            .ok_or_else(|| ServiceError::UserNotFound(user.clone()))
    }

    /// Delete an account and all of its progress.
    pub async fn delete_account(&mut self, user: &UserId) -> Result<()> {
        self.account(user).await?;
        self.storage.delete_user(user).await?;
        info!(user = %user, "deleted account");
        Ok(())
    }

    // === Learning ===

    /// Open a project, creating the learner's record on first visit.
    pub async fn open_project(&mut self, user: &UserId, project_id: ProjectId) -> Result<ProjectView> {
        self.account(user).await?;
        let project = self.project(project_id).await?;

        if let Some(record) = self.storage.fetch_progress(user, project_id).await? {
            return Ok(ProjectView { project, record });
        }

        let catalog = self.storage.list_projects().await?;
        let records = self.records_by_project(user).await?;
        if !self.config.unlock_policy.is_unlocked(&project, &catalog, &records) {
            debug!(user = %user, project = %project_id, "project locked");
            return Err(ServiceError::ProjectLocked(project_id));
        }

        let record = ProgressRecord::new(user.clone(), project_id, Utc::now());
        self.storage.persist_progress(&record).await?;
        info!(user = %user, project = %project_id, "started project");
        Ok(ProjectView { project, record })
    }

    /// Navigate to a step.
    pub async fn view_step(
        &mut self,
        user: &UserId,
        project_id: ProjectId,
        step_index: usize,
    ) -> Result<ProjectView> {
        let view = self.open_project(user, project_id).await?;
        check_step(&view.project, step_index)?;

        let record = view_step(&view.record, step_index, view.project.total_steps());
        if record != view.record {
            self.storage.persist_progress(&record).await?;
        }
        Ok(ProjectView { project: view.project, record })
    }

    /// Complete a step, awarding the project's points on first completion.
    ///
    /// Points owed for a completed record are paid on any later call if the
    /// earlier points write failed.
    pub async fn complete_step(
        &mut self,
        user: &UserId,
        project_id: ProjectId,
        step_index: usize,
    ) -> Result<StepOutcome> {
        let ProjectView { project, record: previous } = self.open_project(user, project_id).await?;
        check_step(&project, step_index)?;

        let now = Utc::now();
        let record = mark_step_complete(&previous, step_index, project.total_steps(), now);
        if record != previous {
            self.storage.persist_progress(&record).await?;
        }
        debug!(
            user = %user,
            project = %project_id,
            step = step_index,
            percent = record.progress_percent,
            "step completed"
        );

        let before = self.account(user).await?;
        let mut account = update_streak(&before, now.date_naive());
        if account != before {
            self.storage.save_user(&account).await?;
        }

        let mut newly_completed = record.completed && !previous.completed;
        let mut points_awarded = 0;
        if let Some(awarded) = award_completion(&account, &project, &record) {
            self.storage
                .persist_user_points_and_completion(
                    &awarded.id,
                    awarded.total_points,
                    &awarded.completed_project_ids,
                )
                .await?;
            points_awarded = awarded.total_points - account.total_points;
            account = awarded;
            newly_completed = true;
            info!(user = %user, project = %project_id, points = points_awarded, "project completed");
        }

        Ok(StepOutcome {
            newly_completed,
            record,
            points_awarded,
            account,
        })
    }

    /// Catalog rows matching `query`, with the learner's state.
    pub async fn catalog(&self, user: &UserId, query: &CatalogQuery) -> Result<Vec<CatalogEntry>> {
        let projects = self.storage.list_projects().await?;
        let records = self.records_by_project(user).await?;

        Ok(search(&projects, query)
            .into_iter()
            .map(|project| {
                let record = records.get(&project.id);
                CatalogEntry {
                    progress_percent: record.map_or(0, |r| r.progress_percent),
                    completed: record.is_some_and(|r| r.completed),
                    unlocked: record.is_some()
                        || self.config.unlock_policy.is_unlocked(project, &projects, &records),
                    project: project.clone(),
                }
            })
            .collect())
    }

    /// Dashboard figures over the learner's records of existing projects.
    pub async fn dashboard(&self, user: &UserId) -> Result<DashboardStats> {
        let projects = self.storage.list_projects().await?;
        let records: Vec<ProgressRecord> = self
            .storage
            .list_progress(user)
            .await?
            .into_iter()
            .filter(|r| projects.iter().any(|p| p.id == r.project_id))
            .collect();
        Ok(dashboard_stats(&records))
    }

    /// Top learners by points.
    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let users = self.storage.list_users().await?;
        Ok(leaderboard(&users, limit))
    }

    // === Admin ===

    /// Publish a new project.
    pub async fn create_project(&mut self, actor: &UserId, mut project: Project) -> Result<Project> {
        self.require_admin(actor).await?;
        project.normalize_tags();
        project.validate()?;
        if self.storage.fetch_project(project.id).await?.is_some() {
            return Err(ServiceError::ProjectExists(project.id));
        }

        let now = Utc::now();
        project.created_at = now;
        project.updated_at = now;
        self.storage.save_project(&project).await?;
        info!(actor = %actor, project = %project.id, title = %project.title, "created project");
        Ok(project)
    }

    /// Replace a project's content.
    ///
    /// Once anyone has progress on it, steps may be appended but not removed,
    /// so recorded step indices stay valid.
    pub async fn update_project(&mut self, actor: &UserId, mut project: Project) -> Result<Project> {
        self.require_admin(actor).await?;
        project.normalize_tags();
        project.validate()?;
        let existing = self.project(project.id).await?;

        if project.total_steps() < existing.total_steps()
            && !self.storage.list_project_progress(project.id).await?.is_empty()
        {
            return Err(ServiceError::StepsRemoved {
                id: project.id,
                existing: existing.total_steps(),
                proposed: project.total_steps(),
            });
        }

        project.created_at = existing.created_at;
        project.updated_at = Utc::now();
        self.storage.save_project(&project).await?;
        info!(actor = %actor, project = %project.id, "updated project");
        Ok(project)
    }

    /// Remove a project. Learner records are kept.
    pub async fn delete_project(&mut self, actor: &UserId, project_id: ProjectId) -> Result<()> {
        self.require_admin(actor).await?;
        self.project(project_id).await?;
        self.storage.delete_project(project_id).await?;
        info!(actor = %actor, project = %project_id, "deleted project");
        Ok(())
    }

    // === Helpers ===

    async fn project(&self, id: ProjectId) -> Result<Project> {
        self.storage
            .fetch_project(id)
            .await?
            .ok_or(ServiceError::ProjectNotFound(id))
    }

    async fn records_by_project(&self, user: &UserId) -> Result<HashMap<ProjectId, ProgressRecord>> {
        Ok(self
            .storage
            .list_progress(user)
            .await?
            .into_iter()
            .map(|r| (r.project_id, r))
            .collect())
    }

    async fn require_admin(&self, actor: &UserId) -> Result<()> {
        let account = self.account(actor).await?;
        if account.is_admin {
            Ok(())
        } else {
            warn!(user = %actor, "admin operation denied");
            Err(ServiceError::NotAuthorized(actor.clone()))
        }
    }
}

fn check_step(project: &Project, index: usize) -> Result<()> {
    if index < project.total_steps() {
        Ok(())
    } else {
        Err(ServiceError::StepOutOfRange {
            index,
            total: project.total_steps(),
        })
    }
}
