//! Progress Tracking
//!
//! Step completion, unlock rules, points and the storage-backed learning
//! service built on top of them.

#![warn(missing_docs)]

pub mod tracker;
pub mod unlock;
pub mod catalog;
pub mod gamification;
pub mod admin;
pub mod service;

pub use tracker::{
    compute_percent, mark_step_complete, view_step, is_project_unlocked, is_tier_unlocked,
    is_sequential_project_unlocked,
};
pub use unlock::UnlockPolicy;
pub use catalog::{CatalogQuery, SortOrder, DashboardStats, search, flat_ordering, dashboard_stats};
pub use gamification::{LeaderboardEntry, award_completion, update_streak, leaderboard};
pub use admin::AdminAllowList;
pub use service::{
    LearningService, ServiceConfig, ServiceError, ProjectView, StepOutcome, CatalogEntry,
};
