//! Stepwise core data models.
//!
//! This crate defines the records shared by the storage backends, the
//! progress tracker and the CLI: projects and their steps, per-learner
//! progress records and user accounts.

#![warn(missing_docs)]

// Core identities
mod id;

// Content
mod project;
mod validate;

// Learner state
mod progress;
mod user;

// Re-exports
pub use id::*;

pub use project::{Project, Step, Difficulty};
pub use validate::{ValidationError, normalize_tag};
pub use progress::ProgressRecord;
pub use user::{UserAccount, AuthIdentity};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
