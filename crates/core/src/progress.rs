//! Progress record - one learner's state for one project.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use crate::id::{ProjectId, UserId};
use crate::Time;

/// A learner's advancement through one project's steps.
///
/// `(user_id, project_id)` is unique. Values are produced by the progress
/// tracker; nothing should edit `progress_percent` or `completed` by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Learner
    pub user_id: UserId,

    /// Project
    pub project_id: ProjectId,

    /// Indices of completed steps
    pub completed_steps: BTreeSet<usize>,

    /// Derived percentage (0-100)
    pub progress_percent: u8,

    /// Step currently being viewed
    pub current_step: usize,

    /// True iff `progress_percent == 100`
    pub completed: bool,

    /// Set once, on the first transition to completed
    pub completed_at: Option<Time>,

    /// First visit
    pub started_at: Time,

    /// Last mutation
    pub updated_at: Time,
}

impl ProgressRecord {
    /// Empty record created on a learner's first visit.
    pub fn new(user_id: UserId, project_id: ProjectId, now: Time) -> Self {
        Self {
            user_id,
            project_id,
            completed_steps: BTreeSet::new(),
            progress_percent: 0,
            current_step: 0,
            completed: false,
            completed_at: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Number of completed steps.
    pub fn completed_count(&self) -> usize {
        self.completed_steps.len()
    }

    /// Whether `step_index` has been completed.
    pub fn is_step_completed(&self, step_index: usize) -> bool {
        self.completed_steps.contains(&step_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_empty() {
        let now = chrono::Utc::now();
        let record = ProgressRecord::new(UserId::new("u1"), ProjectId::new(), now);
        assert_eq!(record.completed_count(), 0);
        assert_eq!(record.progress_percent, 0);
        assert_eq!(record.current_step, 0);
        assert!(!record.completed);
        assert!(record.completed_at.is_none());
        assert_eq!(record.started_at, record.updated_at);
    }

    #[test]
    fn test_record_json_shape() {
        let now = chrono::Utc::now();
        let mut record = ProgressRecord::new(UserId::new("u1"), ProjectId::new(), now);
        record.completed_steps.extend([2, 0]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["completed_steps"], serde_json::json!([0, 2]));
    }
}
