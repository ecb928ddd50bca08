//! User accounts and sign-in identities.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use crate::id::{ProjectId, UserId};
use crate::Time;

/// Identity handed over by the sign-in provider after authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    /// Provider uid
    pub uid: String,

    /// Verified email
    pub email: String,

    /// Name shown on the leaderboard
    pub display_name: String,
}

/// Aggregated learner profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Unique identifier
    pub id: UserId,

    /// Email
    pub email: String,

    /// Display name
    pub display_name: String,

    /// Derived from the admin allow-list at sign-in
    #[serde(default)]
    pub is_admin: bool,

    /// Sum of points of completed projects
    #[serde(default)]
    pub total_points: u32,

    /// Projects completed at least once
    #[serde(default)]
    pub completed_project_ids: BTreeSet<ProjectId>,

    /// Consecutive active days
    #[serde(default)]
    pub current_streak: u32,

    /// Last day with activity
    #[serde(default)]
    pub last_active_on: Option<NaiveDate>,

    /// When created
    pub created_at: Time,
}

impl UserAccount {
    /// Fresh account for a first sign-in.
    pub fn from_identity(identity: &AuthIdentity, now: Time) -> Self {
        Self {
            id: UserId::new(identity.uid.clone()),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            is_admin: false,
            total_points: 0,
            completed_project_ids: BTreeSet::new(),
            current_streak: 0,
            last_active_on: None,
            created_at: now,
        }
    }

    /// Whether the project was ever completed by this user.
    pub fn has_completed(&self, project_id: ProjectId) -> bool {
        self.completed_project_ids.contains(&project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_from_identity() {
        let identity = AuthIdentity {
            uid: "oauth|7".to_string(),
            email: "ada@example.com".to_string(),
            display_name: "Ada".to_string(),
        };
        let account = UserAccount::from_identity(&identity, chrono::Utc::now());
        assert_eq!(account.id.as_str(), "oauth|7");
        assert_eq!(account.total_points, 0);
        assert!(!account.is_admin);
        assert!(account.completed_project_ids.is_empty());
    }

    #[test]
    fn test_account_missing_gamification_fields_default() {
        let json = r#"{
            "id": "u1",
            "email": "a@b.c",
            "display_name": "A",
            "created_at": "2026-01-01T00:00:00Z"
        }"#;
        let account: UserAccount = serde_json::from_str(json).unwrap();
        assert_eq!(account.current_streak, 0);
        assert!(account.last_active_on.is_none());
    }
}
