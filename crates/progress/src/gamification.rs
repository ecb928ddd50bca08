//! Points, streaks and the leaderboard.

use chrono::NaiveDate;
use serde::Serialize;
use stepwise_core::{Project, ProgressRecord, UserAccount, UserId};

/// Award a project's points for a completed `record` not yet paid out.
///
/// Returns the updated account, or `None` when nothing is owed: the record
/// is incomplete or the project is already in the account's completed set.
/// The completed set is the only guard, so a completion whose points write
/// failed is paid on the next call and a replay pays nothing.
pub fn award_completion(
    account: &UserAccount,
    project: &Project,
    record: &ProgressRecord,
) -> Option<UserAccount> {
    if !record.completed || account.has_completed(project.id) {
        return None;
    }
    let mut updated = account.clone();
    updated.total_points = updated.total_points.saturating_add(project.points);
    updated.completed_project_ids.insert(project.id);
    Some(updated)
}

/// Count `today` towards the account's streak of consecutive active days.
///
/// Same day: unchanged. Next day: +1. Any gap, or no prior activity: 1.
/// A `last_active_on` later than `today` (clock skew) is left alone.
pub fn update_streak(account: &UserAccount, today: NaiveDate) -> UserAccount {
    let mut updated = account.clone();
    match account.last_active_on {
        Some(last) if last >= today => return updated,
        Some(last) if last.succ_opt() == Some(today) => {
            updated.current_streak = account.current_streak.saturating_add(1);
        }
        _ => updated.current_streak = 1,
    }
    updated.last_active_on = Some(today);
    updated
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based rank; equal points share a rank
    pub rank: usize,
    /// Learner
    pub user_id: UserId,
    /// Shown name
    pub display_name: String,
    /// Points
    pub total_points: u32,
    /// Completed project count
    pub completed_projects: usize,
}

/// Top `limit` learners by points.
///
/// Ties on points are ordered by completed projects, then display name, but
/// share the same rank ("1, 1, 3").
pub fn leaderboard(users: &[UserAccount], limit: usize) -> Vec<LeaderboardEntry> {
    let mut sorted: Vec<&UserAccount> = users.iter().collect();
    sorted.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then_with(|| b.completed_project_ids.len().cmp(&a.completed_project_ids.len()))
            .then_with(|| a.display_name.cmp(&b.display_name))
    });

    let mut entries: Vec<LeaderboardEntry> = Vec::with_capacity(limit.min(sorted.len()));
    for (index, user) in sorted.into_iter().take(limit).enumerate() {
        let rank = match entries.last() {
            Some(prev) if prev.total_points == user.total_points => prev.rank,
            _ => index + 1,
        };
        entries.push(LeaderboardEntry {
            rank,
            user_id: user.id.clone(),
            display_name: user.display_name.clone(),
            total_points: user.total_points,
            completed_projects: user.completed_project_ids.len(),
        });
    }
    entries
}
