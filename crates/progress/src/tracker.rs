//! Progress tracker: pure computations over progress records.
//!
//! Nothing here touches storage. Callers fetch records, derive the next
//! state with these functions and write it back themselves. Out-of-range
//! indices are caller bugs and panic instead of being clamped, since a
//! clamped index would be persisted silently.

use std::collections::HashMap;

use stepwise_core::{Difficulty, Project, ProjectId, ProgressRecord, Time};

/// `round(100 * completed_count / total_steps)`, halves rounding up.
///
/// A project without steps is 0% complete.
///
/// # Panics
///
/// If `completed_count > total_steps` (with `total_steps > 0`).
pub fn compute_percent(total_steps: usize, completed_count: usize) -> u8 {
    if total_steps == 0 {
        return 0;
    }
    assert!(
        completed_count <= total_steps,
        "completed count {completed_count} exceeds total steps {total_steps}"
    );
    ((completed_count * 200 + total_steps) / (total_steps * 2)) as u8
}

/// Record completion of `step_index` and return the next record.
///
/// Re-marking a completed step leaves the record unchanged. `completed` and
/// `completed_at` are set only on the first transition to 100%.
///
/// # Panics
///
/// If `step_index >= total_steps`.
pub fn mark_step_complete(
    record: &ProgressRecord,
    step_index: usize,
    total_steps: usize,
    now: Time,
) -> ProgressRecord {
    assert!(
        step_index < total_steps,
        "step index {step_index} out of range for {total_steps} steps"
    );

    let mut next = record.clone();
    next.completed_steps.insert(step_index);

    let counted = next.completed_steps.range(..total_steps).count();
    next.progress_percent = compute_percent(total_steps, counted);
    next.current_step = (step_index + 1).min(total_steps - 1);

    if next.progress_percent == 100 && !record.completed {
        next.completed = true;
        next.completed_at = Some(now);
    }

    if next != *record {
        next.updated_at = now;
    }
    next
}

/// Move the learner to `step_index` without touching completion state.
///
/// # Panics
///
/// If `step_index >= total_steps`.
pub fn view_step(record: &ProgressRecord, step_index: usize, total_steps: usize) -> ProgressRecord {
    assert!(
        step_index < total_steps,
        "step index {step_index} out of range for {total_steps} steps"
    );
    ProgressRecord {
        current_step: step_index,
        ..record.clone()
    }
}

/// Tier rule: every project of the preceding tier must be completed.
///
/// Beginner projects are always open. A missing record counts as not
/// completed; an empty preceding tier opens the next one.
pub fn is_project_unlocked(
    difficulty: Difficulty,
    preceding_tier: &[(ProjectId, Option<&ProgressRecord>)],
) -> bool {
    if difficulty == Difficulty::Beginner {
        return true;
    }
    preceding_tier
        .iter()
        .all(|(_, record)| record.is_some_and(|r| r.completed))
}

/// Whether a whole tier is open, deriving its preceding tier from `catalog`.
pub fn is_tier_unlocked(
    difficulty: Difficulty,
    catalog: &[Project],
    records: &HashMap<ProjectId, ProgressRecord>,
) -> bool {
    let Some(preceding) = difficulty.preceding() else {
        return true;
    };
    let tier: Vec<(ProjectId, Option<&ProgressRecord>)> = catalog
        .iter()
        .filter(|p| p.difficulty == preceding)
        .map(|p| (p.id, records.get(&p.id)))
        .collect();
    is_project_unlocked(difficulty, &tier)
}

/// Sequential rule used by the flat list: position 0 is open, position `n`
/// opens once the project at `n - 1` in `ordering` is completed.
///
/// # Panics
///
/// If `order_index` is past the end of a non-empty `ordering`.
pub fn is_sequential_project_unlocked(
    order_index: usize,
    ordering: &[ProjectId],
    records: &HashMap<ProjectId, ProgressRecord>,
) -> bool {
    if order_index == 0 {
        return true;
    }
    assert!(
        order_index < ordering.len(),
        "order index {order_index} out of range for {} projects",
        ordering.len()
    );
    records
        .get(&ordering[order_index - 1])
        .is_some_and(|r| r.completed)
}
