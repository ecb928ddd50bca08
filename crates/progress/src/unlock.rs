//! Named unlock modes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stepwise_core::{Project, ProjectId, ProgressRecord};

use crate::catalog::flat_ordering;
use crate::tracker::{is_sequential_project_unlocked, is_tier_unlocked};

/// Which rule decides whether a learner may start a project.
///
/// The two rules disagree on when a given project opens, so they stay
/// separate modes rather than being merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlockPolicy {
    /// A tier opens once every project of the tier below is completed.
    #[default]
    Tiered,
    /// A project opens once its predecessor in the flat list is completed.
    Sequential,
}

impl UnlockPolicy {
    /// Whether `project` is open for a learner with `records`.
    ///
    /// `catalog` must contain every published project, `project` included.
    pub fn is_unlocked(
        &self,
        project: &Project,
        catalog: &[Project],
        records: &HashMap<ProjectId, ProgressRecord>,
    ) -> bool {
        match self {
            UnlockPolicy::Tiered => is_tier_unlocked(project.difficulty, catalog, records),
            UnlockPolicy::Sequential => {
                let ordering = flat_ordering(catalog);
                match ordering.iter().position(|id| *id == project.id) {
                    Some(index) => is_sequential_project_unlocked(index, &ordering, records),
                    None => false,
                }
            }
        }
    }
}

impl std::str::FromStr for UnlockPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tiered" => Ok(UnlockPolicy::Tiered),
            "sequential" => Ok(UnlockPolicy::Sequential),
            other => Err(format!("unknown unlock policy: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stepwise_core::{Difficulty, Step, UserId};

    fn project(title: &str, difficulty: Difficulty, order: u32) -> Project {
        let mut p = Project::new(title, difficulty).with_step(Step::new("Only step"));
        p.order = order;
        p
    }

    fn done(project: &Project) -> ProgressRecord {
        let mut r = ProgressRecord::new(UserId::new("u"), project.id, Utc::now());
        r.completed = true;
        r
    }

    #[test]
    fn test_policies_disagree() {
        // flat order: beginner A, intermediate B, beginner C
        let a = project("A", Difficulty::Beginner, 0);
        let b = project("B", Difficulty::Intermediate, 1);
        let c = project("C", Difficulty::Beginner, 2);
        let catalog = vec![a.clone(), b.clone(), c.clone()];
        let records: HashMap<_, _> = [(a.id, done(&a))].into_iter().collect();

        assert!(UnlockPolicy::Sequential.is_unlocked(&b, &catalog, &records));
        assert!(!UnlockPolicy::Tiered.is_unlocked(&b, &catalog, &records));

        assert!(!UnlockPolicy::Sequential.is_unlocked(&c, &catalog, &records));
        assert!(UnlockPolicy::Tiered.is_unlocked(&c, &catalog, &records));
    }

    #[test]
    fn test_sequential_unknown_project_is_locked() {
        let a = project("A", Difficulty::Beginner, 0);
        let stray = project("Stray", Difficulty::Beginner, 0);
        assert!(!UnlockPolicy::Sequential.is_unlocked(&stray, &[a], &HashMap::new()));
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!(" Sequential ".parse::<UnlockPolicy>(), Ok(UnlockPolicy::Sequential));
        assert_eq!("tiered".parse::<UnlockPolicy>(), Ok(UnlockPolicy::Tiered));
        assert!("random".parse::<UnlockPolicy>().is_err());
        assert_eq!(UnlockPolicy::default(), UnlockPolicy::Tiered);
    }
}
