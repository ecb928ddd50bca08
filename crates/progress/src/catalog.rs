//! Project catalog: search, ordering and dashboard figures.

use serde::{Deserialize, Serialize};
use stepwise_core::{Difficulty, Project, ProjectId, ProgressRecord};

/// Sort order for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Flat-list position, then title
    #[default]
    Position,
    /// Title, case-insensitive
    Title,
    /// Easiest first, then position
    Difficulty,
    /// Highest reward first
    Points,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "position" => Ok(SortOrder::Position),
            "title" => Ok(SortOrder::Title),
            "difficulty" => Ok(SortOrder::Difficulty),
            "points" => Ok(SortOrder::Points),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Catalog search parameters.
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    /// Case-insensitive substring of title, description or a tag
    pub text: Option<String>,
    /// Only this tier
    pub difficulty: Option<Difficulty>,
    /// Only projects carrying this tag
    pub tag: Option<String>,
    /// Result order
    pub sort: SortOrder,
}

impl CatalogQuery {
    fn matches(&self, project: &Project) -> bool {
        if let Some(difficulty) = self.difficulty {
            if project.difficulty != difficulty {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            let tag = tag.trim().to_lowercase();
            if !project.tags.iter().any(|t| t.to_lowercase() == tag) {
                return false;
            }
        }
        match self.text.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(text) => {
                let needle = text.to_lowercase();
                project.title.to_lowercase().contains(&needle)
                    || project.description.to_lowercase().contains(&needle)
                    || project.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            }
        }
    }
}

/// Filter and sort `projects`.
pub fn search<'a>(projects: &'a [Project], query: &CatalogQuery) -> Vec<&'a Project> {
    let mut found: Vec<&Project> = projects.iter().filter(|p| query.matches(p)).collect();
    match query.sort {
        SortOrder::Position => found.sort_by(|a, b| position_key(a).cmp(&position_key(b))),
        SortOrder::Title => found.sort_by_key(|p| p.title.to_lowercase()),
        SortOrder::Difficulty => {
            found.sort_by(|a, b| (a.difficulty, position_key(a)).cmp(&(b.difficulty, position_key(b))))
        }
        SortOrder::Points => found.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.title.cmp(&b.title))),
    }
    found
}

fn position_key(project: &Project) -> (u32, &str) {
    (project.order, project.title.as_str())
}

/// Fixed ordering of the flat project list.
pub fn flat_ordering(projects: &[Project]) -> Vec<ProjectId> {
    let mut sorted: Vec<&Project> = projects.iter().collect();
    sorted.sort_by(|a, b| position_key(a).cmp(&position_key(b)));
    sorted.into_iter().map(|p| p.id).collect()
}

/// Dashboard figures for one learner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// Projects with a record
    pub started: usize,
    /// Projects completed
    pub completed: usize,
    /// Started but not completed
    pub in_progress: usize,
    /// Mean progress over started projects, rounded
    pub average_percent: u8,
    /// Completed steps across all projects
    pub completed_steps: usize,
}

/// Summarize a learner's records.
pub fn dashboard_stats(records: &[ProgressRecord]) -> DashboardStats {
    let started = records.len();
    if started == 0 {
        return DashboardStats::default();
    }
    let completed = records.iter().filter(|r| r.completed).count();
    let percent_sum: usize = records.iter().map(|r| usize::from(r.progress_percent)).sum();

    DashboardStats {
        started,
        completed,
        in_progress: started - completed,
        average_percent: ((percent_sum * 2 + started) / (started * 2)) as u8,
        completed_steps: records.iter().map(ProgressRecord::completed_count).sum(),
    }
}
