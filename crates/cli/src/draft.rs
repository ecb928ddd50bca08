//! Admin-authored project files.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use stepwise_core::{Difficulty, Project, ProjectId, Step};

/// Project definition as written by an admin.
///
/// `id` is omitted when creating and required when updating.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectDraft {
    #[serde(default)]
    pub id: Option<ProjectId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub order: u32,
}

impl ProjectDraft {
    /// Read a draft from a JSON file.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid project file {}", path.display()))
    }

    /// Build the project record; timestamps are set by the service.
    pub fn into_project(self) -> Project {
        let mut project = Project::new(self.title, self.difficulty);
        if let Some(id) = self.id {
            project.id = id;
        }
        project.description = self.description;
        project.tags = self.tags;
        project.steps = self.steps;
        project.points = self.points;
        project.order = self.order;
        project
    }
}
