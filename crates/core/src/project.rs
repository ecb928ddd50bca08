//! Project model - a guided tutorial made of ordered steps.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use crate::id::ProjectId;
use crate::Time;

/// Difficulty tier of a project.
///
/// Variant order is significant: `Beginner < Intermediate < Advanced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    /// Entry tier, always open
    Beginner,
    /// Opens after the Beginner tier
    Intermediate,
    /// Opens after the Intermediate tier
    Advanced,
}

impl Difficulty {
    /// The tier that must be finished before this one opens.
    pub fn preceding(self) -> Option<Difficulty> {
        match self {
            Difficulty::Beginner => None,
            Difficulty::Intermediate => Some(Difficulty::Beginner),
            Difficulty::Advanced => Some(Difficulty::Intermediate),
        }
    }

    /// Display label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// A project is a unit of learning content made of tutorial steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier
    pub id: ProjectId,

    /// Project title
    pub title: String,

    /// Description
    pub description: String,

    /// Difficulty tier
    pub difficulty: Difficulty,

    /// Free-form tags for search
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Tutorial steps; a step is identified by its index
    pub steps: Vec<Step>,

    /// Points granted on first full completion
    pub points: u32,

    /// Position in the flat project list
    #[serde(default)]
    pub order: u32,

    /// When created
    pub created_at: Time,

    /// Last edited
    pub updated_at: Time,
}

impl Project {
    /// Create an empty project.
    pub fn new(title: impl Into<String>, difficulty: Difficulty) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: ProjectId::new(),
            title: title.into(),
            description: String::new(),
            difficulty,
            tags: BTreeSet::new(),
            steps: Vec::new(),
            points: 0,
            order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style step append.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Number of steps.
    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    /// Step at `index`, if any.
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }
}

/// One page of a project's tutorial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step title
    pub title: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// Long-form explanation
    #[serde(default)]
    pub explanation: String,

    /// Read-only code sample
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Single hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    /// Ordered tips
    #[serde(default)]
    pub tips: Vec<String>,
}

impl Step {
    /// Create a step with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            explanation: String::new(),
            code: None,
            hint: None,
            tips: Vec::new(),
        }
    }
}
