//! Content validation for admin-authored projects.

use std::sync::OnceLock;

use regex::Regex;
use crate::project::Project;

/// Reasons a project definition is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Title is blank
    #[error("project title must not be empty")]
    EmptyTitle,

    /// No steps at all
    #[error("project must have at least one step")]
    NoSteps,

    /// A step has a blank title
    #[error("step {0} has an empty title")]
    UntitledStep(usize),

    /// A tag contains characters outside the allowed set
    #[error("invalid tag: {0:?}")]
    InvalidTag(String),
}

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9+#.\-]*$").expect("static tag pattern"))
}

/// Lowercase and trim a free-form tag.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

impl Project {
    /// Check the project is publishable.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if self.steps.is_empty() {
            return Err(ValidationError::NoSteps);
        }
        if let Some(index) = self.steps.iter().position(|s| s.title.trim().is_empty()) {
            return Err(ValidationError::UntitledStep(index));
        }
        for tag in &self.tags {
            if !tag_pattern().is_match(&normalize_tag(tag)) {
                return Err(ValidationError::InvalidTag(tag.clone()));
            }
        }
        Ok(())
    }

    /// Normalize tags in place (trim + lowercase, duplicates collapse).
    pub fn normalize_tags(&mut self) {
        self.tags = self.tags.iter().map(|t| normalize_tag(t)).collect();
    }
}
