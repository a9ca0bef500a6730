use super::ProjectId;
use serde::{Deserialize, Serialize};

/// A monitored software project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub repository: String,
    pub description: Option<String>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub repository: String,
    pub description: Option<String>,
}

/// Partial project update. `description: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub repository: Option<String>,
    pub description: Option<Option<String>>,
}

impl ProjectPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.repository.is_none() && self.description.is_none()
    }

    pub fn apply_to(&self, project: &mut Project) {
        if let Some(name) = &self.name {
            project.name.clone_from(name);
        }
        if let Some(repository) = &self.repository {
            project.repository.clone_from(repository);
        }
        if let Some(description) = &self.description {
            project.description.clone_from(description);
        }
    }
}
