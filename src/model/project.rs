//! Project model for issuesync.
//!
//! A project is one `(owner, repo)` pair on the remote tracker. Every cached
//! issue belongs to exactly one project; deleting a project cascades to its
//! issues.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A registered project row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Store-assigned identifier referenced by `issues.project_id`
    pub id: i64,

    /// Repository owner (user or organisation)
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// Local checkout path, if known
    pub path: Option<String>,

    /// Credential override for this project
    #[serde(skip_serializing)]
    pub token: Option<String>,

    /// Store-location override for this project
    pub database_path: Option<String>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Project {
    /// The `owner/repo` display key.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Fields for registering a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProject {
    pub owner: String,
    pub repo: String,
    pub path: Option<String>,
    pub token: Option<String>,
    pub database_path: Option<String>,
}

impl NewProject {
    /// Create a registration with only the identity set.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            ..Self::default()
        }
    }
}

/// Partial update for a project; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectUpdate {
    pub path: Option<String>,
    pub token: Option<String>,
    pub database_path: Option<String>,
}

impl ProjectUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.token.is_none() && self.database_path.is_none()
    }
}

/// Split an `owner/repo` argument into its parts.
///
/// # Errors
///
/// Returns `InvalidArgument` unless the input has exactly one `/` with
/// non-blank text on both sides.
pub fn parse_project_key(input: &str) -> Result<(String, String)> {
    let mut parts = input.trim().split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.trim().is_empty() && !repo.trim().is_empty() => {
            Ok((owner.trim().to_string(), repo.trim().to_string()))
        }
        _ => Err(Error::InvalidArgument(format!(
            "expected a project as owner/repo, got '{input}'"
        ))),
    }
}
