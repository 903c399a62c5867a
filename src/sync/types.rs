//! Report types returned by the sync engine.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::error::Error;
use crate::storage::UpsertOutcome;

/// One remote issue that could not be normalized or stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub id: i64,
    pub number: i64,
    pub title: String,
    pub message: String,
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} \"{}\": {}", self.number, self.title, self.message)
    }
}

/// Outcome of syncing one project whose listing was fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectSyncReport {
    /// `owner/repo`.
    pub project: String,
    pub store: PathBuf,
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub errors: Vec<ItemError>,
}

impl ProjectSyncReport {
    #[must_use]
    pub fn new(project: impl Into<String>, store: impl Into<PathBuf>) -> Self {
        Self {
            project: project.into(),
            store: store.into(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Issues written to the store in this run.
    #[must_use]
    pub fn stored(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

/// A project whose sync was aborted before any issue was processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectFailure {
    pub project: String,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ProjectFailure {
    /// Describe `error` for `project`, looking through the project annotation.
    #[must_use]
    pub fn from_error(project: impl Into<String>, error: &Error) -> Self {
        let inner = match error {
            Error::ProjectSync { source, .. } => source.as_ref(),
            other => other,
        };
        Self {
            project: project.into(),
            code: inner.error_code().as_str().to_string(),
            message: inner.to_string(),
            status: inner.status(),
        }
    }
}

/// Aggregate result of syncing several projects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub synced: Vec<ProjectSyncReport>,
    pub failed: Vec<ProjectFailure>,
}

impl SyncReport {
    #[must_use]
    pub fn total_stored(&self) -> usize {
        self.synced.iter().map(ProjectSyncReport::stored).sum()
    }

    #[must_use]
    pub fn total_item_errors(&self) -> usize {
        self.synced.iter().map(|r| r.errors.len()).sum()
    }
}
