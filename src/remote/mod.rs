//! Remote issue tracker boundary.
//!
//! The sync engine and bulk import only talk to the tracker through
//! [`RemoteIssueSource`]. [`GitHubClient`] is the production implementation;
//! tests substitute an in-memory fake.

mod github;

#[cfg(test)]
pub(crate) mod fake;

pub use github::{GitHubClient, DEFAULT_API_URL};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::Issue;

/// Fetch, create and access checks against a remote tracker.
///
/// `credential` is the bearer token resolved for the project, if any.
pub trait RemoteIssueSource {
    /// Fetch every issue of a repository, in tracker order.
    ///
    /// # Errors
    ///
    /// Returns `Credential`, `RemoteAccess` or `RemoteApi` when the listing
    /// cannot be retrieved.
    fn fetch_issues(
        &self,
        owner: &str,
        repo: &str,
        credential: Option<&str>,
        options: &FetchOptions,
    ) -> Result<Vec<RemoteIssue>>;

    /// Create one issue and echo back its assigned id and number.
    ///
    /// # Errors
    ///
    /// Returns `Credential`, `RemoteAccess` or `RemoteApi` when the tracker
    /// rejects the request.
    fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        credential: Option<&str>,
        issue: &NewIssue,
    ) -> Result<CreatedIssue>;

    /// Check that the credential can reach the repository.
    ///
    /// # Errors
    ///
    /// Returns `Credential` when the token is missing or refused.
    fn validate_access(&self, owner: &str, repo: &str, credential: Option<&str>) -> Result<()>;
}

/// Paging hints for [`RemoteIssueSource::fetch_issues`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Requested page size; the source may clamp it.
    pub batch_size: u32,
    pub include_closed: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
            include_closed: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLabel {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub login: String,
}

/// An issue as delivered by the tracker, before normalization.
///
/// Timestamps stay textual here so that a malformed value fails only the
/// one record that carries it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteIssue {
    pub id: i64,
    pub number: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub labels: Vec<RemoteLabel>,
    #[serde(default)]
    pub assignees: Vec<RemoteUser>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub closed_at: Option<String>,
    /// Present on pull requests, which share the issues listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

impl RemoteIssue {
    #[must_use]
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// Create-request payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewIssue {
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
}

impl From<&Issue> for NewIssue {
    fn from(issue: &Issue) -> Self {
        Self {
            title: issue.title.clone(),
            body: issue.body.clone(),
            labels: issue.labels.clone(),
            assignees: issue.assignees.clone(),
        }
    }
}

/// What the tracker assigned to a newly created issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    pub id: i64,
    pub number: i64,
}
