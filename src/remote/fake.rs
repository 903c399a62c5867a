//! In-memory [`RemoteIssueSource`] for tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use super::{CreatedIssue, FetchOptions, NewIssue, RemoteIssue, RemoteIssueSource, RemoteLabel};
use crate::error::{Error, Result};

/// Scripted failure modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Auth,
    Transport,
}

impl Failure {
    fn to_error(self) -> Error {
        match self {
            Self::Auth => Error::Credential {
                message: "Bad credentials".into(),
                status: Some(401),
                remediation: "Refresh the token".into(),
            },
            Self::Transport => Error::RemoteAccess("connection refused".into()),
        }
    }
}

/// One recorded call: `(operation, "owner/repo", credential)`.
pub type Call = (&'static str, String, Option<String>);

#[derive(Debug, Default)]
pub struct FakeSource {
    issues: HashMap<String, Vec<RemoteIssue>>,
    fetch_failures: HashMap<String, Failure>,
    validate_failure: Option<Failure>,
    rejected_titles: Vec<String>,
    next_id: Cell<i64>,
    pub calls: RefCell<Vec<Call>>,
    pub created: RefCell<Vec<NewIssue>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(5000),
            ..Self::default()
        }
    }

    pub fn with_issues(mut self, key: &str, issues: Vec<RemoteIssue>) -> Self {
        self.issues.insert(key.to_string(), issues);
        self
    }

    pub fn failing_fetch(mut self, key: &str, failure: Failure) -> Self {
        self.fetch_failures.insert(key.to_string(), failure);
        self
    }

    pub fn failing_validate(mut self, failure: Failure) -> Self {
        self.validate_failure = Some(failure);
        self
    }

    pub fn rejecting(mut self, title: &str) -> Self {
        self.rejected_titles.push(title.to_string());
        self
    }

    pub fn calls_to(&self, operation: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|(op, _, _)| *op == operation)
            .count()
    }

    fn record(&self, operation: &'static str, owner: &str, repo: &str, credential: Option<&str>) {
        self.calls.borrow_mut().push((
            operation,
            format!("{owner}/{repo}"),
            credential.map(String::from),
        ));
    }
}

/// A well-formed remote issue.
pub fn remote_issue(id: i64, number: i64, title: &str) -> RemoteIssue {
    RemoteIssue {
        id,
        number,
        title: title.to_string(),
        body: Some(format!("Body of {title}")),
        state: "open".to_string(),
        labels: vec![
            RemoteLabel { name: "bug".into() },
            RemoteLabel { name: "p1".into() },
        ],
        created_at: Some("2024-03-01T09:00:00Z".to_string()),
        updated_at: Some("2024-03-02T09:00:00Z".to_string()),
        ..RemoteIssue::default()
    }
}

impl RemoteIssueSource for FakeSource {
    fn fetch_issues(
        &self,
        owner: &str,
        repo: &str,
        credential: Option<&str>,
        _options: &FetchOptions,
    ) -> Result<Vec<RemoteIssue>> {
        self.record("fetch", owner, repo, credential);
        let key = format!("{owner}/{repo}");
        if let Some(failure) = self.fetch_failures.get(&key) {
            return Err(failure.to_error());
        }
        Ok(self.issues.get(&key).cloned().unwrap_or_default())
    }

    fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        credential: Option<&str>,
        issue: &NewIssue,
    ) -> Result<CreatedIssue> {
        self.record("create", owner, repo, credential);
        if self.rejected_titles.contains(&issue.title) {
            return Err(Error::RemoteApi {
                status: 422,
                message: "Validation Failed".into(),
            });
        }
        self.created.borrow_mut().push(issue.clone());
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        Ok(CreatedIssue {
            id,
            number: id - 5000,
        })
    }

    fn validate_access(&self, owner: &str, repo: &str, credential: Option<&str>) -> Result<()> {
        self.record("validate", owner, repo, credential);
        match self.validate_failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}
