//! GitHub REST implementation of [`RemoteIssueSource`].

use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{CreatedIssue, FetchOptions, NewIssue, RemoteIssue, RemoteIssueSource};
use crate::error::{Error, Result};

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub caps `per_page` at 100.
const MAX_PAGE_SIZE: u32 = 100;

const MAX_ATTEMPTS: u32 = 3;

const TOKEN_REMEDIATION: &str =
    "Set GITHUB_TOKEN, pass --token, or add `token:` to the configuration. \
     The token needs the `repo` scope for private repositories.";

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

/// Blocking GitHub client with per-call timeouts and bounded retries.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    base_url: String,
    client: Client,
    retry_wait: Duration,
}

impl GitHubClient {
    /// Client for the public API.
    ///
    /// # Errors
    ///
    /// Returns `RemoteAccess` if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_API_URL)
    }

    /// Client for a GitHub Enterprise or test endpoint.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank URL, or `RemoteAccess` if the
    /// HTTP client cannot be built.
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let normalized = base_url.trim();
        if normalized.is_empty() {
            return Err(Error::InvalidArgument("API URL is required".to_string()));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("isync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::RemoteAccess(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: normalized.trim_end_matches('/').to_string(),
            client,
            retry_wait: Duration::from_secs(1),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn repo_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{owner}/{repo}", self.base_url)
    }

    fn authorized(builder: RequestBuilder, credential: Option<&str>) -> RequestBuilder {
        let builder = builder
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match credential {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request, retrying 429s and connect/timeout failures with
    /// exponential backoff when `retry` is set.
    fn send(&self, build: impl Fn() -> RequestBuilder, retry: bool) -> Result<Response> {
        let mut wait = self.retry_wait;
        let attempts = if retry { MAX_ATTEMPTS } else { 1 };

        for attempt in 1..=attempts {
            match build().send() {
                Ok(r) => {
                    if r.status() == StatusCode::TOO_MANY_REQUESTS && attempt < attempts {
                        warn!(attempt, "Rate limited, backing off");
                        thread::sleep(wait);
                        wait *= 2;
                        continue;
                    }
                    return map_status(r);
                }
                Err(e) => {
                    if (e.is_timeout() || e.is_connect()) && attempt < attempts {
                        warn!(attempt, error = %e, "Transport failure, retrying");
                        thread::sleep(wait);
                        wait *= 2;
                        continue;
                    }
                    return Err(Error::RemoteAccess(e.to_string()));
                }
            }
        }

        Err(Error::RemoteAccess("retry loop exhausted".to_string()))
    }
}

impl RemoteIssueSource for GitHubClient {
    fn fetch_issues(
        &self,
        owner: &str,
        repo: &str,
        credential: Option<&str>,
        options: &FetchOptions,
    ) -> Result<Vec<RemoteIssue>> {
        let url = format!("{}/issues", self.repo_url(owner, repo));
        let per_page = page_size(options.batch_size);
        let state = if options.include_closed { "all" } else { "open" };

        let mut issues = Vec::new();
        let mut page: u32 = 1;
        loop {
            debug!(owner, repo, page, per_page, "Fetching issue page");
            let response = self.send(
                || {
                    Self::authorized(self.client.get(&url), credential).query(&[
                        ("state", state.to_string()),
                        ("per_page", per_page.to_string()),
                        ("page", page.to_string()),
                    ])
                },
                true,
            )?;

            let batch: Vec<RemoteIssue> = response
                .json()
                .map_err(|e| Error::RemoteAccess(format!("Invalid issue listing: {e}")))?;
            let received = batch.len();
            issues.extend(batch.into_iter().filter(|i| !i.is_pull_request()));

            if received < per_page as usize {
                break;
            }
            page += 1;
        }

        debug!(owner, repo, count = issues.len(), "Fetched issues");
        Ok(issues)
    }

    fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        credential: Option<&str>,
        issue: &NewIssue,
    ) -> Result<CreatedIssue> {
        let token = require_credential(credential)?;
        let url = format!("{}/issues", self.repo_url(owner, repo));

        // Creation is not idempotent, so only the initial attempt is sent.
        let response = self.send(
            || Self::authorized(self.client.post(&url), Some(token)).json(issue),
            false,
        )?;

        response
            .json()
            .map_err(|e| Error::RemoteAccess(format!("Invalid create response: {e}")))
    }

    fn validate_access(&self, owner: &str, repo: &str, credential: Option<&str>) -> Result<()> {
        let token = require_credential(credential)?;
        let url = self.repo_url(owner, repo);
        self.send(|| Self::authorized(self.client.get(&url), Some(token)), true)
            .map(|_| ())
    }
}

fn require_credential(credential: Option<&str>) -> Result<&str> {
    credential
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| Error::Credential {
            message: "no token configured".to_string(),
            status: None,
            remediation: TOKEN_REMEDIATION.to_string(),
        })
}

fn page_size(batch_size: u32) -> u32 {
    batch_size.clamp(1, MAX_PAGE_SIZE)
}

fn map_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let rate_limited = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");
    let message = response
        .json::<ApiMessage>()
        .map(|m| m.message)
        .unwrap_or_default();

    Err(status_error(status, rate_limited, message))
}

fn status_error(status: StatusCode, rate_limited: bool, message: String) -> Error {
    let message = if message.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    } else {
        message
    };

    match status {
        StatusCode::UNAUTHORIZED => Error::Credential {
            message,
            status: Some(status.as_u16()),
            remediation: TOKEN_REMEDIATION.to_string(),
        },
        StatusCode::FORBIDDEN if !rate_limited => Error::Credential {
            message,
            status: Some(status.as_u16()),
            remediation: TOKEN_REMEDIATION.to_string(),
        },
        s => Error::RemoteApi {
            status: s.as_u16(),
            message,
        },
    }
}
