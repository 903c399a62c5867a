//! Fetch, normalize and upsert remote issues per project.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{info, warn};

use super::hash::sync_hash;
use super::types::{ItemError, ProjectFailure, ProjectSyncReport, SyncReport};
use crate::config::{Config, ProjectConfig};
use crate::error::{Error, Result};
use crate::model::{parse_project_key, Issue, NewProject, STATE_OPEN};
use crate::remote::{FetchOptions, RemoteIssue, RemoteIssueSource};
use crate::storage::{open_for_write, SqliteStorage};

/// Drives syncs for the projects of one resolved [`Config`].
pub struct SyncEngine<'a> {
    config: &'a Config,
    source: &'a dyn RemoteIssueSource,
}

impl<'a> SyncEngine<'a> {
    pub fn new(config: &'a Config, source: &'a dyn RemoteIssueSource) -> Self {
        Self { config, source }
    }

    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            batch_size: self.config.global.batch_size,
            include_closed: self.config.global.include_closed,
        }
    }

    /// Sync one project into an open, already migrated store.
    ///
    /// The project row is registered if missing. Each issue is upserted in
    /// its own transaction; an issue that fails to normalize or store is
    /// recorded in the report and the rest of the listing is still applied.
    ///
    /// # Errors
    ///
    /// A fetch failure aborts the project and is returned as `ProjectSync`
    /// carrying the project key. Registering the project row can fail with
    /// a database error.
    pub fn sync_project(
        &self,
        storage: &mut SqliteStorage,
        project: &ProjectConfig,
    ) -> Result<ProjectSyncReport> {
        let key = project.key();
        let registered = storage.ensure_project(&NewProject::from(project))?;
        let credential = self.config.effective_token(project);

        let remote = self
            .source
            .fetch_issues(&project.owner, &project.repo, credential, &self.fetch_options())
            .map_err(|e| Error::ProjectSync {
                project: key.clone(),
                source: Box::new(e),
            })?;

        let mut report = ProjectSyncReport::new(&key, self.config.store_path(project));
        for item in remote.iter().filter(|i| !i.is_pull_request()) {
            report.fetched += 1;
            let stored = normalize(item).and_then(|mut issue| {
                issue.sync_hash = Some(sync_hash(&issue)?);
                storage.upsert_issue(registered.id, &issue)
            });

            match stored {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    warn!(project = %key, id = item.id, number = item.number, error = %e, "Skipping issue");
                    report.errors.push(ItemError {
                        id: item.id,
                        number: item.number,
                        title: item.title.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            project = %key,
            fetched = report.fetched,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            errors = report.errors.len(),
            "Project synced"
        );
        Ok(report)
    }

    /// Sync every configured project, or only the one named by `filter`
    /// (`owner/repo`).
    ///
    /// Projects are grouped by effective store. Each store is locked,
    /// opened and migrated once; a failure there fails only the projects
    /// that share it. A project whose fetch fails is listed in
    /// [`SyncReport::failed`] and the remaining projects are still synced.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a malformed filter and
    /// `ProjectNotFound` when the filter matches no configured project.
    pub fn sync_all(&self, filter: Option<&str>) -> Result<SyncReport> {
        let targets = self.targets(filter)?;
        let mut report = SyncReport::default();

        for (store, projects) in group_by_store(self.config, &targets) {
            let default_project = self
                .config
                .projects
                .iter()
                .find(|p| self.config.store_path(p) == store)
                .map(NewProject::from);

            let (_lock, mut storage) = match open_for_write(&store, default_project.as_ref()) {
                Ok(opened) => opened,
                Err(e) => {
                    warn!(store = %store.display(), error = %e, "Cannot open store");
                    report
                        .failed
                        .extend(projects.iter().map(|p| ProjectFailure::from_error(p.key(), &e)));
                    continue;
                }
            };

            for project in projects {
                match self.sync_project(&mut storage, project) {
                    Ok(synced) => report.synced.push(synced),
                    Err(e) => {
                        warn!(project = %project.key(), error = %e, "Project sync failed");
                        report.failed.push(ProjectFailure::from_error(project.key(), &e));
                    }
                }
            }
        }

        Ok(report)
    }

    fn targets(&self, filter: Option<&str>) -> Result<Vec<&'a ProjectConfig>> {
        let Some(filter) = filter else {
            return Ok(self.config.projects.iter().collect());
        };

        let (owner, repo) = parse_project_key(filter)?;
        self.config
            .find_project(&owner, &repo)
            .map(|p| vec![p])
            .ok_or_else(|| Error::ProjectNotFound(filter.to_string()))
    }
}

/// Projects sharing a store, in configuration order.
fn group_by_store<'p>(
    config: &Config,
    projects: &[&'p ProjectConfig],
) -> Vec<(PathBuf, Vec<&'p ProjectConfig>)> {
    let mut groups: Vec<(PathBuf, Vec<&ProjectConfig>)> = Vec::new();
    for &project in projects {
        let store = config.store_path(project);
        match groups.iter_mut().find(|(path, _)| *path == store) {
            Some((_, members)) => members.push(project),
            None => groups.push((store, vec![project])),
        }
    }
    groups
}

/// Convert a tracker record into the local issue shape.
///
/// Labels and assignees are flattened to names in source order. A blank
/// state becomes `open`. Remote data is authoritative, so
/// `local_modified_at` is cleared.
///
/// # Errors
///
/// Returns `InvalidArgument` for a blank title or an unparseable timestamp.
pub fn normalize(remote: &RemoteIssue) -> Result<Issue> {
    let title = remote.title.trim();
    if title.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "issue {} has an empty title",
            remote.id
        )));
    }

    let state = remote.state.trim().to_ascii_lowercase();

    Ok(Issue {
        id: remote.id,
        number: remote.number,
        title: title.to_string(),
        body: remote.body.clone().unwrap_or_default(),
        state: if state.is_empty() {
            STATE_OPEN.to_string()
        } else {
            state
        },
        labels: remote.labels.iter().map(|l| l.name.clone()).collect(),
        assignees: remote.assignees.iter().map(|a| a.login.clone()).collect(),
        created_at: remote_timestamp("created_at", remote.created_at.as_deref())?,
        updated_at: remote_timestamp("updated_at", remote.updated_at.as_deref())?,
        closed_at: remote_timestamp("closed_at", remote.closed_at.as_deref())?,
        local_modified_at: None,
        sync_hash: None,
        ..Issue::default()
    })
}

fn remote_timestamp(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| Error::InvalidArgument(format!("invalid {field} '{text}': {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::{remote_issue, Failure, FakeSource};
    use crate::remote::{RemoteLabel, RemoteUser};
    use crate::storage::schema::LEGACY_SCHEMA_SQL;
    use std::path::Path;
    use tempfile::TempDir;

    fn config(root: &Path, projects: &[(&str, &str)]) -> Config {
        let mut config = Config::new(root);
        config.global.token = Some("global-token".into());
        for (owner, repo) in projects {
            config.projects.push(ProjectConfig::new(*owner, *repo));
        }
        config
    }

    #[test]
    fn test_normalize_flattens_and_defaults() {
        let mut remote = remote_issue(1, 1, "  Crash  ");
        remote.state = String::new();
        remote.labels.push(RemoteLabel { name: "bug".into() });
        remote.assignees = vec![
            RemoteUser { login: "bob".into() },
            RemoteUser { login: "alice".into() },
        ];

        let issue = normalize(&remote).unwrap();
        assert_eq!(issue.title, "Crash");
        assert_eq!(issue.state, "open");
        assert_eq!(issue.labels, vec!["bug", "p1", "bug"]);
        assert_eq!(issue.assignees, vec!["bob", "alice"]);
        assert!(issue.created_at.is_some());
        assert!(issue.closed_at.is_none());
    }

    #[test]
    fn test_normalize_rejects_bad_records() {
        let mut remote = remote_issue(1, 1, "Dates");
        remote.updated_at = Some("yesterday".into());
        let err = normalize(&remote).unwrap_err();
        assert!(err.to_string().contains("updated_at"));

        assert!(normalize(&remote_issue(2, 2, "   ")).is_err());
    }

    #[test]
    fn test_sync_project_upserts_and_reports() {
        let config = config(Path::new("/work"), &[("acme", "widgets")]);
        let mut pr = remote_issue(3, 3, "A pull request");
        pr.pull_request = Some(serde_json::json!({}));
        let mut broken = remote_issue(4, 4, "Broken");
        broken.created_at = Some("not a date".into());
        let source = FakeSource::new().with_issues(
            "acme/widgets",
            vec![remote_issue(1, 1, "One"), remote_issue(2, 2, "Two"), pr, broken],
        );

        let engine = SyncEngine::new(&config, &source);
        let mut storage = SqliteStorage::open_memory().unwrap();
        let report = engine
            .sync_project(&mut storage, &config.projects[0])
            .unwrap();

        assert_eq!(report.fetched, 3);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].title, "Broken");

        let stored = storage.get_issue(1).unwrap().unwrap();
        assert_eq!(stored.labels, vec!["bug", "p1"]);
        assert!(stored.sync_hash.is_some());
        assert!(storage.get_issue(3).unwrap().is_none());

        let calls = source.calls.borrow();
        assert_eq!(calls[0].2.as_deref(), Some("global-token"));
    }

    #[test]
    fn test_resync_overwrites_and_counts() {
        let config = config(Path::new("/work"), &[("acme", "widgets")]);
        let mut storage = SqliteStorage::open_memory().unwrap();

        let first = FakeSource::new().with_issues("acme/widgets", vec![remote_issue(1, 1, "Old")]);
        SyncEngine::new(&config, &first)
            .sync_project(&mut storage, &config.projects[0])
            .unwrap();

        let mut renamed = remote_issue(1, 1, "New");
        renamed.state = "closed".into();
        let second = FakeSource::new()
            .with_issues("acme/widgets", vec![renamed, remote_issue(2, 2, "Two")]);
        let report = SyncEngine::new(&config, &second)
            .sync_project(&mut storage, &config.projects[0])
            .unwrap();
        assert_eq!((report.inserted, report.updated), (1, 1));

        let report = SyncEngine::new(&config, &second)
            .sync_project(&mut storage, &config.projects[0])
            .unwrap();
        assert_eq!(report.unchanged, 2);

        let project = storage.get_project("acme", "widgets").unwrap().unwrap();
        assert_eq!(storage.count_issues(project.id).unwrap(), 2);
        let stored = storage.get_issue(1).unwrap().unwrap();
        assert_eq!(stored.title, "New");
        assert_eq!(stored.state, "closed");
    }

    #[test]
    fn test_project_token_overrides_global() {
        let mut config = config(Path::new("/work"), &[("acme", "widgets")]);
        config.projects[0].token = Some("project-token".into());
        let source = FakeSource::new();
        let mut storage = SqliteStorage::open_memory().unwrap();

        SyncEngine::new(&config, &source)
            .sync_project(&mut storage, &config.projects[0])
            .unwrap();
        assert_eq!(source.calls.borrow()[0].2.as_deref(), Some("project-token"));
    }

    #[test]
    fn test_fetch_failure_is_annotated() {
        let config = config(Path::new("/work"), &[("acme", "widgets")]);
        let source = FakeSource::new().failing_fetch("acme/widgets", Failure::Transport);
        let mut storage = SqliteStorage::open_memory().unwrap();

        let err = SyncEngine::new(&config, &source)
            .sync_project(&mut storage, &config.projects[0])
            .unwrap_err();
        assert!(matches!(err, Error::ProjectSync { ref project, .. } if project == "acme/widgets"));
    }

    #[test]
    fn test_sync_all_isolates_project_failures() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), &[("acme", "private"), ("acme", "widgets")]);
        let source = FakeSource::new()
            .failing_fetch("acme/private", Failure::Auth)
            .with_issues("acme/widgets", vec![remote_issue(1, 1, "One"), remote_issue(2, 2, "Two")]);

        let report = SyncEngine::new(&config, &source).sync_all(None).unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].project, "acme/private");
        assert_eq!(report.failed[0].code, "CREDENTIAL_ERROR");
        assert_eq!(report.failed[0].status, Some(401));
        assert_eq!(report.synced.len(), 1);
        assert_eq!(report.synced[0].inserted, 2);

        let storage = SqliteStorage::open(&config.default_store_path()).unwrap();
        assert_eq!(storage.list_projects().unwrap().len(), 2);
        assert!(storage.get_issue(2).unwrap().is_some());
    }

    #[test]
    fn test_sync_all_processes_long_listings() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path(), &[("acme", "widgets")]);
        config.global.batch_size = 10;
        let listing = (1..=1_050).map(|n| remote_issue(n, n, &format!("Issue {n}"))).collect();
        let source = FakeSource::new().with_issues("acme/widgets", listing);

        let report = SyncEngine::new(&config, &source).sync_all(None).unwrap();
        assert_eq!(report.total_stored(), 1_050);
        assert!(report.failed.is_empty());
        assert_eq!(report.total_item_errors(), 0);
    }

    #[test]
    fn test_sync_all_filter() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), &[("acme", "widgets"), ("acme", "gadgets")]);
        let source = FakeSource::new();

        let report = SyncEngine::new(&config, &source)
            .sync_all(Some("ACME/gadgets"))
            .unwrap();
        assert_eq!(report.synced.len(), 1);
        assert_eq!(source.calls_to("fetch"), 1);

        let err = SyncEngine::new(&config, &source)
            .sync_all(Some("acme/missing"))
            .unwrap_err();
        assert!(matches!(err, Error::ProjectNotFound(_)));
    }

    #[test]
    fn test_sync_all_groups_by_store() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path(), &[("acme", "widgets"), ("acme", "gadgets")]);
        config.projects[1].database_path = Some(PathBuf::from("gadgets.db"));
        let source = FakeSource::new()
            .with_issues("acme/widgets", vec![remote_issue(1, 1, "W")])
            .with_issues("acme/gadgets", vec![remote_issue(2, 1, "G")]);

        let report = SyncEngine::new(&config, &source).sync_all(None).unwrap();
        assert_eq!(report.synced.len(), 2);
        assert_eq!(report.synced[1].store, dir.path().join("gadgets.db"));

        let gadgets = SqliteStorage::open(&dir.path().join("gadgets.db")).unwrap();
        assert!(gadgets.get_issue(2).unwrap().is_some());
        assert!(gadgets.get_issue(1).unwrap().is_none());
    }

    #[test]
    fn test_sync_all_migrates_legacy_store() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), &[("acme", "widgets")]);
        {
            let conn = rusqlite::Connection::open(config.default_store_path()).unwrap();
            conn.execute_batch(LEGACY_SCHEMA_SQL).unwrap();
            conn.execute(
                "INSERT INTO issues (id, number, title, state) VALUES (77, 7, 'Cached', 'open')",
                [],
            )
            .unwrap();
        }
        let source = FakeSource::new().with_issues("acme/widgets", vec![remote_issue(1, 1, "New")]);

        let report = SyncEngine::new(&config, &source).sync_all(None).unwrap();
        assert!(report.failed.is_empty());

        let storage = SqliteStorage::open(&config.default_store_path()).unwrap();
        let project = storage.get_project("acme", "widgets").unwrap().unwrap();
        assert_eq!(storage.count_issues(project.id).unwrap(), 2);
        assert_eq!(storage.get_issue(77).unwrap().unwrap().title, "Cached");
    }
}
