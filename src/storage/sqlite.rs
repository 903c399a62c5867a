//! SQLite storage implementation.
//!
//! This module provides the local cache for issuesync. Writes go through
//! [`SqliteStorage::mutate`], which wraps each logical operation in its own
//! IMMEDIATE transaction. A sync batch is a sequence of such operations, so
//! an interrupted sync leaves every row either fully old or fully new.

use crate::error::{Error, Result};
use crate::model::{Issue, NewProject, Project, ProjectUpdate};
use crate::storage::migrations::{migrate_schema, MigrationOutcome};
use crate::storage::schema::{apply_schema, is_legacy};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, Transaction};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Result of writing one issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// No row existed for the remote id.
    Inserted,
    /// A row existed and its sync hash differed.
    Updated,
    /// A row existed with the same sync hash; fields were still rewritten.
    Unchanged,
}

const PROJECT_COLUMNS: &str =
    "id, owner, repo, path, token, database_path, created_at, updated_at";

const ISSUE_COLUMNS: &str = "id, number, title, body, state, labels, assignees, \
     created_at, updated_at, closed_at, local_modified_at, sync_hash";

impl SqliteStorage {
    /// Open a store at the given path.
    ///
    /// Creates the file, parent directories and schema if missing. A legacy
    /// single-project store is opened as-is; call [`Self::migrate`] before
    /// writing issues to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a store with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5_000)))?;

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an existing store for reading.
    ///
    /// Neither the file nor any table is created and no schema statement
    /// runs, so this is safe without holding the writer lock. A legacy
    /// store opened this way has no registry; see [`Self::is_legacy`].
    ///
    /// # Errors
    ///
    /// Returns a database error if the file does not exist or cannot be opened.
    pub fn open_existing(path: &Path) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        conn.busy_timeout(Duration::from_millis(5_000))?;
        Ok(Self { conn })
    }

    /// Open an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// True when the store predates the project registry and needs
    /// [`Self::migrate`] before projects can be looked up.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog query fails.
    pub fn is_legacy(&self) -> Result<bool> {
        Ok(is_legacy(&self.conn)?)
    }

    /// Upgrade a single-project store; see [`migrate_schema`].
    ///
    /// # Errors
    ///
    /// Returns a database error if the migration fails (and was rolled back).
    pub fn migrate(&mut self, default_project: Option<&NewProject>) -> Result<MigrationOutcome> {
        migrate_schema(&mut self.conn, default_project)
    }

    /// Execute a write inside an IMMEDIATE transaction.
    ///
    /// Commits when the closure succeeds; rolls back when it fails.
    ///
    /// # Errors
    ///
    /// Returns the closure's error or a database error from begin/commit.
    pub fn mutate<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    // ======================
    // Project Operations
    // ======================

    /// Register a project.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateProject` if `(owner, repo)` is already registered
    /// (compared case-insensitively), or a database error.
    pub fn add_project(&mut self, project: &NewProject) -> Result<Project> {
        self.mutate(|tx| {
            if find_project(tx, &project.owner, &project.repo)?.is_some() {
                return Err(Error::DuplicateProject {
                    owner: project.owner.clone(),
                    repo: project.repo.clone(),
                });
            }
            insert_project(tx, project)
        })
    }

    /// Return the registered project, registering it first if absent.
    ///
    /// An existing row is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or insert fails.
    pub fn ensure_project(&mut self, project: &NewProject) -> Result<Project> {
        self.mutate(|tx| match find_project(tx, &project.owner, &project.repo)? {
            Some(existing) => Ok(existing),
            None => insert_project(tx, project),
        })
    }

    /// Get a project by `(owner, repo)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_project(&self, owner: &str, repo: &str) -> Result<Option<Project>> {
        find_project(&self.conn, owner, repo)
    }

    /// List all projects ordered by owner and repo.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY owner, repo"
        ))?;
        let projects = stmt
            .query_map([], map_project_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    /// Update a project's optional attributes.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` if the project doesn't exist, or a database error.
    pub fn update_project(
        &mut self,
        owner: &str,
        repo: &str,
        update: &ProjectUpdate,
    ) -> Result<Project> {
        self.mutate(|tx| {
            let now = chrono::Utc::now().timestamp_millis();
            let affected = tx.execute(
                "UPDATE projects SET
                   path = COALESCE(?1, path),
                   token = COALESCE(?2, token),
                   database_path = COALESCE(?3, database_path),
                   updated_at = ?4
                 WHERE owner = ?5 AND repo = ?6",
                rusqlite::params![
                    update.path,
                    update.token,
                    update.database_path,
                    now,
                    owner,
                    repo,
                ],
            )?;

            if affected == 0 {
                return Err(Error::ProjectNotFound(format!("{owner}/{repo}")));
            }

            find_project(tx, owner, repo)?
                .ok_or_else(|| Error::ProjectNotFound(format!("{owner}/{repo}")))
        })
    }

    /// Delete a project and, by cascade, its cached issues.
    ///
    /// Returns the number of issues that were removed with it.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` if the project doesn't exist, or a database error.
    pub fn delete_project(&mut self, owner: &str, repo: &str) -> Result<usize> {
        self.mutate(|tx| {
            let project = find_project(tx, owner, repo)?
                .ok_or_else(|| Error::ProjectNotFound(format!("{owner}/{repo}")))?;

            let issues: i64 = tx.query_row(
                "SELECT COUNT(*) FROM issues WHERE project_id = ?1",
                [project.id],
                |row| row.get(0),
            )?;
            tx.execute("DELETE FROM projects WHERE id = ?1", [project.id])?;

            Ok(usize::try_from(issues).unwrap_or(0))
        })
    }

    // ======================
    // Issue Operations
    // ======================

    /// Insert or overwrite an issue keyed by its remote id.
    ///
    /// Every mutable field is replaced with the incoming values; nothing is
    /// merged with what was stored before.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the row is left as it was.
    pub fn upsert_issue(&mut self, project_id: i64, issue: &Issue) -> Result<UpsertOutcome> {
        self.mutate(|tx| {
            let existing: Option<Option<String>> = tx
                .query_row(
                    "SELECT sync_hash FROM issues WHERE id = ?1",
                    [issue.id],
                    |row| row.get(0),
                )
                .optional()?;

            tx.execute(
                "INSERT INTO issues (id, project_id, number, title, body, state, labels, assignees,
                                     created_at, updated_at, closed_at, local_modified_at, sync_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                   project_id = excluded.project_id,
                   number = excluded.number,
                   title = excluded.title,
                   body = excluded.body,
                   state = excluded.state,
                   labels = excluded.labels,
                   assignees = excluded.assignees,
                   created_at = excluded.created_at,
                   updated_at = excluded.updated_at,
                   closed_at = excluded.closed_at,
                   local_modified_at = excluded.local_modified_at,
                   sync_hash = excluded.sync_hash",
                rusqlite::params![
                    issue.id,
                    project_id,
                    issue.number,
                    issue.title,
                    issue.body,
                    issue.state,
                    join_list(&issue.labels),
                    join_list(&issue.assignees),
                    format_timestamp(issue.created_at),
                    format_timestamp(issue.updated_at),
                    format_timestamp(issue.closed_at),
                    format_timestamp(issue.local_modified_at),
                    issue.sync_hash,
                ],
            )?;

            Ok(match existing {
                None => UpsertOutcome::Inserted,
                Some(stored) if stored.is_some() && stored == issue.sync_hash => {
                    UpsertOutcome::Unchanged
                }
                Some(_) => UpsertOutcome::Updated,
            })
        })
    }

    /// Get an issue by remote id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_issue(&self, id: i64) -> Result<Option<Issue>> {
        let issue = self
            .conn
            .query_row(
                &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1"),
                [id],
                map_issue_row,
            )
            .optional()?;
        Ok(issue)
    }

    /// List a project's issues ordered by display number.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_issues(&self, project_id: i64) -> Result<Vec<Issue>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ISSUE_COLUMNS} FROM issues WHERE project_id = ?1 ORDER BY number, id"
        ))?;
        let issues = stmt
            .query_map([project_id], map_issue_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(issues)
    }

    /// Count a project's cached issues.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_issues(&self, project_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM issues WHERE project_id = ?1",
            [project_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn find_project(conn: &Connection, owner: &str, repo: &str) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE owner = ?1 AND repo = ?2"),
            [owner, repo],
            map_project_row,
        )
        .optional()?;
    Ok(project)
}

fn insert_project(tx: &Transaction, project: &NewProject) -> Result<Project> {
    let now = chrono::Utc::now().timestamp_millis();
    tx.execute(
        "INSERT INTO projects (owner, repo, path, token, database_path, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        rusqlite::params![
            project.owner,
            project.repo,
            project.path,
            project.token,
            project.database_path,
            now,
        ],
    )?;

    Ok(Project {
        id: tx.last_insert_rowid(),
        owner: project.owner.clone(),
        repo: project.repo.clone(),
        path: project.path.clone(),
        token: project.token.clone(),
        database_path: project.database_path.clone(),
        created_at: now,
        updated_at: now,
    })
}

fn map_project_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        owner: row.get(1)?,
        repo: row.get(2)?,
        path: row.get(3)?,
        token: row.get(4)?,
        database_path: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn map_issue_row(row: &Row) -> rusqlite::Result<Issue> {
    let labels: Option<String> = row.get(5)?;
    let assignees: Option<String> = row.get(6)?;
    Ok(Issue {
        id: row.get(0)?,
        number: row.get(1)?,
        title: row.get(2)?,
        body: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        state: row.get(4)?,
        labels: split_list(labels.as_deref()),
        assignees: split_list(assignees.as_deref()),
        created_at: parse_timestamp(row.get(7)?),
        updated_at: parse_timestamp(row.get(8)?),
        closed_at: parse_timestamp(row.get(9)?),
        local_modified_at: parse_timestamp(row.get(10)?),
        sync_hash: row.get(11)?,
        ..Issue::default()
    })
}

/// Render a list as the stored comma-delimited text.
fn join_list(items: &[String]) -> String {
    items.join(",")
}

/// Split stored comma-delimited text, keeping order and dropping blanks.
fn split_list(text: Option<&str>) -> Vec<String> {
    text.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn format_timestamp(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn parse_timestamp(text: Option<String>) -> Option<DateTime<Utc>> {
    text.and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
        .map(|t| t.with_timezone(&Utc))
}
