//! Bulk import and export through the exchange format.
//!
//! Files are parsed strictly up front, so a malformed file has no effect.
//! After that, rows are independent: a rejected row is recorded in the
//! summary and the remaining rows are still applied.

use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::ProjectConfig;
use crate::csv;
use crate::error::Result;
use crate::model::Project;
use crate::remote::{NewIssue, RemoteIssueSource};
use crate::storage::{SqliteStorage, UpsertOutcome};
use crate::sync::sync_hash;

/// Outcome of a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Data rows in the file.
    pub total: usize,
    /// Rows that became new issues.
    pub created: usize,
    /// Rows that overwrote an existing issue (store imports only).
    pub updated: usize,
    /// Rows deliberately not applied.
    pub skipped: usize,
    /// One message per failed row, naming its title.
    pub errors: Vec<String>,
}

impl ImportSummary {
    fn with_total(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }
}

/// Create every row of `path` as an issue on the remote tracker.
///
/// With `dry_run`, nothing is sent and every row is reported as skipped.
/// Otherwise the credential is checked once before the first create.
///
/// # Errors
///
/// Returns the parse error if the file is malformed, or the access error
/// if the credential check fails. Per-row create failures are not errors;
/// they are listed in [`ImportSummary::errors`].
pub fn import_to_remote(
    path: &Path,
    project: &ProjectConfig,
    credential: Option<&str>,
    source: &dyn RemoteIssueSource,
    dry_run: bool,
) -> Result<ImportSummary> {
    let issues = csv::parse(path)?;
    let mut summary = ImportSummary::with_total(issues.len());

    if dry_run {
        summary.skipped = issues.len();
        info!(project = %project.key(), rows = issues.len(), "Dry run, no issues created");
        return Ok(summary);
    }

    source.validate_access(&project.owner, &project.repo, credential)?;

    for issue in &issues {
        match source.create_issue(&project.owner, &project.repo, credential, &NewIssue::from(issue)) {
            Ok(created) => {
                debug!(number = created.number, title = %issue.title, "Created issue");
                summary.created += 1;
            }
            Err(e) => {
                warn!(title = %issue.title, error = %e, "Create rejected");
                summary.errors.push(format!("\"{}\": {e}", issue.title));
            }
        }
    }

    info!(
        project = %project.key(),
        created = summary.created,
        errors = summary.errors.len(),
        "Remote import finished"
    );
    Ok(summary)
}

/// Upsert every row of `path` into the local store under `project`.
///
/// Rows without a remote id cannot be keyed and are skipped. Imported rows
/// are stamped with `local_modified_at`.
///
/// # Errors
///
/// Returns the parse error if the file is malformed. Per-row store failures
/// are listed in [`ImportSummary::errors`].
pub fn import_to_store(
    path: &Path,
    storage: &mut SqliteStorage,
    project: &Project,
) -> Result<ImportSummary> {
    let issues = csv::parse(path)?;
    let mut summary = ImportSummary::with_total(issues.len());
    let now = Utc::now();

    for mut issue in issues {
        if issue.id == 0 {
            debug!(title = %issue.title, "Row has no id, skipping");
            summary.skipped += 1;
            continue;
        }

        issue.local_modified_at = Some(now);
        let stored = sync_hash(&issue).and_then(|hash| {
            issue.sync_hash = Some(hash);
            storage.upsert_issue(project.id, &issue)
        });

        match stored {
            Ok(UpsertOutcome::Inserted) => summary.created += 1,
            Ok(UpsertOutcome::Updated | UpsertOutcome::Unchanged) => summary.updated += 1,
            Err(e) => {
                warn!(title = %issue.title, error = %e, "Row not stored");
                summary.errors.push(format!("\"{}\": {e}", issue.title));
            }
        }
    }

    info!(
        project = %project.key(),
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped,
        "Store import finished"
    );
    Ok(summary)
}

/// Write a project's cached issues to `path`, ordered by number.
///
/// Returns the number of issues written.
///
/// # Errors
///
/// Returns a database error, `InvalidArgument` for an unknown column, or
/// an I/O error.
pub fn export_from_store(
    storage: &SqliteStorage,
    project: &Project,
    path: &Path,
    fields: Option<&[&str]>,
) -> Result<usize> {
    let issues = storage.list_issues(project.id)?;
    csv::write(&issues, path, fields)?;
    info!(project = %project.key(), count = issues.len(), path = %path.display(), "Exported issues");
    Ok(issues.len())
}
