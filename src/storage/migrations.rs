//! Single-project to multi-project schema migration.
//!
//! Older stores cached one repository and had no `project_id` on `issues`.
//! The upgrade adds the column, registers a default project and points every
//! existing row at it. The whole sequence runs in one transaction: either
//! all of it is committed or the previous schema is left untouched.

use rusqlite::{Connection, Transaction};
use serde::Serialize;
use tracing::{debug, info};

use super::schema::{column_exists, PROJECT_INDEX_SQL, REGISTRY_SQL};
use crate::error::Result;
use crate::model::NewProject;

/// Version recorded in `schema_migrations` for this upgrade.
pub const MULTI_PROJECT_VERSION: &str = "002_multi_project";

/// Owner used for the default project when no configuration is resolvable.
pub const SENTINEL_OWNER: &str = "unknown";

/// Repository used for the default project when no configuration is resolvable.
pub const SENTINEL_REPO: &str = "unknown";

/// Columns added to legacy `issues` tables, with their definitions.
const ADDED_COLUMNS: &[(&str, &str)] = &[
    (
        "project_id",
        "INTEGER REFERENCES projects(id) ON DELETE CASCADE",
    ),
    ("local_modified_at", "TEXT"),
    ("sync_hash", "TEXT"),
];

/// What [`migrate_schema`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// The store already had `project_id`; nothing was touched.
    AlreadyCurrent,
    /// The store was upgraded.
    Migrated {
        project_id: i64,
        owner: String,
        repo: String,
        backfilled: usize,
    },
}

/// Upgrade a single-project store in place.
///
/// `default_project` describes the repository the legacy rows came from
/// (normally the first configured project). When `None`, a sentinel
/// `unknown/unknown` project is registered instead.
///
/// Running this on an already-migrated store is a no-op.
///
/// # Errors
///
/// Returns a database error if any step fails; the transaction is rolled
/// back and the prior schema is intact.
pub fn migrate_schema(
    conn: &mut Connection,
    default_project: Option<&NewProject>,
) -> Result<MigrationOutcome> {
    if column_exists(conn, "issues", "project_id")? {
        debug!("Store already has project references, skipping migration");
        return Ok(MigrationOutcome::AlreadyCurrent);
    }

    let sentinel = NewProject::new(SENTINEL_OWNER, SENTINEL_REPO);
    let project = default_project.unwrap_or(&sentinel);

    info!(
        owner = %project.owner,
        repo = %project.repo,
        "Migrating store to multi-project schema"
    );

    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
    let outcome = apply_upgrade(&tx, project)?;
    tx.commit()?;

    if let MigrationOutcome::Migrated { backfilled, project_id, .. } = &outcome {
        info!(project_id, backfilled, "Migration complete");
    }
    Ok(outcome)
}

fn apply_upgrade(tx: &Transaction, project: &NewProject) -> Result<MigrationOutcome> {
    tx.execute_batch(REGISTRY_SQL)?;

    for (column, definition) in ADDED_COLUMNS {
        if !column_exists(tx, "issues", column)? {
            tx.execute_batch(&format!(
                "ALTER TABLE issues ADD COLUMN {column} {definition}"
            ))?;
        }
    }

    let now = chrono::Utc::now().timestamp_millis();
    tx.execute(
        "INSERT OR IGNORE INTO projects (owner, repo, path, token, database_path, created_at, updated_at)
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

    let project_id: i64 = tx.query_row(
        "SELECT id FROM projects WHERE owner = ?1 AND repo = ?2",
        [&project.owner, &project.repo],
        |row| row.get(0),
    )?;

    let backfilled = tx.execute(
        "UPDATE issues SET project_id = ?1 WHERE project_id IS NULL",
        [project_id],
    )?;

    tx.execute_batch(PROJECT_INDEX_SQL)?;
    tx.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![MULTI_PROJECT_VERSION, now],
    )?;

    Ok(MigrationOutcome::Migrated {
        project_id,
        owner: project.owner.clone(),
        repo: project.repo.clone(),
        backfilled,
    })
}
