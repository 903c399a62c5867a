//! Database schema definitions.
//!
//! The multi-project layout: a `projects` registry and an `issues` cache
//! whose rows reference their project. Stores created before projects
//! existed have an `issues` table without `project_id`; those are upgraded
//! by [`super::migrations::migrate_schema`].

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Migration bookkeeping and the project registry.
///
/// Timestamps on `projects` are INTEGER (Unix milliseconds). A legacy store
/// gets these tables from the upgrade transaction, never from
/// [`apply_schema`].
pub const REGISTRY_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT NOT NULL COLLATE NOCASE,
    repo TEXT NOT NULL COLLATE NOCASE,
    path TEXT,
    token TEXT,
    database_path TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(owner, repo)
);
";

/// The issue cache of a fresh store.
///
/// Issue timestamps are RFC 3339 TEXT as delivered by the tracker. Labels
/// and assignees are comma-delimited TEXT.
pub const ISSUES_SQL: &str = r"
CREATE TABLE IF NOT EXISTS issues (
    id INTEGER PRIMARY KEY,
    project_id INTEGER REFERENCES projects(id) ON DELETE CASCADE,
    number INTEGER NOT NULL,
    title TEXT NOT NULL,
    body TEXT,
    state TEXT NOT NULL DEFAULT 'open',
    labels TEXT,
    assignees TEXT,
    created_at TEXT,
    updated_at TEXT,
    closed_at TEXT,
    local_modified_at TEXT,
    sync_hash TEXT
);
";

/// Indexes that depend on the multi-project columns.
pub const PROJECT_INDEX_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_issues_project ON issues(project_id);
CREATE INDEX IF NOT EXISTS idx_issues_project_number ON issues(project_id, number);
";

/// The single-project layout that predates the `projects` table.
#[cfg(test)]
pub const LEGACY_SCHEMA_SQL: &str = r"
CREATE TABLE issues (
    id INTEGER PRIMARY KEY,
    number INTEGER NOT NULL,
    title TEXT NOT NULL,
    body TEXT,
    state TEXT NOT NULL,
    labels TEXT,
    assignees TEXT,
    created_at TEXT,
    updated_at TEXT,
    closed_at TEXT
);
";

/// Apply connection pragmas and create any missing tables.
///
/// Fresh and already-migrated stores get the full schema. A legacy store
/// (an `issues` table without `project_id`) only gets the pragmas; every
/// table it is missing is created by the upgrade transaction.
///
/// # Errors
///
/// Returns an error if a pragma or DDL statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    apply_pragmas(conn)?;

    if is_legacy(conn)? {
        return Ok(());
    }

    conn.execute_batch(REGISTRY_SQL)?;
    conn.execute_batch(ISSUES_SQL)?;
    conn.execute_batch(PROJECT_INDEX_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

/// Connection settings shared by every open.
fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(())
}

/// True for a store written by the single-project release.
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub fn is_legacy(conn: &Connection) -> Result<bool> {
    Ok(table_exists(conn, "issues")? && !column_exists(conn, "issues", "project_id")?)
}

/// Check if a table exists.
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?
        .exists([table])
}

/// Check if a column exists in a table.
///
/// # Errors
///
/// Returns an error if the pragma query fails.
pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let sql = format!("SELECT 1 FROM pragma_table_info('{table}') WHERE name = ?1");
    conn.prepare(&sql)?.exists([column])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"projects".to_string()));
        assert!(tables.contains(&"issues".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
        assert!(column_exists(&conn, "issues", "sync_hash").unwrap());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("First apply failed");
        apply_schema(&conn).expect("Second apply failed");
    }

    #[test]
    fn test_legacy_store_gets_no_ddl() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(LEGACY_SCHEMA_SQL).unwrap();
        apply_schema(&conn).unwrap();

        assert!(is_legacy(&conn).unwrap());
        assert!(!table_exists(&conn, "projects").unwrap());
        assert!(!table_exists(&conn, "schema_migrations").unwrap());
        assert!(!table_exists(&conn, "sqlite_sequence").unwrap());
    }

    #[test]
    fn test_fresh_store_is_not_legacy() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!is_legacy(&conn).unwrap());
        apply_schema(&conn).unwrap();
        assert!(!is_legacy(&conn).unwrap());
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let enabled: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
