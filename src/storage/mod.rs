//! SQLite storage layer for issuesync.
//!
//! This module provides the local issue cache using SQLite with:
//! - WAL mode for concurrent reads
//! - One IMMEDIATE transaction per write
//! - An in-place upgrade from the single-project layout
//! - An advisory file lock for writers
//!
//! # Submodules
//!
//! - [`lock`] - Single-writer lock file
//! - [`migrations`] - Single-project to multi-project upgrade
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod lock;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use lock::StoreLock;
pub use migrations::{migrate_schema, MigrationOutcome};
pub use sqlite::{SqliteStorage, UpsertOutcome};

use std::path::Path;

use crate::error::Result;
use crate::model::NewProject;

/// Lock, open and migrate a store for writing.
///
/// The lock is released when the returned guard drops. Bind the storage
/// after the guard so it closes first.
///
/// # Errors
///
/// Returns `StoreLocked` if another writer holds the store, or the open or
/// migration error.
pub fn open_for_write(
    store: &Path,
    default_project: Option<&NewProject>,
) -> Result<(StoreLock, SqliteStorage)> {
    let lock = StoreLock::acquire(store)?;
    let mut storage = SqliteStorage::open(store)?;
    storage.migrate(default_project)?;
    Ok((lock, storage))
}
