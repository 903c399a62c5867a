//! Upgrade a single-project store in place.

use crate::cli::Context;
use crate::config::DEFAULT_DATABASE_PATH;
use crate::error::Result;
use crate::model::NewProject;
use crate::storage::{MigrationOutcome, SqliteStorage, StoreLock};
use colored::Colorize;
use tracing::warn;

/// Execute the migrate command.
///
/// The default project for legacy rows is the first configured project.
/// Without a usable configuration the rows go to the `unknown/unknown`
/// sentinel project.
///
/// # Errors
///
/// Returns `StoreLocked` if another writer holds the store, or a database
/// error if the migration fails (the store is left unchanged).
pub fn execute(ctx: &Context) -> Result<()> {
    let config = match ctx.effective_config() {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(error = %e, "No usable configuration, legacy rows go to the sentinel project");
            None
        }
    };

    let store = match (&ctx.db, &config) {
        (Some(db), _) => ctx.dir.join(db),
        (None, Some(config)) => config
            .projects
            .first()
            .map_or_else(|| config.default_store_path(), |p| config.store_path(p)),
        (None, None) => ctx.dir.join(DEFAULT_DATABASE_PATH),
    };
    let default_project = config
        .as_ref()
        .and_then(|c| c.projects.first())
        .map(NewProject::from);

    let _lock = StoreLock::acquire(&store)?;
    let mut storage = SqliteStorage::open(&store)?;
    let outcome = storage.migrate(default_project.as_ref())?;

    if ctx.json {
        let output = serde_json::json!({
            "database": store,
            "outcome": outcome,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    match outcome {
        MigrationOutcome::AlreadyCurrent => {
            println!("{} {}", "Up to date:".green(), store.display());
        }
        MigrationOutcome::Migrated {
            owner,
            repo,
            backfilled,
            ..
        } => {
            println!("{} {}", "Migrated".green().bold(), store.display());
            println!("  Assigned {backfilled} cached issues to {owner}/{repo}");
        }
    }
    Ok(())
}
