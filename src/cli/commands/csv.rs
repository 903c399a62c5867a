//! Exchange-file commands: validate, export and import.

use crate::bulk::{self, ImportSummary};
use crate::cli::{select_project, Context, CsvCommands};
use crate::csv;
use crate::error::{Error, Result};
use crate::model::NewProject;
use crate::storage::{open_for_write, SqliteStorage};
use colored::Colorize;
use std::path::Path;

/// Execute a csv command.
///
/// # Errors
///
/// Returns format, parse, config or store errors for the chosen subcommand.
pub fn execute(command: &CsvCommands, ctx: &Context) -> Result<()> {
    match command {
        CsvCommands::Validate { file } => execute_validate(ctx, file),
        CsvCommands::Export {
            file,
            project,
            fields,
        } => execute_export(ctx, file, project.as_deref(), fields),
        CsvCommands::Import {
            file,
            project,
            remote,
            dry_run,
        } => execute_import(ctx, file, project.as_deref(), *remote, *dry_run),
    }
}

fn execute_validate(ctx: &Context, file: &Path) -> Result<()> {
    let summary = csv::validate(file)?;

    if ctx.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!(
            "{} {} ({} rows, {} columns)",
            "Valid:".green(),
            file.display(),
            summary.rows,
            summary.columns.len()
        );
    }
    Ok(())
}

fn execute_export(
    ctx: &Context,
    file: &Path,
    key: Option<&str>,
    fields: &[String],
) -> Result<()> {
    let config = ctx.effective_config()?;
    let project = select_project(&config, key)?;
    let store = config.store_path(project);

    if !store.exists() {
        return Err(Error::ProjectNotFound(project.key()));
    }
    let storage = SqliteStorage::open_existing(&store)?;
    let found = if storage.is_legacy()? {
        None
    } else {
        storage.get_project(&project.owner, &project.repo)?
    };
    let registered = found.ok_or_else(|| Error::ProjectNotFound(project.key()))?;

    let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
    let count = bulk::export_from_store(&storage, &registered, file, Some(fields.as_slice()))?;

    if ctx.json {
        let output = serde_json::json!({
            "project": registered.key(),
            "file": file,
            "exported": count,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "{} {count} issues from {} to {}",
            "Exported".green(),
            registered.key().bold(),
            file.display()
        );
    }
    Ok(())
}

fn execute_import(
    ctx: &Context,
    file: &Path,
    key: Option<&str>,
    remote: bool,
    dry_run: bool,
) -> Result<()> {
    let config = ctx.effective_config()?;
    let project = select_project(&config, key)?;

    let summary = if remote {
        let client = ctx.client()?;
        bulk::import_to_remote(file, project, config.effective_token(project), &client, dry_run)?
    } else {
        let store = config.store_path(project);
        let registration = NewProject::from(project);
        let (_lock, mut storage) = open_for_write(&store, Some(&registration))?;
        let registered = storage.ensure_project(&registration)?;
        bulk::import_to_store(file, &mut storage, &registered)?
    };

    if ctx.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        print_summary(&project.key(), &summary, remote, dry_run);
    }
    Ok(())
}

fn print_summary(project: &str, summary: &ImportSummary, remote: bool, dry_run: bool) {
    let target = if remote { "tracker" } else { "local store" };
    if dry_run {
        println!(
            "{} {} rows parsed for {}; nothing created",
            "Dry run:".yellow(),
            summary.total,
            project.bold()
        );
        return;
    }

    println!(
        "{} {} into the {target}: {} created, {} updated, {} skipped",
        "Imported".green(),
        project.bold(),
        summary.created,
        summary.updated,
        summary.skipped
    );
    for error in &summary.errors {
        println!("  {} {error}", "failed".red());
    }
}
