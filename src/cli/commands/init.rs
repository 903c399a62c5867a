//! Write a configuration file for one repository.
//!
//! `isync init --owner acme --repo widgets` writes `issuesync.yaml` in the
//! configuration directory with a single project rooted there, then creates
//! the store and registers the project in it. Tokens are never written by
//! `init`; they come from `GITHUB_TOKEN`, `--token`, or a later edit.

use crate::cli::{Context, InitArgs};
use crate::config::{find_config_file, write_config, Config, ProjectConfig, CONFIG_FILENAMES};
use crate::error::{Error, Result};
use crate::model::{parse_project_key, NewProject};
use crate::storage::open_for_write;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct InitOutput {
    config: PathBuf,
    database: PathBuf,
    project: String,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `InvalidArgument` if a configuration already exists (without
/// `--force`) or owner/repo are blank, or an error writing the files.
pub fn execute(ctx: &Context, args: &InitArgs) -> Result<()> {
    let (owner, repo) = parse_project_key(&format!("{}/{}", args.owner, args.repo))?;

    if let Ok(existing) = find_config_file(&ctx.dir) {
        if !args.force {
            return Err(Error::InvalidArgument(format!(
                "configuration already exists at {} (pass --force to overwrite)",
                existing.display()
            )));
        }
    }

    let mut config = Config::new(&ctx.dir);
    if let Some(database) = &args.database {
        config.global.database.clone_from(database);
    }
    let mut project = ProjectConfig::new(owner, repo);
    project.path = Some(ctx.dir.clone());
    config.add_project(project.clone())?;

    let config_path = ctx.dir.join(CONFIG_FILENAMES[0]);
    write_config(&config_path, &config)?;

    let store = config.store_path(&project);
    let registration = NewProject::from(&project);
    let (_lock, mut storage) = open_for_write(&store, Some(&registration))?;
    storage.ensure_project(&registration)?;

    if ctx.json {
        let output = InitOutput {
            config: config_path,
            database: store,
            project: project.key(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{} {}", "Initialized".green().bold(), project.key().bold());
        println!("  Config:   {}", config_path.display());
        println!("  Database: {}", store.display());
        println!();
        println!("Next: export GITHUB_TOKEN and run 'isync sync'.");
    }

    Ok(())
}
