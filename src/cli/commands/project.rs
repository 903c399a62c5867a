//! Project management commands.
//!
//! Projects live in two places: the configuration file (what to sync) and
//! the store's registry (what cached issues belong to). These commands keep
//! both in step:
//! - `isync project add <owner/repo>` - Register a project
//! - `isync project list` - List configured projects with cached counts
//! - `isync project update <owner/repo>` - Change path, token or store
//! - `isync project remove <owner/repo>` - Remove a project and its issues

use crate::cli::{Context, ProjectArgs, ProjectCommands};
use crate::config::{find_config_file, write_config, Config, ProjectConfig};
use crate::error::{Error, Result};
use crate::model::{parse_project_key, NewProject, ProjectUpdate};
use crate::storage::{open_for_write, SqliteStorage};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct ProjectOutput {
    owner: String,
    repo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    has_token: bool,
    database: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    issues: Option<usize>,
}

#[derive(Serialize)]
struct ProjectListOutput {
    projects: Vec<ProjectOutput>,
    count: usize,
}

/// Execute a project command.
///
/// # Errors
///
/// Returns config, registry or store errors for the chosen subcommand.
pub fn execute(command: &ProjectCommands, ctx: &Context) -> Result<()> {
    match command {
        ProjectCommands::Add(args) => execute_add(ctx, args),
        ProjectCommands::List => execute_list(ctx),
        ProjectCommands::Update(args) => execute_update(ctx, args),
        ProjectCommands::Remove { key } => execute_remove(ctx, key),
    }
}

fn describe(config: &Config, project: &ProjectConfig, issues: Option<usize>) -> ProjectOutput {
    ProjectOutput {
        owner: project.owner.clone(),
        repo: project.repo.clone(),
        path: project.path.clone(),
        has_token: config.effective_token(project).is_some(),
        database: config.store_path(project),
        issues,
    }
}

/// Store path with `--db` applied, without touching the config to be saved.
fn store_path(ctx: &Context, config: &Config, project: &ProjectConfig) -> PathBuf {
    let mut effective = config.clone();
    ctx.apply_overrides(&mut effective);
    effective.store_path(project)
}

fn execute_add(ctx: &Context, args: &ProjectArgs) -> Result<()> {
    let config_path = find_config_file(&ctx.dir)?;
    let mut config = ctx.load_config()?;
    let (owner, repo) = parse_project_key(&args.key)?;

    let project = ProjectConfig {
        owner,
        repo,
        path: args.path.clone(),
        token: args.project_token.clone(),
        database_path: args.database_path.clone(),
    };
    config.add_project(project.clone())?;

    let store = store_path(ctx, &config, &project);
    let registration = NewProject::from(&project);
    let (_lock, mut storage) = open_for_write(&store, Some(&registration))?;
    storage.ensure_project(&registration)?;
    write_config(&config_path, &config)?;

    if ctx.json {
        println!("{}", serde_json::to_string(&describe(&config, &project, Some(0)))?);
    } else {
        println!("{} {}", "Added project".green(), project.key().bold());
        println!("  Database: {}", store.display());
    }
    Ok(())
}

fn execute_list(ctx: &Context) -> Result<()> {
    let config = ctx.effective_config()?;

    let mut projects = Vec::with_capacity(config.projects.len());
    for project in &config.projects {
        let store = config.store_path(project);
        let issues = if store.exists() {
            cached_count(&SqliteStorage::open_existing(&store)?, project)?
        } else {
            None
        };
        projects.push(describe(&config, project, issues));
    }

    if ctx.json {
        let output = ProjectListOutput {
            count: projects.len(),
            projects,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if projects.is_empty() {
        println!("No projects configured.");
        println!("\nAdd one with: isync project add owner/repo");
        return Ok(());
    }

    println!("Projects ({}):", projects.len());
    println!();
    for p in &projects {
        let issues = p
            .issues
            .map_or_else(|| "not synced".to_string(), |n| format!("{n} issues"));
        println!("  {}/{}  {}", p.owner.bold(), p.repo.bold(), issues.dimmed());
        if let Some(path) = &p.path {
            println!("    Path:     {}", path.display());
        }
        println!("    Database: {}", p.database.display());
        if !p.has_token {
            println!("    {}", "no token configured".yellow());
        }
    }
    Ok(())
}

/// Cached issue count, or `None` when the store has not registered the project.
fn cached_count(storage: &SqliteStorage, project: &ProjectConfig) -> Result<Option<usize>> {
    if storage.is_legacy()? {
        return Ok(None);
    }
    match storage.get_project(&project.owner, &project.repo)? {
        Some(registered) => Ok(Some(storage.count_issues(registered.id)?)),
        None => Ok(None),
    }
}

fn execute_update(ctx: &Context, args: &ProjectArgs) -> Result<()> {
    let config_path = find_config_file(&ctx.dir)?;
    let mut config = ctx.load_config()?;
    let (owner, repo) = parse_project_key(&args.key)?;

    let update = ProjectUpdate {
        path: args.path.as_ref().map(|p| p.to_string_lossy().to_string()),
        token: args.project_token.clone(),
        database_path: args
            .database_path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
    };
    if update.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to update: pass --path, --project-token or --database-path".to_string(),
        ));
    }

    let project = config
        .projects
        .iter_mut()
        .find(|p| p.matches(&owner, &repo))
        .ok_or_else(|| Error::ProjectNotFound(args.key.clone()))?;
    if let Some(path) = &args.path {
        project.path = Some(path.clone());
    }
    if let Some(token) = &args.project_token {
        project.token = Some(token.clone());
    }
    if let Some(database_path) = &args.database_path {
        project.database_path = Some(database_path.clone());
    }
    let project = project.clone();

    let store = store_path(ctx, &config, &project);
    let registration = NewProject::from(&project);
    let (_lock, mut storage) = open_for_write(&store, Some(&registration))?;
    storage.ensure_project(&registration)?;
    storage.update_project(&project.owner, &project.repo, &update)?;
    write_config(&config_path, &config)?;

    if ctx.json {
        println!("{}", serde_json::to_string(&describe(&config, &project, None))?);
    } else {
        println!("{} {}", "Updated project".green(), project.key().bold());
    }
    Ok(())
}

fn execute_remove(ctx: &Context, key: &str) -> Result<()> {
    let config_path = find_config_file(&ctx.dir)?;
    let mut config = ctx.load_config()?;
    let (owner, repo) = parse_project_key(key)?;

    let index = config
        .projects
        .iter()
        .position(|p| p.matches(&owner, &repo))
        .ok_or_else(|| Error::ProjectNotFound(key.to_string()))?;
    let project = config.projects[index].clone();

    let store = store_path(ctx, &config, &project);
    let removed_issues = if store.exists() {
        let (_lock, mut storage) = open_for_write(&store, Some(&NewProject::from(&project)))?;
        match storage.delete_project(&project.owner, &project.repo) {
            Ok(count) => count,
            Err(Error::ProjectNotFound(_)) => 0,
            Err(e) => return Err(e),
        }
    } else {
        0
    };

    config.projects.remove(index);
    write_config(&config_path, &config)?;

    if ctx.json {
        let output = serde_json::json!({
            "removed": project.key(),
            "issues_removed": removed_issues,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{} {}", "Removed project".green(), project.key().bold());
        println!("  Deleted {removed_issues} cached issues");
    }
    Ok(())
}
