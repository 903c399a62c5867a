//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{self, Config, ProjectConfig};
use crate::error::{Error, Result};
use crate::model::parse_project_key;
use crate::remote::GitHubClient;

pub mod commands;

/// issuesync - keep a local SQLite cache of tracker issues
#[derive(Parser, Debug)]
#[command(name = "isync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the configuration file (default: current directory)
    #[arg(short = 'C', long = "dir", global = true)]
    pub dir: Option<PathBuf>,

    /// Store path, replacing the configured global database
    #[arg(long, global = true, env = "ISSUESYNC_DB")]
    pub db: Option<PathBuf>,

    /// Tracker token, replacing the configured global token
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Tracker API base URL
    #[arg(long, global = true, env = "ISSUESYNC_API_URL")]
    pub api_url: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a configuration file for one repository
    Init(InitArgs),

    /// Print version information
    Version,

    /// Fetch issues from the tracker into the local store
    Sync {
        /// Only sync this project (owner/repo)
        #[arg(long)]
        project: Option<String>,
    },

    /// Upgrade a single-project store to the multi-project layout
    Migrate,

    /// Project management
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Bulk exchange files
    Csv {
        #[command(subcommand)]
        command: CsvCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Repository owner
    #[arg(long)]
    pub owner: String,

    /// Repository name
    #[arg(long)]
    pub repo: String,

    /// Store path, relative to the configuration directory
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

// ============================================================================
// Project Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Register a project in the configuration and its store
    Add(ProjectArgs),

    /// List configured projects
    List,

    /// Change a project's path, token or store
    Update(ProjectArgs),

    /// Remove a project and its cached issues
    Remove {
        /// Project key (owner/repo)
        key: String,
    },
}

#[derive(Args, Debug)]
pub struct ProjectArgs {
    /// Project key (owner/repo)
    pub key: String,

    /// Local checkout of the repository
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Token used for this project only
    #[arg(long = "project-token")]
    pub project_token: Option<String>,

    /// Store used for this project only
    #[arg(long)]
    pub database_path: Option<PathBuf>,
}

// ============================================================================
// CSV Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum CsvCommands {
    /// Check a file's structure without importing it
    Validate {
        /// File to check
        file: PathBuf,
    },

    /// Write a project's cached issues to a file
    Export {
        /// Output file
        file: PathBuf,

        /// Project (owner/repo); required when several are configured
        #[arg(long)]
        project: Option<String>,

        /// Comma-separated columns (default: all)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },

    /// Import a file into the local store, or create its rows remotely
    Import {
        /// Input file
        file: PathBuf,

        /// Project (owner/repo); required when several are configured
        #[arg(long)]
        project: Option<String>,

        /// Create each row as a new issue on the tracker
        #[arg(long)]
        remote: bool,

        /// Parse and report without creating anything
        #[arg(long, requires = "remote")]
        dry_run: bool,
    },
}

// ============================================================================
// Shared command context
// ============================================================================

/// Global flags resolved once and handed to every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub dir: PathBuf,
    pub db: Option<PathBuf>,
    pub token: Option<String>,
    pub api_url: Option<String>,
    pub json: bool,
}

impl Context {
    /// Build from parsed flags; `dir` defaults to the current directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the current directory cannot be read.
    pub fn from_cli(cli: &Cli, json: bool) -> Result<Self> {
        let dir = match &cli.dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        Ok(Self {
            dir,
            db: cli.db.clone(),
            token: cli.token.clone().filter(|t| !t.trim().is_empty()),
            api_url: cli.api_url.clone(),
            json,
        })
    }

    /// Configuration exactly as stored on disk.
    ///
    /// # Errors
    ///
    /// Propagates config resolution errors.
    pub fn load_config(&self) -> Result<Config> {
        config::load_config(&self.dir)
    }

    /// Configuration with `--db` and `--token` applied. Never written back.
    ///
    /// # Errors
    ///
    /// Propagates config resolution errors.
    pub fn effective_config(&self) -> Result<Config> {
        let mut config = self.load_config()?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(db) = &self.db {
            config.global.database.clone_from(db);
        }
        if let Some(token) = &self.token {
            config.global.token = Some(token.clone());
        }
    }

    /// Tracker client for `--api-url`, or the public API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn client(&self) -> Result<GitHubClient> {
        match &self.api_url {
            Some(url) => GitHubClient::with_base_url(url),
            None => GitHubClient::new(),
        }
    }
}

/// Pick the project named by `key`, or the only configured one.
///
/// # Errors
///
/// `ProjectNotFound` for an unknown key, `InvalidArgument` when several
/// projects are configured and none was named, `InvalidConfig` when none is.
pub fn select_project<'c>(config: &'c Config, key: Option<&str>) -> Result<&'c ProjectConfig> {
    if let Some(key) = key {
        let (owner, repo) = parse_project_key(key)?;
        return config
            .find_project(&owner, &repo)
            .ok_or_else(|| Error::ProjectNotFound(key.to_string()));
    }

    match config.projects.as_slice() {
        [only] => Ok(only),
        [] => Err(Error::InvalidConfig("no projects configured".to_string())),
        _ => Err(Error::InvalidArgument(
            "several projects are configured; pass --project owner/repo".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_select_project() {
        let mut config = Config::new("/work");
        assert!(matches!(
            select_project(&config, None),
            Err(Error::InvalidConfig(_))
        ));

        config.projects.push(ProjectConfig::new("acme", "widgets"));
        assert_eq!(select_project(&config, None).unwrap().repo, "widgets");

        config.projects.push(ProjectConfig::new("acme", "gadgets"));
        assert!(matches!(
            select_project(&config, None),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(
            select_project(&config, Some("acme/gadgets")).unwrap().repo,
            "gadgets"
        );
        assert!(matches!(
            select_project(&config, Some("acme/none")),
            Err(Error::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_overrides_do_not_touch_projects() {
        let ctx = Context {
            dir: PathBuf::from("/work"),
            db: Some(PathBuf::from("other.db")),
            token: Some("cli-token".into()),
            api_url: None,
            json: false,
        };
        let mut config = Config::new("/work");
        let mut project = ProjectConfig::new("acme", "widgets");
        project.token = Some("project-token".into());
        config.projects.push(project);

        ctx.apply_overrides(&mut config);
        assert_eq!(config.default_store_path(), PathBuf::from("/work/other.db"));
        assert_eq!(config.effective_token(&config.projects[0]), Some("project-token"));
    }
}
