//! Configuration management.
//!
//! This module discovers the configuration file in a working directory and
//! resolves it into the canonical [`Config`] model.
//!
//! # On-disk schemas
//!
//! Two YAML shapes are accepted and both produce the same in-memory model:
//! - **Canonical** (nested): `global: {database, token, ...}` plus a
//!   `projects:` list
//! - **Legacy** (flat): a single `owner`/`repo` with `token`, `database`
//!   and a `sync:` block
//!
//! Resolution is a pure transform of the file content plus the working
//! directory; nothing here touches the store or the network. The resolved
//! value is passed explicitly into every component that needs it.

mod schema;

pub use schema::resolve_config;

use crate::error::{Error, Result};
use crate::model::NewProject;

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Recognized configuration filenames, in priority order.
pub const CONFIG_FILENAMES: [&str; 2] = ["issuesync.yaml", ".issuesync.yaml"];

/// Store location used when the configuration names none.
pub const DEFAULT_DATABASE_PATH: &str = "issues.db";

/// Page size requested from the tracker when none is configured.
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Canonical configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory the configuration was resolved against.
    pub root: PathBuf,
    pub global: GlobalConfig,
    pub projects: Vec<ProjectConfig>,
}

/// Defaults shared by every project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    pub database: PathBuf,
    pub token: Option<String>,
    pub batch_size: u32,
    pub include_closed: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE_PATH),
            token: None,
            batch_size: DEFAULT_BATCH_SIZE,
            include_closed: true,
        }
    }
}

/// One configured `(owner, repo)` pair with optional overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectConfig {
    pub owner: String,
    pub repo: String,
    pub path: Option<PathBuf>,
    pub token: Option<String>,
    pub database_path: Option<PathBuf>,
}

impl ProjectConfig {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            ..Self::default()
        }
    }

    /// The `owner/repo` display key.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    #[must_use]
    pub fn matches(&self, owner: &str, repo: &str) -> bool {
        self.owner.eq_ignore_ascii_case(owner) && self.repo.eq_ignore_ascii_case(repo)
    }
}

impl From<&ProjectConfig> for NewProject {
    fn from(p: &ProjectConfig) -> Self {
        Self {
            owner: p.owner.clone(),
            repo: p.repo.clone(),
            path: p.path.as_ref().map(|x| x.to_string_lossy().to_string()),
            token: p.token.clone(),
            database_path: p
                .database_path
                .as_ref()
                .map(|x| x.to_string_lossy().to_string()),
        }
    }
}

impl Config {
    /// An empty canonical configuration rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            global: GlobalConfig::default(),
            projects: Vec::new(),
        }
    }

    /// Credential for a project: the project override, else the global default.
    #[must_use]
    pub fn effective_token<'a>(&'a self, project: &'a ProjectConfig) -> Option<&'a str> {
        project
            .token
            .as_deref()
            .or(self.global.token.as_deref())
    }

    /// Store file for a project.
    ///
    /// A project override wins; relative overrides are joined to the
    /// project's path (itself anchored at the config root) or to the root.
    /// The global database is joined to the config root when relative.
    #[must_use]
    pub fn store_path(&self, project: &ProjectConfig) -> PathBuf {
        if let Some(db) = &project.database_path {
            if db.is_absolute() {
                return db.clone();
            }
            let base = project
                .path
                .as_ref()
                .map_or_else(|| self.root.clone(), |p| self.root.join(p));
            return base.join(db);
        }
        self.default_store_path()
    }

    /// The global store file, joined to the config root when relative.
    #[must_use]
    pub fn default_store_path(&self) -> PathBuf {
        if self.global.database.is_absolute() {
            self.global.database.clone()
        } else {
            self.root.join(&self.global.database)
        }
    }

    #[must_use]
    pub fn find_project(&self, owner: &str, repo: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.matches(owner, repo))
    }

    /// Add a project to the list.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateProject` if the pair is already configured.
    pub fn add_project(&mut self, project: ProjectConfig) -> Result<()> {
        if self.find_project(&project.owner, &project.repo).is_some() {
            return Err(Error::DuplicateProject {
                owner: project.owner,
                repo: project.repo,
            });
        }
        self.projects.push(project);
        Ok(())
    }
}

/// Locate the configuration file in `dir`.
///
/// # Errors
///
/// Returns `ConfigNotFound` when none of [`CONFIG_FILENAMES`] exists.
pub fn find_config_file(dir: &Path) -> Result<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| Error::ConfigNotFound {
            dir: dir.to_path_buf(),
            tried: CONFIG_FILENAMES.iter().map(ToString::to_string).collect(),
        })
}

/// Load and resolve the configuration for a working directory.
///
/// # Errors
///
/// Returns `ConfigNotFound`, `ConfigParse`, `InvalidConfig`, or an I/O error.
pub fn load_config(dir: &Path) -> Result<Config> {
    let path = find_config_file(dir)?;
    debug!(path = %path.display(), "Reading configuration");
    let content = std::fs::read_to_string(&path)?;
    resolve_config(&content, dir)
}

#[derive(Serialize)]
struct GlobalOut<'a> {
    database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    batch_size: u32,
    include_closed: bool,
}

#[derive(Serialize)]
struct ProjectOut<'a> {
    owner: &'a str,
    repo: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database_path: Option<String>,
}

#[derive(Serialize)]
struct ConfigOut<'a> {
    global: GlobalOut<'a>,
    projects: Vec<ProjectOut<'a>>,
}

/// Render a configuration in the canonical nested schema.
///
/// # Errors
///
/// Returns `Other` if YAML serialization fails.
pub fn render_config(config: &Config) -> Result<String> {
    let out = ConfigOut {
        global: GlobalOut {
            database: config.global.database.to_string_lossy().to_string(),
            token: config.global.token.as_deref(),
            batch_size: config.global.batch_size,
            include_closed: config.global.include_closed,
        },
        projects: config
            .projects
            .iter()
            .map(|p| ProjectOut {
                owner: &p.owner,
                repo: &p.repo,
                path: p.path.as_ref().map(|x| x.to_string_lossy().to_string()),
                token: p.token.as_deref(),
                database_path: p
                    .database_path
                    .as_ref()
                    .map(|x| x.to_string_lossy().to_string()),
            })
            .collect(),
    };
    serde_yaml::to_string(&out).map_err(|e| Error::Other(format!("Failed to render config: {e}")))
}

/// Persist a configuration in the canonical nested schema.
///
/// # Errors
///
/// Returns an error if rendering or writing fails.
pub fn write_config(path: &Path, config: &Config) -> Result<()> {
    let content = render_config(config)?;
    crate::file::atomic_write(path, &content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(project: ProjectConfig) -> Config {
        let mut config = Config::new("/work");
        config.global.token = Some("global-token".into());
        config.projects.push(project);
        config
    }

    #[test]
    fn test_effective_token_prefers_project() {
        let mut project = ProjectConfig::new("acme", "widgets");
        let config = config_with(project.clone());
        assert_eq!(config.effective_token(&project), Some("global-token"));

        project.token = Some("project-token".into());
        assert_eq!(config.effective_token(&project), Some("project-token"));
    }

    #[test]
    fn test_store_path_resolution() {
        let mut project = ProjectConfig::new("acme", "widgets");
        let config = config_with(project.clone());
        assert_eq!(config.store_path(&project), PathBuf::from("/work/issues.db"));

        project.database_path = Some(PathBuf::from("cache.db"));
        assert_eq!(config.store_path(&project), PathBuf::from("/work/cache.db"));

        project.path = Some(PathBuf::from("/src/widgets"));
        assert_eq!(config.store_path(&project), PathBuf::from("/src/widgets/cache.db"));

        project.path = Some(PathBuf::from("sub"));
        project.database_path = Some(PathBuf::from("w.db"));
        assert_eq!(config.store_path(&project), PathBuf::from("/work/sub/w.db"));

        project.database_path = Some(PathBuf::from("/abs/w.db"));
        assert_eq!(config.store_path(&project), PathBuf::from("/abs/w.db"));
    }

    #[test]
    fn test_add_project_rejects_duplicates() {
        let mut config = config_with(ProjectConfig::new("acme", "widgets"));
        let err = config
            .add_project(ProjectConfig::new("ACME", "Widgets"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateProject { .. }));
        config.add_project(ProjectConfig::new("acme", "gadgets")).unwrap();
        assert_eq!(config.projects.len(), 2);
    }

    #[test]
    fn test_find_config_file_priority() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".issuesync.yaml"), "owner: a\nrepo: b\n").unwrap();
        assert_eq!(
            find_config_file(dir.path()).unwrap(),
            dir.path().join(".issuesync.yaml")
        );

        std::fs::write(dir.path().join("issuesync.yaml"), "owner: c\nrepo: d\n").unwrap();
        assert_eq!(
            find_config_file(dir.path()).unwrap(),
            dir.path().join("issuesync.yaml")
        );
    }

    #[test]
    fn test_load_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn test_write_then_load_is_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new(dir.path());
        config.global.token = Some("t0k".into());
        config.global.batch_size = 50;
        let mut project = ProjectConfig::new("acme", "widgets");
        project.database_path = Some(PathBuf::from("w.db"));
        config.projects.push(project);

        let path = dir.path().join(CONFIG_FILENAMES[0]);
        write_config(&path, &config).unwrap();
        let loaded = load_config(dir.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
