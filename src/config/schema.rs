//! On-disk configuration schemas and their resolution.
//!
//! Detection is an explicit two-pass attempt: the canonical nested schema
//! first, then the legacy flat schema. A file that declares a `global` or
//! `projects` key is canonical even when those sections are empty or blank.

use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

use super::{Config, GlobalConfig, ProjectConfig, DEFAULT_BATCH_SIZE, DEFAULT_DATABASE_PATH};
use crate::error::{Error, Result};

/// Nested schema: `global:` plus `projects:`.
///
/// Each section is `Some(..)` when its key is present, even if the value is
/// null, so that a bare `global:` still marks the file canonical.
#[derive(Debug, Deserialize)]
struct CanonicalFile {
    #[serde(default, deserialize_with = "present")]
    global: Option<Option<RawGlobal>>,
    #[serde(default, deserialize_with = "present")]
    projects: Option<Option<Vec<RawProject>>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGlobal {
    database: Option<String>,
    token: Option<String>,
    batch_size: Option<u32>,
    include_closed: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProject {
    owner: Option<String>,
    repo: Option<String>,
    path: Option<String>,
    token: Option<String>,
    database_path: Option<String>,
}

/// Flat single-project schema.
#[derive(Debug, Deserialize)]
struct LegacyFile {
    owner: Option<String>,
    repo: Option<String>,
    token: Option<String>,
    database: Option<String>,
    #[serde(default)]
    sync: Option<LegacySync>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacySync {
    include_closed: Option<bool>,
    batch_size: Option<u32>,
}

fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trimmed, non-blank string or `None`.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn batch_size_or_default(value: Option<u32>) -> u32 {
    match value {
        Some(n) if n > 0 => n,
        _ => DEFAULT_BATCH_SIZE,
    }
}

fn database_or_default(value: Option<String>) -> PathBuf {
    PathBuf::from(non_blank(value).unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()))
}

impl CanonicalFile {
    fn declares_sections(&self) -> bool {
        self.global.is_some() || self.projects.is_some()
    }

    fn into_config(self, cwd: &Path) -> Result<Config> {
        let global = self.global.flatten().unwrap_or_default();
        let raw_projects = self.projects.flatten().unwrap_or_default();

        let mut projects = Vec::with_capacity(raw_projects.len());
        for (index, raw) in raw_projects.into_iter().enumerate() {
            let (Some(owner), Some(repo)) = (non_blank(raw.owner), non_blank(raw.repo)) else {
                return Err(Error::InvalidConfig(format!(
                    "projects[{index}] requires both owner and repo"
                )));
            };
            projects.push(ProjectConfig {
                owner,
                repo,
                path: non_blank(raw.path).map(PathBuf::from),
                token: non_blank(raw.token),
                database_path: non_blank(raw.database_path).map(PathBuf::from),
            });
        }

        Ok(Config {
            root: cwd.to_path_buf(),
            global: GlobalConfig {
                database: database_or_default(global.database),
                token: non_blank(global.token),
                batch_size: batch_size_or_default(global.batch_size),
                include_closed: global.include_closed.unwrap_or(true),
            },
            projects,
        })
    }
}

impl LegacyFile {
    fn into_config(self, cwd: &Path) -> Result<Config> {
        let (Some(owner), Some(repo)) = (non_blank(self.owner), non_blank(self.repo)) else {
            return Err(Error::InvalidConfig(
                "legacy configuration requires both owner and repo".to_string(),
            ));
        };
        let sync = self.sync.unwrap_or_default();

        Ok(Config {
            root: cwd.to_path_buf(),
            global: GlobalConfig {
                database: database_or_default(self.database),
                token: non_blank(self.token),
                batch_size: batch_size_or_default(sync.batch_size),
                include_closed: sync.include_closed.unwrap_or(true),
            },
            projects: vec![ProjectConfig {
                owner,
                repo,
                path: Some(cwd.to_path_buf()),
                token: None,
                database_path: None,
            }],
        })
    }
}

/// Whether the raw YAML mapping has a `global` or `projects` key.
fn mentions_sections(content: &str) -> bool {
    serde_yaml::from_str::<serde_yaml::Value>(content)
        .ok()
        .and_then(|value| {
            value
                .as_mapping()
                .map(|m| m.contains_key("global") || m.contains_key("projects"))
        })
        .unwrap_or(false)
}

/// Resolve configuration content into the canonical model.
///
/// `cwd` becomes the config root and, for legacy files, the path of the
/// single project. Deterministic for a given input.
///
/// # Errors
///
/// - `InvalidConfig` when a schema parses but lacks owner/repo
/// - `ConfigParse` (carrying both failures) when neither schema parses
pub fn resolve_config(content: &str, cwd: &Path) -> Result<Config> {
    let canonical_failure = match serde_yaml::from_str::<CanonicalFile>(content) {
        Ok(file) if file.declares_sections() => return file.into_config(cwd),
        Ok(_) => "no global or projects section".to_string(),
        Err(e) => e.to_string(),
    };

    if mentions_sections(content) {
        return Err(Error::ConfigParse {
            canonical: canonical_failure,
            legacy: legacy_failure(content, cwd),
        });
    }

    match serde_yaml::from_str::<LegacyFile>(content) {
        Ok(file) => file.into_config(cwd),
        Err(e) => Err(Error::ConfigParse {
            canonical: canonical_failure,
            legacy: e.to_string(),
        }),
    }
}

/// Why the flat schema cannot stand in for a file that declares sections.
fn legacy_failure(content: &str, cwd: &Path) -> String {
    match serde_yaml::from_str::<LegacyFile>(content) {
        Err(e) => e.to_string(),
        Ok(file) => match file.into_config(cwd) {
            Err(e) => e.to_string(),
            Ok(_) => "owner and repo resolve, but global/projects sections take precedence"
                .to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cwd() -> PathBuf {
        PathBuf::from("/home/dev/widgets")
    }

    #[test]
    fn test_legacy_minimal_yields_single_project() {
        let config = resolve_config("owner: acme\nrepo: widgets\n", &cwd()).unwrap();

        assert_eq!(config.projects.len(), 1);
        let project = &config.projects[0];
        assert_eq!(project.owner, "acme");
        assert_eq!(project.repo, "widgets");
        assert_eq!(project.path.as_deref(), Some(cwd().as_path()));
        assert_eq!(config.global.database, PathBuf::from(DEFAULT_DATABASE_PATH));
        assert_eq!(config.global.batch_size, DEFAULT_BATCH_SIZE);
        assert!(config.global.token.is_none());
    }

    #[test]
    fn test_legacy_full_maps_to_globals() {
        let content = "owner: acme\nrepo: widgets\ntoken: ghp_x\ndatabase: cache/w.db\n\
                       sync:\n  include_closed: false\n  batch_size: 0\n";
        let config = resolve_config(content, &cwd()).unwrap();

        assert_eq!(config.global.token.as_deref(), Some("ghp_x"));
        assert_eq!(config.global.database, PathBuf::from("cache/w.db"));
        assert_eq!(config.global.batch_size, DEFAULT_BATCH_SIZE);
        assert!(!config.global.include_closed);
        assert!(config.projects[0].token.is_none());
    }

    #[test]
    fn test_legacy_blank_owner_is_invalid() {
        let err = resolve_config("owner: \"\"\nrepo: widgets\n", &cwd()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = resolve_config("token: abc\n", &cwd()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_blank_sections_are_canonical() {
        let content = "global:\n  database: \"\"\n  token: \"\"\nprojects: []\n";
        let config = resolve_config(content, &cwd()).unwrap();

        assert!(config.projects.is_empty());
        assert_eq!(config.global.database, PathBuf::from(DEFAULT_DATABASE_PATH));
        assert!(config.global.token.is_none());
    }

    #[test]
    fn test_bare_global_key_is_canonical() {
        let config = resolve_config("global:\nowner: acme\nrepo: widgets\n", &cwd()).unwrap();
        assert!(config.projects.is_empty());
    }

    #[test]
    fn test_canonical_projects() {
        let content = "\
global:
  database: all.db
  token: global-token
  batch_size: 25
projects:
  - owner: acme
    repo: widgets
    path: /src/widgets
  - owner: acme
    repo: gadgets
    token: gadget-token
    database_path: gadgets.db
";
        let config = resolve_config(content, &cwd()).unwrap();

        assert_eq!(config.global.batch_size, 25);
        assert_eq!(config.projects.len(), 2);
        assert_eq!(config.projects[0].path, Some(PathBuf::from("/src/widgets")));
        assert_eq!(config.projects[1].token.as_deref(), Some("gadget-token"));
        assert_eq!(config.effective_token(&config.projects[0]), Some("global-token"));
        assert_eq!(config.root, cwd());
    }

    #[test]
    fn test_canonical_project_missing_repo_is_invalid() {
        let err = resolve_config("projects:\n  - owner: acme\n", &cwd()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("projects[0]")));
    }

    #[test]
    fn test_unparseable_reports_both_failures() {
        let err = resolve_config("owner: [unterminated\n", &cwd()).unwrap_err();
        match err {
            Error::ConfigParse { canonical, legacy } => {
                assert!(!canonical.is_empty());
                assert!(!legacy.is_empty());
            }
            other => panic!("expected ConfigParse, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_canonical_does_not_fall_back() {
        let err = resolve_config("owner: acme\nrepo: widgets\nprojects: 42\n", &cwd()).unwrap_err();
        assert!(matches!(
            err,
            Error::ConfigParse { ref legacy, .. } if legacy.contains("take precedence")
        ));
    }

    #[test]
    fn test_malformed_sections_report_legacy_failure() {
        let err = resolve_config("global:\n  batch_size: many\n", &cwd()).unwrap_err();
        match err {
            Error::ConfigParse { canonical, legacy } => {
                assert!(canonical.contains("invalid type"), "{canonical}");
                assert!(legacy.contains("requires both owner and repo"), "{legacy}");
            }
            other => panic!("expected ConfigParse, got {other:?}"),
        }
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let content = "owner: acme\nrepo: widgets\n";
        assert_eq!(
            resolve_config(content, &cwd()).unwrap(),
            resolve_config(content, &cwd()).unwrap()
        );
    }
}
