//! Error types for issuesync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Retryability flags for scripted callers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for issuesync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    DatabaseError,
    StoreLocked,

    // Not Found (exit 3)
    ProjectNotFound,

    // Validation (exit 4)
    InvalidArgument,
    DuplicateProject,
    CsvFormatError,
    RowParseError,

    // Remote (exit 5)
    CredentialError,
    RemoteAccessError,
    RemoteApiError,

    // Sync (exit 6)
    SyncError,

    // Config (exit 7)
    ConfigNotFound,
    ConfigParseError,
    InvalidConfig,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::StoreLocked => "STORE_LOCKED",
            Self::ProjectNotFound => "PROJECT_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DuplicateProject => "DUPLICATE_PROJECT",
            Self::CsvFormatError => "CSV_FORMAT_ERROR",
            Self::RowParseError => "ROW_PARSE_ERROR",
            Self::CredentialError => "CREDENTIAL_ERROR",
            Self::RemoteAccessError => "REMOTE_ACCESS_ERROR",
            Self::RemoteApiError => "REMOTE_API_ERROR",
            Self::SyncError => "SYNC_ERROR",
            Self::ConfigNotFound => "CONFIG_NOT_FOUND",
            Self::ConfigParseError => "CONFIG_PARSE_ERROR",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::DatabaseError | Self::StoreLocked => 2,
            Self::ProjectNotFound => 3,
            Self::InvalidArgument
            | Self::DuplicateProject
            | Self::CsvFormatError
            | Self::RowParseError => 4,
            Self::CredentialError | Self::RemoteAccessError | Self::RemoteApiError => 5,
            Self::SyncError => 6,
            Self::ConfigNotFound | Self::ConfigParseError | Self::InvalidConfig => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying the same call could succeed without changing input.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreLocked | Self::RemoteAccessError | Self::RemoteApiError | Self::SyncError
        )
    }
}

// ── CSV structural errors ─────────────────────────────────────

/// Structural problems with a bulk exchange file.
///
/// These are detected before any row is interpreted, so nothing has been
/// mutated when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CsvFormatError {
    #[error("file is empty")]
    EmptyFile,

    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("line {line}: expected {expected} fields, found {found}")]
    ColumnCountMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("file has a header but no data rows")]
    NoDataRows,

    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("file is not valid UTF-8")]
    NotUtf8,
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in issuesync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("No configuration file found in {dir} (looked for: {})", tried.join(", "))]
    ConfigNotFound { dir: PathBuf, tried: Vec<String> },

    #[error("Could not parse configuration: canonical schema: {canonical}; legacy schema: {legacy}")]
    ConfigParse { canonical: String, legacy: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Credential error: {message}")]
    Credential {
        message: String,
        status: Option<u16>,
        remediation: String,
    },

    #[error("Remote access error: {0}")]
    RemoteAccess(String),

    #[error("Remote API error (HTTP {status}): {message}")]
    RemoteApi { status: u16, message: String },

    #[error("CSV format error: {0}")]
    CsvFormat(#[from] CsvFormatError),

    #[error("Row parse error at line {line}: {message}")]
    RowParse { line: usize, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Project already exists: {owner}/{repo}")]
    DuplicateProject { owner: String, repo: String },

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Sync failed for {project}: {source}")]
    ProjectSync {
        project: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{failed} of {total} projects failed to sync")]
    SyncFailed { failed: usize, total: usize },

    #[error("Store is locked by another writer: {}", path.display())]
    StoreLocked { path: PathBuf },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Self::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Self::InvalidConfig(_) => ErrorCode::InvalidConfig,
            Self::Credential { .. } => ErrorCode::CredentialError,
            Self::RemoteAccess(_) => ErrorCode::RemoteAccessError,
            Self::RemoteApi { .. } => ErrorCode::RemoteApiError,
            Self::CsvFormat(_) => ErrorCode::CsvFormatError,
            Self::RowParse { .. } => ErrorCode::RowParseError,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::DuplicateProject { .. } => ErrorCode::DuplicateProject,
            Self::ProjectNotFound(_) => ErrorCode::ProjectNotFound,
            Self::ProjectSync { .. } | Self::SyncFailed { .. } => ErrorCode::SyncError,
            Self::StoreLocked { .. } => ErrorCode::StoreLocked,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// HTTP status carried by remote failures, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Credential { status, .. } => *status,
            Self::RemoteApi { status, .. } => Some(*status),
            Self::ProjectSync { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::ConfigNotFound { .. } => Some(
                "Run `isync init --owner <owner> --repo <repo>` to create a configuration"
                    .to_string(),
            ),

            Self::InvalidConfig(_) => Some(
                "Every project needs a non-empty `owner` and `repo` in the configuration file"
                    .to_string(),
            ),

            Self::Credential { remediation, .. } => Some(remediation.clone()),

            Self::RemoteApi { status: 404, .. } => Some(
                "Check the owner/repo spelling and that the token can see the repository"
                    .to_string(),
            ),
            Self::RemoteApi { status: 403 | 429, .. } => {
                Some("The tracker is rate limiting requests; retry later".to_string())
            }

            Self::CsvFormat(CsvFormatError::MissingColumn(column)) => Some(format!(
                "Add a `{column}` column to the header row (matching is case-insensitive)"
            )),

            Self::DuplicateProject { owner, repo } => Some(format!(
                "Use `isync project update {owner}/{repo}` to change an existing project"
            )),

            Self::ProjectNotFound(_) => {
                Some("Use `isync project list` to see registered projects.".to_string())
            }

            Self::StoreLocked { .. } => Some(
                "Another isync process is writing to this store; wait for it to finish"
                    .to_string(),
            ),

            Self::ProjectSync { source, .. } => source.hint(),
            Self::SyncFailed { .. } => {
                Some("Re-run with --json or -v to see each project's error".to_string())
            }

            _ => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(status) = self.status() {
            obj["error"]["status"] = serde_json::Value::from(status);
        }
        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
