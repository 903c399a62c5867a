//! Remote-to-local issue synchronization.
//!
//! - **Engine**: fetch each project's listing, normalize it, upsert by id
//! - **Hashing**: SHA256 digest over mutable fields for change detection
//! - **Reports**: per-project counts and per-issue errors
//!
//! # Failure isolation
//!
//! A fetch failure fails one project and is reported alongside the others.
//! A malformed issue fails only itself. Each upsert commits on its own, so
//! an interrupted sync leaves a row-consistent store.
//!
//! # Example
//!
//! ```ignore
//! let config = isync::config::load_config(&cwd)?;
//! let client = GitHubClient::new()?;
//! let report = SyncEngine::new(&config, &client).sync_all(None)?;
//! ```

mod engine;
mod hash;
mod types;

pub use engine::{normalize, SyncEngine};
pub use hash::{content_hash, sync_hash};
pub use types::{ItemError, ProjectFailure, ProjectSyncReport, SyncReport};
