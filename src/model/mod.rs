//! Data models for issuesync.
//!
//! This module contains the domain models shared by the store, the sync
//! engine, and the CSV codec:
//! - Issue
//! - Project

pub mod issue;
pub mod project;

pub use issue::{Issue, STATE_OPEN};
pub use project::{parse_project_key, NewProject, Project, ProjectUpdate};
