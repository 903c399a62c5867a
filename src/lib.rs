//! issuesync - offline issue cache and bulk CSV editing for remote trackers
//!
//! This crate provides the core functionality for the `isync` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Configuration file discovery and resolution
//! - [`model`] - Data types (Issue, Project)
//! - [`storage`] - SQLite store, schema upgrade and writer lock
//! - [`remote`] - Remote issue source trait and the GitHub client
//! - [`sync`] - Fetch, normalize and upsert into the store
//! - [`csv`] - Exchange-format reader and writer
//! - [`bulk`] - Import and export between files, the store and the tracker
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bulk;
pub mod cli;
pub mod config;
pub mod csv;
pub mod error;
pub mod file;
pub mod model;
pub mod remote;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
