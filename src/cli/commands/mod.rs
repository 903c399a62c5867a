//! Command implementations.

pub mod completions;
pub mod csv;
pub mod init;
pub mod migrate;
pub mod project;
pub mod sync;
pub mod version;
