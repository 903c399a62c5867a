//! Content hashing for change detection.
//!
//! The sync hash is a SHA-256 over the serialized JSON of an issue's
//! mutable fields. Identity, local bookkeeping and the planning fields of
//! the exchange format are not part of it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::model::Issue;

/// The fields covered by the sync hash, in a fixed order.
#[derive(Serialize)]
struct HashedFields<'a> {
    title: &'a str,
    body: &'a str,
    state: &'a str,
    labels: &'a [String],
    assignees: &'a [String],
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
}

/// Compute a SHA256 hash of a serializable value.
///
/// # Errors
///
/// Returns a JSON error if the value cannot be serialized.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest over an issue's mutable fields.
///
/// # Errors
///
/// Returns a JSON error if the fields cannot be serialized.
pub fn sync_hash(issue: &Issue) -> Result<String> {
    content_hash(&HashedFields {
        title: &issue.title,
        body: &issue.body,
        state: &issue.state,
        labels: &issue.labels,
        assignees: &issue.assignees,
        created_at: issue.created_at,
        updated_at: issue.updated_at,
        closed_at: issue.closed_at,
    })
}
