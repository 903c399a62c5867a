//! Issue model shared by the store, the sync engine and the CSV codec.
//!
//! Numeric fields use `0` and timestamps use `None` as their zero value;
//! the CSV codec renders both as empty strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conventional open state.
pub const STATE_OPEN: &str = "open";

/// A tracked issue.
///
/// `id` is the stable remote identifier; `number` is the display ordinal
/// shown by the tracker. Labels and assignees keep source order and are not
/// deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: i64,
    pub number: i64,
    pub title: String,
    pub body: String,
    pub state: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,

    /// Last local edit (CSV import into the store); cleared by remote sync.
    pub local_modified_at: Option<DateTime<Utc>>,

    /// Content digest over the mutable fields, see `sync::sync_hash`.
    pub sync_hash: Option<String>,

    // Planning fields carried by the bulk exchange format.
    pub priority: String,
    pub milestone: String,
    pub estimated_hours: f64,
    pub story_points: i64,
    pub epic: String,
    pub dependencies: Vec<i64>,
    pub acceptance_criteria: String,
}

impl Issue {
    /// Create an open issue with just a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            state: STATE_OPEN.to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_issue_defaults() {
        let issue = Issue::new("Fix bug");
        assert_eq!(issue.title, "Fix bug");
        assert_eq!(issue.state, STATE_OPEN);
        assert_eq!(issue.id, 0);
        assert!(issue.created_at.is_none());
    }
}
