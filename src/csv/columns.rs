//! Static column table for the bulk exchange format.
//!
//! Each column pairs its header name with a typed getter and setter on
//! [`Issue`]. Zero numbers and absent timestamps render as empty strings;
//! values that fail to parse fall back to the zero value.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::model::{Issue, STATE_OPEN};

/// One exchange-format column.
pub struct Column {
    pub name: &'static str,
    get: fn(&Issue) -> String,
    set: fn(&mut Issue, &str),
}

impl Column {
    #[must_use]
    pub fn get(&self, issue: &Issue) -> String {
        (self.get)(issue)
    }

    pub fn set(&self, issue: &mut Issue, value: &str) {
        (self.set)(issue, value);
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column").field("name", &self.name).finish()
    }
}

/// The canonical columns, in output order.
pub static COLUMNS: [Column; 15] = [
    Column {
        name: "id",
        get: |i| int_field(i.id),
        set: |i, v| i.id = parse_int("id", v),
    },
    Column {
        name: "title",
        get: |i| i.title.clone(),
        set: |i, v| i.title = v.to_string(),
    },
    Column {
        name: "state",
        get: |i| i.state.clone(),
        set: |i, v| {
            let v = v.trim();
            i.state = if v.is_empty() { STATE_OPEN } else { v }.to_string();
        },
    },
    Column {
        name: "priority",
        get: |i| i.priority.clone(),
        set: |i, v| i.priority = v.trim().to_string(),
    },
    Column {
        name: "labels",
        get: |i| i.labels.join(","),
        set: |i, v| i.labels = split_list(v).map(String::from).collect(),
    },
    Column {
        name: "assignee",
        get: |i| i.assignees.join(","),
        set: |i, v| i.assignees = split_list(v).map(String::from).collect(),
    },
    Column {
        name: "milestone",
        get: |i| i.milestone.clone(),
        set: |i, v| i.milestone = v.trim().to_string(),
    },
    Column {
        name: "created_at",
        get: |i| timestamp_field(i.created_at),
        set: |i, v| i.created_at = parse_timestamp("created_at", v),
    },
    Column {
        name: "updated_at",
        get: |i| timestamp_field(i.updated_at),
        set: |i, v| i.updated_at = parse_timestamp("updated_at", v),
    },
    Column {
        name: "body",
        get: |i| i.body.clone(),
        set: |i, v| i.body = v.to_string(),
    },
    Column {
        name: "estimated_hours",
        get: |i| {
            if i.estimated_hours == 0.0 {
                String::new()
            } else {
                i.estimated_hours.to_string()
            }
        },
        set: |i, v| {
            i.estimated_hours = v
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|h| h.is_finite())
                .unwrap_or_else(|| {
                    log_fallback("estimated_hours", v);
                    0.0
                });
        },
    },
    Column {
        name: "story_points",
        get: |i| int_field(i.story_points),
        set: |i, v| i.story_points = parse_int("story_points", v),
    },
    Column {
        name: "epic",
        get: |i| i.epic.clone(),
        set: |i, v| i.epic = v.trim().to_string(),
    },
    Column {
        name: "dependencies",
        get: |i| {
            i.dependencies
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        },
        set: |i, v| {
            i.dependencies = split_list(v).filter_map(|t| t.parse().ok()).collect();
        },
    },
    Column {
        name: "acceptance_criteria",
        get: |i| i.acceptance_criteria.clone(),
        set: |i, v| i.acceptance_criteria = v.to_string(),
    },
];

/// Look up a column by header name, ignoring case and surrounding space.
#[must_use]
pub fn column(name: &str) -> Option<&'static Column> {
    let name = name.trim();
    COLUMNS.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

/// Split a comma-joined field, trimming tokens and dropping empty ones.
fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|t| !t.is_empty())
}

fn int_field(value: i64) -> String {
    if value == 0 {
        String::new()
    } else {
        value.to_string()
    }
}

fn timestamp_field(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(String::new, |t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn parse_int(column: &str, value: &str) -> i64 {
    value.trim().parse().unwrap_or_else(|_| {
        log_fallback(column, value);
        0
    })
}

fn parse_timestamp(column: &str, value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value.trim()) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(_) => {
            log_fallback(column, value);
            None
        }
    }
}

fn log_fallback(column: &str, value: &str) {
    if !value.trim().is_empty() {
        debug!(column, value, "Unparseable value, using zero value");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        assert_eq!(column(" Title ").map(|c| c.name), Some("title"));
        assert!(column("assignees").is_none());
    }

    #[test]
    fn test_zero_values_render_empty() {
        let issue = Issue::default();
        for name in ["id", "estimated_hours", "story_points", "created_at", "updated_at"] {
            assert_eq!(column(name).unwrap().get(&issue), "", "{name}");
        }
    }

    #[test]
    fn test_lenient_scalars_fall_back_to_zero() {
        let mut issue = Issue::default();
        column("id").unwrap().set(&mut issue, "abc");
        column("estimated_hours").unwrap().set(&mut issue, "two");
        column("created_at").unwrap().set(&mut issue, "2024-13-45");
        assert_eq!(issue.id, 0);
        assert_eq!(issue.estimated_hours, 0.0);
        assert!(issue.created_at.is_none());
    }

    #[test]
    fn test_dependencies_skip_non_numeric_tokens() {
        let mut issue = Issue::default();
        column("dependencies").unwrap().set(&mut issue, " 12, x ,,7 ");
        assert_eq!(issue.dependencies, vec![12, 7]);
        assert_eq!(column("dependencies").unwrap().get(&issue), "12,7");
    }

    #[test]
    fn test_title_is_stored_verbatim() {
        let mut issue = Issue::default();
        column("title").unwrap().set(&mut issue, "  padded title ");
        assert_eq!(issue.title, "  padded title ");
        assert_eq!(column("title").unwrap().get(&issue), "  padded title ");
    }

    #[test]
    fn test_timestamps_keep_fractional_seconds() {
        let mut issue = Issue::default();
        column("updated_at").unwrap().set(&mut issue, "2024-03-01T09:00:00.250Z");
        assert_eq!(
            column("updated_at").unwrap().get(&issue),
            "2024-03-01T09:00:00.250Z"
        );
    }

    #[test]
    fn test_blank_state_defaults_to_open() {
        let mut issue = Issue::default();
        column("state").unwrap().set(&mut issue, "  ");
        assert_eq!(issue.state, "open");
    }
}
