//! Property-based tests for the exchange format.

use isync::csv::{parse, validate_bytes, write};
use isync::error::{CsvFormatError, Error};
use isync::model::Issue;
use proptest::prelude::*;
use tempfile::TempDir;

/// Header names that never match the required column.
fn arb_other_column() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z_]{1,10}")
        .unwrap()
        .prop_filter("not the title column", |name| name != "title")
}

/// Spellings of the title header that must be recognized.
fn arb_title_header() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("title"), Just("Title"), Just(" TITLE ")]
}

/// Header row with an optional title column at a random position.
fn arb_header() -> impl Strategy<Value = (Vec<String>, bool)> {
    (
        prop::collection::vec(arb_other_column(), 0..5),
        prop::option::of(arb_title_header()),
        any::<prop::sample::Index>(),
    )
        .prop_filter("at least one column", |(others, title, _)| {
            !others.is_empty() || title.is_some()
        })
        .prop_map(|(mut header, title, at)| {
            let has_title = title.is_some();
            if let Some(title) = title {
                let at = at.index(header.len() + 1);
                header.insert(at, title.to_string());
            }
            (header, has_title)
        })
}

fn table(header: &[String], rows: usize) -> Vec<Vec<String>> {
    (0..rows)
        .map(|r| (0..header.len()).map(|c| format!("v{r}x{c}")).collect())
        .collect()
}

fn render_table(header: &[String], rows: &[Vec<String>]) -> String {
    let mut text = header.join(",");
    text.push('\n');
    for row in rows {
        text.push_str(&row.join(","));
        text.push('\n');
    }
    text
}

/// Titles with delimiters, quotes and line breaks, never blank. CRLF is
/// excluded because it reads back as LF.
fn arb_title() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 ,\"\r\n]{1,30}")
        .unwrap()
        .prop_filter("non-blank title without CRLF", |t| {
            !t.trim().is_empty() && !t.contains("\r\n")
        })
}

fn arb_issue() -> impl Strategy<Value = Issue> {
    (
        0i64..1_000_000,
        arb_title(),
        prop::string::string_regex("[a-zA-Z0-9 ,\"\n]{0,40}").unwrap(),
        prop::collection::vec(prop::string::string_regex("[a-z]{1,8}").unwrap(), 0..4),
        -1_000i64..1_000,
    )
        .prop_map(|(id, title, body, labels, story_points)| Issue {
            id,
            body,
            labels,
            story_points,
            ..Issue::new(title)
        })
}

proptest! {
    /// A file with a title column and uniform rows validates, and the
    /// summary echoes the header and row count.
    #[test]
    fn test_validate_accepts_uniform_tables_with_title(
        (header, has_title) in arb_header(),
        rows in 1usize..6,
    ) {
        let text = render_table(&header, &table(&header, rows));
        let result = validate_bytes(text.as_bytes());

        if has_title {
            let summary = result.unwrap();
            prop_assert_eq!(summary.rows, rows);
            prop_assert_eq!(summary.columns, header);
        } else {
            prop_assert!(matches!(
                result,
                Err(Error::CsvFormat(CsvFormatError::MissingColumn(ref c))) if c == "title"
            ));
        }
    }

    /// Dropping one cell from any row is reported against that row's line.
    #[test]
    fn test_validate_reports_ragged_row(
        (header, has_title) in arb_header(),
        rows in 1usize..6,
        short in any::<prop::sample::Index>(),
    ) {
        prop_assume!(has_title && header.len() > 1);
        let mut cells = table(&header, rows);
        let short = short.index(rows);
        cells[short].pop();

        let result = validate_bytes(render_table(&header, &cells).as_bytes());
        let expected_line = short + 2;
        let expected_columns = header.len();
        prop_assert!(matches!(
            result,
            Err(Error::CsvFormat(CsvFormatError::ColumnCountMismatch { line, expected, found }))
                if line == expected_line && expected == expected_columns && found == expected - 1
        ), "unexpected result: {:?}", result);
    }

    /// Writing issues and parsing the file back preserves what the
    /// columns carry.
    #[test]
    fn test_write_then_parse_preserves_issues(
        issues in prop::collection::vec(arb_issue(), 1..6),
    ) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("issues.csv");
        write(&issues, &path, Some(&["id", "title", "body", "labels", "story_points"])).unwrap();
        let parsed = parse(&path).unwrap();

        prop_assert_eq!(parsed.len(), issues.len());
        for (before, after) in issues.iter().zip(&parsed) {
            prop_assert_eq!(before.id, after.id);
            prop_assert_eq!(&before.title, &after.title);
            prop_assert_eq!(&before.body, &after.body);
            prop_assert_eq!(&before.labels, &after.labels);
            prop_assert_eq!(before.story_points, after.story_points);
        }
    }
}
