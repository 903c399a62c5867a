//! Record reader for the bulk exchange format.
//!
//! Comma separated, double-quote escaped, LF or CRLF terminated. Quoted
//! fields may span lines; a CRLF inside quotes reads as LF and a lone CR is
//! kept. Every record remembers the physical line it started on so that
//! errors can point at it.

use crate::error::CsvFormatError;

/// Leading UTF-8 byte-order mark.
const BOM: char = '\u{feff}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based line on which the record starts.
    pub line: usize,
    pub fields: Vec<String>,
}

/// Decode file bytes, rejecting empty and non-UTF-8 input and dropping a BOM.
pub fn decode(bytes: &[u8]) -> Result<&str, CsvFormatError> {
    if bytes.is_empty() {
        return Err(CsvFormatError::EmptyFile);
    }
    let text = std::str::from_utf8(bytes).map_err(|_| CsvFormatError::NotUtf8)?;
    Ok(text.strip_prefix(BOM).unwrap_or(text))
}

/// Split text into records. Blank lines are skipped.
pub fn read_records(text: &str) -> Result<Vec<Record>, CsvFormatError> {
    let mut reader = Reader::default();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if reader.in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    reader.field.push('"');
                }
                '"' => reader.in_quotes = false,
                '\r' if chars.peek() == Some(&'\n') => {}
                '\n' => {
                    reader.line += 1;
                    reader.field.push('\n');
                }
                _ => reader.field.push(c),
            }
            continue;
        }

        match c {
            '"' if reader.field.is_empty() => {
                reader.in_quotes = true;
                reader.quoted = true;
            }
            ',' => reader.end_field(),
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                reader.end_record();
                reader.line += 1;
                reader.start = reader.line;
            }
            _ => reader.field.push(c),
        }
    }

    if reader.in_quotes {
        return Err(CsvFormatError::Malformed {
            line: reader.start,
            message: "unterminated quoted field".to_string(),
        });
    }
    reader.end_record();
    Ok(reader.records)
}

struct Reader {
    records: Vec<Record>,
    fields: Vec<String>,
    field: String,
    in_quotes: bool,
    quoted: bool,
    line: usize,
    start: usize,
}

impl Default for Reader {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            fields: Vec::new(),
            field: String::new(),
            in_quotes: false,
            quoted: false,
            line: 1,
            start: 1,
        }
    }
}

impl Reader {
    fn end_field(&mut self) {
        self.fields.push(std::mem::take(&mut self.field));
    }

    fn end_record(&mut self) {
        self.end_field();
        let blank = !self.quoted && self.fields.len() == 1 && self.fields[0].trim().is_empty();
        let fields = std::mem::take(&mut self.fields);
        if !blank {
            self.records.push(Record {
                line: self.start,
                fields,
            });
        }
        self.quoted = false;
    }
}

/// Quote a field if it contains a delimiter, quote or line break.
#[must_use]
pub fn escape_field(value: &str) -> String {
    let needs_quoting = value.contains(',')
        || value.contains('"')
        || value.contains('\n')
        || value.contains('\r');

    if needs_quoting {
        let escaped = value.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(text: &str) -> Vec<Vec<String>> {
        read_records(text)
            .unwrap()
            .into_iter()
            .map(|r| r.fields)
            .collect()
    }

    #[test]
    fn test_quoted_fields_and_escaped_quotes() {
        let rows = fields("title,labels\n\"Say \"\"hi\"\"\",\"a,b\"\n");
        assert_eq!(rows[1], vec!["Say \"hi\"", "a,b"]);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let records = read_records("title,state\r\n\r\nOne,open\r\nTwo,\r\n").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].line, 3);
        assert_eq!(records[2].fields, vec!["Two", ""]);
    }

    #[test]
    fn test_multiline_field_keeps_start_line() {
        let records = read_records("title,body\nOne,\"line 1\r\nline 2\"\nTwo,x\n").unwrap();
        assert_eq!(records[1].fields[1], "line 1\nline 2");
        assert_eq!(records[1].line, 2);
        assert_eq!(records[2].line, 4);
    }

    #[test]
    fn test_lone_cr_in_quotes_is_kept() {
        let records = read_records("title\n\"cr\rinside\"\nnext\n").unwrap();
        assert_eq!(records[1].fields, vec!["cr\rinside"]);
        assert_eq!(records[2].line, 3);
    }

    #[test]
    fn test_unterminated_quote_is_malformed() {
        let err = read_records("title\n\"open quote\n").unwrap_err();
        assert!(matches!(err, CsvFormatError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_decode_strips_bom() {
        assert_eq!(decode("\u{feff}title\n".as_bytes()).unwrap(), "title\n");
        assert!(matches!(decode(b""), Err(CsvFormatError::EmptyFile)));
        assert!(matches!(decode(&[0xff, 0xfe, 0x00]), Err(CsvFormatError::NotUtf8)));
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }
}
