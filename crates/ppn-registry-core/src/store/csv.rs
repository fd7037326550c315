//! CSV reading and writing for the backing store.
//!
//! UTF-8, `\n` line terminator, RFC 4180 quoting. An unquoted empty cell reads
//! as [`RawValue::Missing`]; blank and whitespace-only lines are skipped.

use std::borrow::Cow;

use thiserror::Error;

use crate::models::{Column, Dataset, TreatmentRecord};
use crate::schema::{RawTable, RawValue};

/// Reasons a store file cannot be read as a table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CsvError {
    #[error("No columns to parse from file")]
    Empty,

    #[error("Unterminated quoted field starting on line {line}")]
    UnterminatedQuote { line: usize },

    #[error("Expected {expected} fields on line {line}, saw {found}")]
    TooManyFields {
        line: usize,
        expected: usize,
        found: usize,
    },
}

pub type CsvResult<T> = Result<T, CsvError>;

struct Cell {
    text: String,
    quoted: bool,
}

impl Cell {
    fn into_raw(self) -> RawValue {
        if self.text.is_empty() && !self.quoted {
            RawValue::Missing
        } else {
            RawValue::Text(self.text)
        }
    }
}

/// A parsed row and the line it started on.
struct Row {
    line: usize,
    cells: Vec<Cell>,
}

/// Parse store text into a raw table. The first non-blank row is the header.
pub fn parse(text: &str) -> CsvResult<RawTable> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows = parse_rows(text)?.into_iter();

    let header = rows.next().ok_or(CsvError::Empty)?;
    let headers: Vec<String> = header
        .cells
        .into_iter()
        .map(|cell| cell.text.trim().to_string())
        .collect();

    let mut data = Vec::new();
    for row in rows {
        if row.cells.len() > headers.len() {
            return Err(CsvError::TooManyFields {
                line: row.line,
                expected: headers.len(),
                found: row.cells.len(),
            });
        }
        data.push(row.cells.into_iter().map(Cell::into_raw).collect());
    }

    Ok(RawTable::from_rows(headers, data))
}

fn parse_rows(text: &str) -> CsvResult<Vec<Row>> {
    let mut rows = Vec::new();
    let mut cells = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut row_started = false;
    let mut line = 1;
    let mut row_line = 1;
    let mut quote_line = 1;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
                row_started = true;
                quote_line = line;
            }
            ',' => {
                cells.push(Cell {
                    text: std::mem::take(&mut field),
                    quoted,
                });
                quoted = false;
                row_started = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                if row_started && !is_blank_line(&cells, &field, quoted) {
                    cells.push(Cell {
                        text: std::mem::take(&mut field),
                        quoted,
                    });
                    rows.push(Row {
                        line: row_line,
                        cells: std::mem::take(&mut cells),
                    });
                }
                field.clear();
                quoted = false;
                row_started = false;
                line += 1;
                row_line = line;
            }
            _ => {
                field.push(c);
                row_started = true;
            }
        }
    }

    if in_quotes {
        return Err(CsvError::UnterminatedQuote { line: quote_line });
    }
    if row_started && !is_blank_line(&cells, &field, quoted) {
        cells.push(Cell {
            text: field,
            quoted,
        });
        rows.push(Row {
            line: row_line,
            cells,
        });
    }

    Ok(rows)
}

/// A line of nothing but spaces or tabs, with no delimiter or quotes.
fn is_blank_line(cells: &[Cell], field: &str, quoted: bool) -> bool {
    cells.is_empty() && !quoted && field.trim().is_empty()
}

/// Quote a field if it contains a delimiter, quote or line break.
pub fn escape_field(s: &str) -> Cow<'_, str> {
    if s.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}

/// One data row in canonical column order, with trailing `\n`.
pub fn format_row(record: &TreatmentRecord) -> String {
    let mut row = record
        .fields()
        .map(|field| escape_field(&field).into_owned())
        .collect::<Vec<_>>()
        .join(",");
    row.push('\n');
    row
}

/// Header row plus every record, in store format.
pub fn format_table(dataset: &Dataset) -> String {
    let mut out = Column::header_row();
    out.push('\n');
    for record in dataset {
        out.push_str(&format_row(record));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_escaping() {
        assert_eq!(escape_field("simple"), "simple");
        assert_eq!(escape_field("with,comma"), "\"with,comma\"");
        assert_eq!(escape_field("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_parse_quoted_fields() {
        let text = "A,B,C\n\"x, y\",\"say \"\"hi\"\"\",\"multi\nline\"\n";
        let table = parse(text).unwrap();

        assert_eq!(table.row_count(), 1);
        let cols = table.columns();
        assert_eq!(cols[0].values[0], RawValue::Text("x, y".into()));
        assert_eq!(cols[1].values[0], RawValue::Text("say \"hi\"".into()));
        assert_eq!(cols[2].values[0], RawValue::Text("multi\nline".into()));
    }

    #[test]
    fn test_parse_empty_cells_are_missing() {
        let table = parse("A,B,C\n1,,\"\"\n").unwrap();
        let cols = table.columns();
        assert_eq!(cols[0].values[0], RawValue::Text("1".into()));
        assert_eq!(cols[1].values[0], RawValue::Missing);
        assert_eq!(cols[2].values[0], RawValue::Text(String::new()));
    }

    #[test]
    fn test_parse_crlf_and_blank_lines() {
        let table = parse("A,B\r\n1,2\r\n\r\n3,4\r\n").unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns()[1].values[1], RawValue::Text("4".into()));
    }

    #[test]
    fn test_whitespace_only_lines_are_skipped() {
        let table = parse("A,B\n1,2\n   \n\t\n3,4\n  ").unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns()[0].values[1], RawValue::Text("3".into()));
        assert_eq!(parse("  \n\t\n").unwrap_err(), CsvError::Empty);
    }

    #[test]
    fn test_parse_header_only() {
        let table = parse("A,B\n").unwrap();
        assert_eq!(table.columns().len(), 2);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("").unwrap_err(), CsvError::Empty);
        assert_eq!(parse("\n\n").unwrap_err(), CsvError::Empty);
        assert_eq!(
            parse("A,B\n\"open,2\n").unwrap_err(),
            CsvError::UnterminatedQuote { line: 2 }
        );
        assert_eq!(
            parse("A,B\n1,2\n1,2,3\n").unwrap_err(),
            CsvError::TooManyFields {
                line: 3,
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = parse("A,B,C\n1\n").unwrap();
        assert_eq!(table.columns()[2].values[0], RawValue::Missing);
    }

    #[test]
    fn test_format_row_canonical_order() {
        let record = TreatmentRecord {
            practitioner_name: "Dr. A. Smith".into(),
            client_id: "P-1024".into(),
            treatment_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 5),
            patient_age: 34,
            patient_sex: "F".into(),
            focus_area: "PTSD".into(),
            chemical_used: "Ketamine".into(),
            dosage_mg: 85,
            intake_form: "Injected".into(),
            protocol_description: "Guided imagery, integration".into(),
            treatment_outcome_rating: 4,
            detailed_results: String::new(),
            next_steps: "Follow up in 2 weeks.".into(),
        };

        assert_eq!(
            format_row(&record),
            "Dr. A. Smith,P-1024,2024-01-05,34,F,PTSD,Ketamine,85,Injected,\
             \"Guided imagery, integration\",4,,Follow up in 2 weeks.\n"
        );
    }

    #[test]
    fn test_format_table_has_single_header() {
        let ds: Dataset = vec![TreatmentRecord::default(), TreatmentRecord::default()].into();
        let text = format_table(&ds);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], Column::header_row());
    }
}
