//! Raw tabular input and its normalization into the canonical record shape.
//!
//! Pipeline: Raw table (any columns, any value types) → Normalization → Dataset

mod normalizer;

pub use normalizer::*;

/// A cell value of unknown type, as handed over by a reader.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Empty or absent cell
    Missing,
    Text(String),
    Integer(i64),
    Float(f64),
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<i64> for RawValue {
    fn from(i: i64) -> Self {
        RawValue::Integer(i)
    }
}

impl From<f64> for RawValue {
    fn from(f: f64) -> Self {
        RawValue::Float(f)
    }
}

/// One named column of raw values.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub values: Vec<RawValue>,
}

/// Column-major raw input: an arbitrary subset of columns in arbitrary order.
///
/// Columns may differ in length; short columns read as missing past their end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<RawColumn>,
}

impl RawTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column append.
    pub fn with_column<V: Into<RawValue>>(mut self, name: &str, values: Vec<V>) -> Self {
        self.push_column(name, values.into_iter().map(Into::into).collect());
        self
    }

    pub fn push_column(&mut self, name: &str, values: Vec<RawValue>) {
        self.columns.push(RawColumn {
            name: name.to_string(),
            values,
        });
    }

    /// Build from a header plus row-major values (the shape a CSV reader yields).
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<RawValue>>) -> Self {
        let mut columns: Vec<RawColumn> = headers
            .into_iter()
            .map(|name| RawColumn {
                name,
                values: Vec::with_capacity(rows.len()),
            })
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.values.push(cells.next().unwrap_or(RawValue::Missing));
            }
        }

        Self { columns }
    }

    pub fn columns(&self) -> &[RawColumn] {
        &self.columns
    }

    /// Number of rows: the length of the longest column.
    pub fn row_count(&self) -> usize {
        self.columns.iter().map(|c| c.values.len()).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_pads_short_rows() {
        let table = RawTable::from_rows(
            vec!["A".into(), "B".into()],
            vec![vec!["1".into()], vec!["2".into(), "3".into()]],
        );

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns()[1].values[0], RawValue::Missing);
        assert_eq!(table.columns()[1].values[1], RawValue::Text("3".into()));
    }

    #[test]
    fn test_row_count_uses_longest_column() {
        let table = RawTable::new()
            .with_column("A", vec![1i64])
            .with_column("B", vec!["x", "y", "z"]);
        assert_eq!(table.row_count(), 3);
    }
}
