//! Tabular output.

use indexmap::IndexMap;
use serde::Serialize;

/// A table extracted from device output.
///
/// Every row has exactly as many cells as there are headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, padding or truncating rows to the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a header, compared case-insensitively.
    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(header))
    }

    /// Cell at `row` under `header`.
    pub fn get(&self, row: usize, header: &str) -> Option<&str> {
        let column = self.column(header)?;
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
    }

    /// Rows as ordered header → cell maps.
    pub fn records(&self) -> Vec<IndexMap<String, String>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_row_width() {
        let table = Table::new(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into()], vec!["1".into(), "2".into(), "3".into()]],
        );
        assert_eq!(table.rows()[0], vec!["1", ""]);
        assert_eq!(table.rows()[1], vec!["1", "2"]);
    }

    #[test]
    fn test_column_lookup_ignores_case() {
        let table = Table::new(vec!["OnuIndex".into()], vec![vec!["1/1/1:1".into()]]);
        assert_eq!(table.column("onuindex"), Some(0));
        assert_eq!(table.get(0, "ONUINDEX"), Some("1/1/1:1"));
        assert_eq!(table.get(1, "OnuIndex"), None);
    }
}
