// Query results
// A ResultSet is what a read statement hands back: column metadata plus the
// rows that matched, snapshotted when the statement completed

use crate::storage::{DataType, Row, Value};
use serde::Serialize;
use std::fmt;

/// Name and type of one result column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// The rows returned by a read statement
///
/// The rows are owned by the result set, so later writes to the table are not
/// visible through it and `rows()` can be called any number of times.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    columns: Vec<ColumnInfo>,
    rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Iterate the rows, in the order the store produced them
    pub fn rows(&self) -> Rows<'_> {
        Rows {
            inner: self.rows.iter(),
        }
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as `{"columns": [...], "rows": [[...], ...]}` for notebook display
    pub fn to_json(&self) -> serde_json::Value {
        let rows: Vec<&Vec<Value>> = self.rows.iter().map(|r| &r.values).collect();
        serde_json::json!({
            "columns": self.columns,
            "rows": rows,
        })
    }

    /// Format as a box-drawn table
    pub fn format(&self) -> String {
        if self.rows.is_empty() {
            return "No rows found".to_string();
        }

        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.values.iter().map(|v| v.to_string()).collect())
            .collect();

        // Calculate column widths
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.name.chars().count()).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }

        let border = |left: &str, mid: &str, right: &str| {
            let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("{}{}{}\n", left, segments.join(mid), right)
        };

        let line = |values: &[String]| {
            let mut out = String::from("│");
            for (value, width) in values.iter().zip(&widths) {
                out.push_str(&format!(" {:<width$} │", value, width = *width));
            }
            out.push('\n');
            out
        };

        let header: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();

        let mut result = String::new();
        result.push_str(&border("┌", "┬", "┐"));
        result.push_str(&line(&header));
        result.push_str(&border("├", "┼", "┤"));
        for row in &cells {
            result.push_str(&line(row));
        }
        result.push_str(&border("└", "┴", "┘"));
        result.push_str(&format!("\n{} row(s) returned", self.rows.len()));

        result
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

/// Iterator returned by [`ResultSet::rows`]
#[derive(Debug, Clone)]
pub struct Rows<'a> {
    inner: std::slice::Iter<'a, Row>,
}

impl<'a> Iterator for Rows<'a> {
    type Item = &'a Row;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Rows<'_> {}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = Rows<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows()
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// The outcome of one statement
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Rows returned from a read statement
    Rows(ResultSet),
    /// A message (for CREATE, DROP, INSERT, UPDATE, DELETE)
    Message(String),
}

impl QueryResult {
    pub fn format(&self) -> String {
        match self {
            QueryResult::Message(msg) => msg.clone(),
            QueryResult::Rows(result_set) => result_set.format(),
        }
    }

    pub fn result_set(&self) -> Option<&ResultSet> {
        match self {
            QueryResult::Rows(result_set) => Some(result_set),
            QueryResult::Message(_) => None,
        }
    }

    pub fn into_result_set(self) -> Option<ResultSet> {
        match self {
            QueryResult::Rows(result_set) => Some(result_set),
            QueryResult::Message(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultSet {
        ResultSet::new(
            vec![
                ColumnInfo::new("features", DataType::Float),
                ColumnInfo::new("label", DataType::Integer),
            ],
            vec![
                Row::new(vec![Value::Float(1.0), Value::Integer(0)]),
                Row::new(vec![Value::Float(2.0), Value::Integer(1)]),
            ],
        )
    }

    #[test]
    fn test_rows_is_restartable() {
        let rs = sample();
        let first: Vec<&Row> = rs.rows().collect();
        let second: Vec<&Row> = rs.rows().collect();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(rs.rows().len(), 2);
    }

    #[test]
    fn test_format_table() {
        let rendered = sample().format();
        assert!(rendered.starts_with("┌──────────┬───────┐\n"));
        assert!(rendered.contains("│ features │ label │\n"));
        assert!(rendered.contains("│ 1.0      │ 0     │\n"));
        assert!(rendered.ends_with("2 row(s) returned"));
    }

    #[test]
    fn test_format_empty() {
        let rs = ResultSet::new(vec![ColumnInfo::new("label", DataType::Integer)], vec![]);
        assert_eq!(rs.format(), "No rows found");
        assert!(rs.is_empty());
    }

    #[test]
    fn test_to_json() {
        let json = sample().to_json();
        assert_eq!(json["columns"][0]["name"], "features");
        assert_eq!(json["columns"][1]["data_type"], "Integer");
        assert_eq!(json["rows"][0], serde_json::json!([1.0, 0]));
    }

    #[test]
    fn test_message_has_no_result_set() {
        let result = QueryResult::Message("Database 'e2e_1' created".to_string());
        assert!(result.result_set().is_none());
        assert!(result.into_result_set().is_none());
    }
}
