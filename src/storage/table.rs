// Table implementation
// A table combines schema, data (pages), and indexes

use super::{btree::BTreeIndex, page::PageManager, DataType, Row, Schema, Value};
use crate::error::{Result, SqlCellError};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Comparison operators allowed in a WHERE clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::LtEq => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::GtEq => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        };
        write!(f, "{}", symbol)
    }
}

/// A single-column condition: `column op value`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Filter {
    pub fn equals(column: impl Into<String>, value: Value) -> Self {
        Self {
            column: column.into(),
            op: CompareOp::Eq,
            value,
        }
    }

    /// SQL semantics: any comparison involving NULL is not true
    fn evaluate(&self, candidate: &Value) -> bool {
        candidate
            .compare(&self.value)
            .is_some_and(|ordering| self.op.accepts(ordering))
    }
}

/// Represents a database table
pub struct Table {
    pub name: String,
    pub schema: Schema,
    page_manager: PageManager,
    /// Indexes keyed by column name
    indexes: HashMap<String, BTreeIndex>,
}

impl Table {
    /// Create an empty table; the primary key column (if any) is indexed up front
    pub fn new(name: String, schema: Schema, rows_per_page: usize) -> Self {
        let mut indexes = HashMap::new();
        if let Some(pk_index) = schema.get_primary_key_index() {
            let pk_name = schema.columns[pk_index].name.clone();
            indexes.insert(pk_name.clone(), BTreeIndex::new(pk_name));
        }

        Self {
            name,
            schema,
            page_manager: PageManager::new(rows_per_page),
            indexes,
        }
    }

    /// Check a full row against the schema: arity, types, NOT NULL
    /// Returns the row with literals coerced to the column types
    pub fn prepare_row(&self, values: Vec<Value>) -> Result<Row> {
        if values.len() != self.schema.columns.len() {
            return Err(SqlCellError::schema(format!(
                "Expected {} values, got {}",
                self.schema.columns.len(),
                values.len()
            )));
        }

        let mut coerced = Vec::with_capacity(values.len());
        for (column, value) in self.schema.columns.iter().zip(values) {
            let value = value.coerce_to(&column.data_type).map_err(|e| {
                SqlCellError::type_mismatch(format!("column '{}': {}", column.name, e))
            })?;
            if value.is_null() && (!column.nullable || column.primary_key) {
                return Err(SqlCellError::Constraint(format!(
                    "column '{}' does not accept NULL",
                    column.name
                )));
            }
            coerced.push(value);
        }

        Ok(Row::new(coerced))
    }

    /// Insert a batch of rows atomically: every row is validated (including
    /// primary key uniqueness within the batch) before any row is stored
    pub fn insert_rows(&mut self, rows: Vec<Vec<Value>>) -> Result<usize> {
        let prepared = rows
            .into_iter()
            .map(|values| self.prepare_row(values))
            .collect::<Result<Vec<Row>>>()?;

        if let Some(pk_index) = self.schema.get_primary_key_index() {
            let mut seen = BTreeIndex::new(String::new());
            for (batch_pos, row) in prepared.iter().enumerate() {
                let pk_value = &row.values[pk_index];
                if self.pk_taken(pk_value) || seen.lookup(pk_value).is_some() {
                    return Err(SqlCellError::Constraint(format!(
                        "duplicate primary key value {} in '{}'",
                        pk_value, self.name
                    )));
                }
                seen.insert(pk_value.clone(), batch_pos);
            }
        }

        let count = prepared.len();
        for row in prepared {
            self.store(row);
        }

        debug!(table = %self.name, rows = count, "rows inserted");
        Ok(count)
    }

    fn pk_taken(&self, value: &Value) -> bool {
        let Some(pk_index) = self.schema.get_primary_key_index() else {
            return false;
        };
        let pk_name = &self.schema.columns[pk_index].name;
        self.indexes
            .get(pk_name)
            .and_then(|index| index.lookup(value))
            .is_some_and(|ids| !ids.is_empty())
    }

    fn store(&mut self, row: Row) -> usize {
        let row_id = self.page_manager.insert(row.clone());

        for (col_index, value) in row.values.into_iter().enumerate() {
            let col_name = &self.schema.columns[col_index].name;
            if let Some(index) = self.indexes.get_mut(col_name) {
                index.insert(value, row_id);
            }
        }

        row_id
    }

    /// Resolve a filter's column and check its value can be compared with it
    fn filter_column(&self, filter: &Filter) -> Result<usize> {
        let col_index = self
            .schema
            .get_column_index(&filter.column)
            .ok_or_else(|| SqlCellError::not_found("Column", filter.column.clone()))?;

        let data_type = self.schema.columns[col_index].data_type;
        let comparable = match (&filter.value, data_type) {
            (Value::Null, _) => true,
            (Value::Integer(_) | Value::Float(_), DataType::Integer | DataType::Float) => true,
            (Value::Text(_), DataType::Text) => true,
            (Value::Boolean(_), DataType::Boolean) => true,
            _ => false,
        };
        if !comparable {
            return Err(SqlCellError::type_mismatch(format!(
                "cannot compare {} column '{}' with {} value {}",
                data_type,
                filter.column,
                filter.value.type_name(),
                filter.value
            )));
        }

        Ok(col_index)
    }

    /// Ids of the rows matching `filter` (all live rows when None), in storage order
    pub fn matching_ids(&self, filter: Option<&Filter>) -> Result<Vec<usize>> {
        Ok(self.select(filter)?.map(|(id, _row)| id).collect())
    }

    /// Lazily iterate the rows matching `filter`, in storage order
    ///
    /// Equality filters on an indexed column go through the index; everything
    /// else is a full scan.
    pub fn select<'a>(
        &'a self,
        filter: Option<&'a Filter>,
    ) -> Result<Box<dyn Iterator<Item = (usize, &'a Row)> + 'a>> {
        let Some(filter) = filter else {
            return Ok(Box::new(self.page_manager.scan()));
        };

        let col_index = self.filter_column(filter)?;
        let col_name = &self.schema.columns[col_index].name;

        if filter.op == CompareOp::Eq {
            if let Some(index) = self.indexes.get(col_name) {
                let ids: Vec<usize> = index.lookup(&filter.value).cloned().unwrap_or_default();
                return Ok(Box::new(
                    ids.into_iter()
                        .filter_map(move |id| self.page_manager.get(id).map(|row| (id, row))),
                ));
            }
        }

        Ok(Box::new(
            self.page_manager
                .scan()
                .filter(move |(_id, row)| filter.evaluate(&row.values[col_index])),
        ))
    }

    /// Set `column = value` on every row matching `filter`
    /// Returns the number of rows updated
    pub fn update(&mut self, filter: &Filter, column: &str, value: Value) -> Result<usize> {
        let update_col_index = self
            .schema
            .get_column_index(column)
            .ok_or_else(|| SqlCellError::not_found("Column", column))?;
        let target = &self.schema.columns[update_col_index];
        let new_value = value
            .coerce_to(&target.data_type)
            .map_err(|e| SqlCellError::type_mismatch(format!("column '{}': {}", target.name, e)))?;
        if new_value.is_null() && (!target.nullable || target.primary_key) {
            return Err(SqlCellError::Constraint(format!(
                "column '{}' does not accept NULL",
                target.name
            )));
        }

        let row_ids = self.matching_ids(Some(filter))?;

        if target.primary_key && !row_ids.is_empty() {
            let others_hold_value = self
                .indexes
                .get(&target.name)
                .and_then(|index| index.lookup(&new_value))
                .is_some_and(|ids| ids.iter().any(|id| !row_ids.contains(id)));
            if row_ids.len() > 1 || others_hold_value {
                return Err(SqlCellError::Constraint(format!(
                    "duplicate primary key value {} in '{}'",
                    new_value, self.name
                )));
            }
        }

        let col_name = target.name.clone();
        for &row_id in &row_ids {
            if let Some(row) = self.page_manager.get_mut(row_id) {
                let old_value =
                    std::mem::replace(&mut row.values[update_col_index], new_value.clone());

                if let Some(index) = self.indexes.get_mut(&col_name) {
                    index.remove(&old_value, row_id);
                    index.insert(new_value.clone(), row_id);
                }
            }
        }

        debug!(table = %self.name, rows = row_ids.len(), "rows updated");
        Ok(row_ids.len())
    }

    /// Delete every row matching `filter`
    /// Returns the number of rows deleted
    pub fn delete(&mut self, filter: &Filter) -> Result<usize> {
        let row_ids = self.matching_ids(Some(filter))?;

        for &row_id in &row_ids {
            if let Some(row) = self.page_manager.delete(row_id) {
                for (col_idx, val) in row.values.iter().enumerate() {
                    let col_name = &self.schema.columns[col_idx].name;
                    if let Some(index) = self.indexes.get_mut(col_name) {
                        index.remove(val, row_id);
                    }
                }
            }
        }

        debug!(table = %self.name, rows = row_ids.len(), "rows deleted");
        Ok(row_ids.len())
    }

    /// Build an index over an existing column, back-filling current rows
    pub fn create_index(&mut self, column_name: &str) -> Result<()> {
        let col_index = self
            .schema
            .get_column_index(column_name)
            .ok_or_else(|| SqlCellError::not_found("Column", column_name))?;
        let col_name = self.schema.columns[col_index].name.clone();

        if self.indexes.contains_key(&col_name) {
            return Err(SqlCellError::already_exists(
                "Index",
                format!("{}.{}", self.name, col_name),
            ));
        }

        let mut index = BTreeIndex::new(col_name.clone());
        for (row_id, row) in self.page_manager.scan() {
            index.insert(row.values[col_index].clone(), row_id);
        }

        debug!(table = %self.name, column = index.column_name(), keys = index.len(), "index built");
        self.indexes.insert(col_name, index);
        Ok(())
    }

    pub fn has_index(&self, column_name: &str) -> bool {
        self.schema
            .get_column_index(column_name)
            .is_some_and(|i| self.indexes.contains_key(&self.schema.columns[i].name))
    }

    pub fn row_count(&self) -> usize {
        self.page_manager.total_rows()
    }

    pub fn get_schema(&self) -> &Schema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Column;

    fn float_fea_table() -> Table {
        let schema = Schema::new(vec![
            Column::new("features", DataType::Float),
            Column::new("label", DataType::Integer),
        ]);
        Table::new("test_table_float_fea".to_string(), schema, 2)
    }

    fn users_table() -> Table {
        let mut id = Column::new("id", DataType::Integer);
        id.primary_key = true;
        let schema = Schema::new(vec![id, Column::new("name", DataType::Text)]);
        Table::new("users".to_string(), schema, 100)
    }

    fn values(rows: Vec<(&Table, Option<&Filter>)>) -> Vec<Vec<Vec<Value>>> {
        rows.into_iter()
            .map(|(t, f)| t.select(f).unwrap().map(|(_, r)| r.values.clone()).collect())
            .collect()
    }

    #[test]
    fn test_insert_coerces_integer_into_float_column() {
        let mut table = float_fea_table();
        table
            .insert_rows(vec![vec![Value::Integer(1), Value::Integer(0)]])
            .unwrap();

        let rows = values(vec![(&table, None)]).remove(0);
        assert_eq!(rows, vec![vec![Value::Float(1.0), Value::Integer(0)]]);
    }

    #[test]
    fn test_insert_batch_is_atomic() {
        let mut table = float_fea_table();
        let err = table
            .insert_rows(vec![
                vec![Value::Float(1.0), Value::Integer(0)],
                vec![Value::Float(2.0), Value::Text("one".into())],
            ])
            .unwrap_err();

        assert!(matches!(err, SqlCellError::Type(_)));
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_primary_key_violation_within_batch() {
        let mut table = users_table();
        let err = table
            .insert_rows(vec![
                vec![Value::Integer(1), "a".into()],
                vec![Value::Integer(1), "b".into()],
            ])
            .unwrap_err();

        assert!(matches!(err, SqlCellError::Constraint(_)));
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_select_with_filters() {
        let mut table = float_fea_table();
        table
            .insert_rows(vec![
                vec![Value::Float(1.0), Value::Integer(0)],
                vec![Value::Float(2.0), Value::Integer(1)],
                vec![Value::Float(3.0), Value::Integer(1)],
            ])
            .unwrap();

        let eq = Filter::equals("label", Value::Integer(1));
        let gt = Filter {
            column: "features".into(),
            op: CompareOp::Gt,
            value: Value::Integer(1),
        };
        let found = values(vec![(&table, Some(&eq)), (&table, Some(&gt))]);
        assert_eq!(found[0].len(), 2);
        assert_eq!(found[1][0], vec![Value::Float(2.0), Value::Integer(1)]);
    }

    #[test]
    fn test_filter_type_mismatch_is_an_error() {
        let table = float_fea_table();
        let filter = Filter::equals("label", Value::Text("x".into()));
        assert!(matches!(table.select(Some(&filter)), Err(SqlCellError::Type(_))));
    }

    #[test]
    fn test_index_lookup_matches_scan() {
        let mut table = float_fea_table();
        for i in 0..10 {
            table
                .insert_rows(vec![vec![Value::Float(i as f64), Value::Integer(i % 3)]])
                .unwrap();
        }
        let filter = Filter::equals("label", Value::Integer(2));
        let scanned = table.matching_ids(Some(&filter)).unwrap();

        table.create_index("label").unwrap();
        assert!(table.has_index("label"));
        assert_eq!(table.matching_ids(Some(&filter)).unwrap(), scanned);
    }

    #[test]
    fn test_signed_zero_index_lookup_matches_scan() {
        let mut table = float_fea_table();
        table
            .insert_rows(vec![
                vec![Value::Float(-0.0), Value::Integer(1)],
                vec![Value::Float(0.0), Value::Integer(2)],
            ])
            .unwrap();
        let filter = Filter::equals("features", Value::Integer(0));
        let scanned = table.matching_ids(Some(&filter)).unwrap();
        assert_eq!(scanned.len(), 2);

        table.create_index("features").unwrap();
        assert_eq!(table.matching_ids(Some(&filter)).unwrap(), scanned);
    }

    #[test]
    fn test_signed_zero_primary_key_is_a_duplicate() {
        let mut x = Column::new("x", DataType::Float);
        x.primary_key = true;
        let mut table = Table::new("p".to_string(), Schema::new(vec![x]), 100);

        table.insert_rows(vec![vec![Value::Float(0.0)]]).unwrap();
        let err = table.insert_rows(vec![vec![Value::Float(-0.0)]]).unwrap_err();
        assert!(matches!(err, SqlCellError::Constraint(_)));

        assert_eq!(table.row_count(), 1);

        let err = table
            .insert_rows(vec![vec![Value::Float(2.0)], vec![Value::Float(-2.0)], vec![Value::Float(-2.0)]])
            .unwrap_err();
        assert!(matches!(err, SqlCellError::Constraint(_)));
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_update_and_delete() {
        let mut table = users_table();
        table
            .insert_rows(vec![
                vec![Value::Integer(1), "alice".into()],
                vec![Value::Integer(2), "bob".into()],
            ])
            .unwrap();

        let by_id = Filter::equals("id", Value::Integer(2));
        assert_eq!(table.update(&by_id, "name", "robert".into()).unwrap(), 1);
        let rows = values(vec![(&table, Some(&by_id))]).remove(0);
        assert_eq!(rows, vec![vec![Value::Integer(2), "robert".into()]]);

        // moving bob onto alice's key must fail
        let err = table.update(&by_id, "id", Value::Integer(1)).unwrap_err();
        assert!(matches!(err, SqlCellError::Constraint(_)));

        assert_eq!(table.delete(&by_id).unwrap(), 1);
        assert_eq!(table.row_count(), 1);
        assert!(table.matching_ids(Some(&by_id)).unwrap().is_empty());

        // the key is free again after the delete
        table
            .insert_rows(vec![vec![Value::Integer(2), "carol".into()]])
            .unwrap();
        assert_eq!(table.row_count(), 2);
    }
}
