// Query Executor
// This module executes parsed queries against the catalog

use super::parser::{Projection, Query, QueryParser, TableRef};
use super::result::{ColumnInfo, QueryResult, ResultSet};
use crate::config::{EngineConfig, ExecuteOptions};
use crate::error::{Result, SqlCellError};
use crate::storage::catalog::Catalog;
use crate::storage::{DataType, Row, Schema, Value};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Anything that can run statement text and hand back a result set
///
/// DDL/DML statements return `Ok(None)`, reads return `Ok(Some(..))`, and a
/// rejected statement is always an `Err`. The call blocks until the
/// statement's effects (or rows) are fully determined.
pub trait StatementExecutor: Send + Sync {
    fn execute(&self, statement: &str, options: &ExecuteOptions) -> Result<Option<ResultSet>>;
}

/// Runs statements against a catalog shared by every clone of the executor
///
/// Cloning is cheap and gives another handle on the same databases, which is
/// how several sessions (or threads) share one backing store.
#[derive(Clone)]
pub struct QueryExecutor {
    catalog: Arc<RwLock<Catalog>>,
    config: Arc<EngineConfig>,
}

impl QueryExecutor {
    /// Create an executor with the default configuration (empty `default` database)
    pub fn new() -> Self {
        let config = EngineConfig::default();
        Self {
            catalog: Arc::new(RwLock::new(Catalog::new(
                config.default_database.clone(),
                config.rows_per_page,
            ))),
            config: Arc::new(config),
        }
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            catalog: Arc::new(RwLock::new(Catalog::new(
                config.default_database.clone(),
                config.rows_per_page,
            ))),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse and run every statement in `sql`, in order
    /// Stops at the first failing statement
    pub fn execute_sql(&self, sql: &str, options: &ExecuteOptions) -> Result<Vec<QueryResult>> {
        let queries = QueryParser::parse_all(sql).inspect_err(|e| {
            warn!(error = %e, "statement rejected by parser");
        })?;

        let mut results = Vec::with_capacity(queries.len());
        for query in queries {
            let result = self.execute_query(query, options).inspect_err(|e| {
                warn!(error = %e, "statement failed");
            })?;
            results.push(result);
        }
        Ok(results)
    }

    /// Execute a parsed query and return the result
    pub fn execute_query(&self, query: Query, options: &ExecuteOptions) -> Result<QueryResult> {
        debug!(?query, "executing");

        match query {
            Query::CreateDatabase {
                name,
                if_not_exists,
            } => {
                let created = self.catalog.write().create_database(&name, if_not_exists)?;
                Ok(QueryResult::Message(if created {
                    format!("Database '{}' created", name)
                } else {
                    format!("Database '{}' already exists", name)
                }))
            }

            Query::DropDatabase { name, if_exists } => {
                let dropped = self.catalog.write().drop_database(&name, if_exists)?;
                Ok(QueryResult::Message(if dropped {
                    format!("Database '{}' dropped", name)
                } else {
                    format!("Database '{}' does not exist", name)
                }))
            }

            Query::CreateTable {
                table,
                schema,
                if_not_exists,
            } => {
                let database = self.resolve_database(&table, options);
                let created = self.catalog.write().create_table(
                    database,
                    &table.name,
                    schema,
                    if_not_exists,
                )?;
                Ok(QueryResult::Message(if created {
                    format!("Table '{}.{}' created", database, table.name)
                } else {
                    format!("Table '{}.{}' already exists", database, table.name)
                }))
            }

            Query::DropTable { tables, if_exists } => {
                // a name listed twice (or both bare and qualified) is dropped once
                let mut targets: Vec<(&str, &str)> = Vec::with_capacity(tables.len());
                for table in &tables {
                    let target = (self.resolve_database(table, options), table.name.as_str());
                    if !targets.contains(&target) {
                        targets.push(target);
                    }
                }

                let mut catalog = self.catalog.write();
                // check every name first so a failing DROP removes nothing
                if !if_exists {
                    for (database, name) in &targets {
                        catalog.table(database, name)?;
                    }
                }

                let mut dropped = 0;
                for (database, name) in &targets {
                    if catalog.drop_table(database, name, if_exists)? {
                        dropped += 1;
                    }
                }
                Ok(QueryResult::Message(format!("{} table(s) dropped", dropped)))
            }

            Query::Insert {
                table,
                columns,
                rows,
            } => {
                let database = self.resolve_database(&table, options);
                let mut catalog = self.catalog.write();
                let target = catalog.table_mut(database, &table.name)?;

                let full_rows = match columns {
                    Some(columns) => {
                        let positions = Self::insert_positions(&columns, target.get_schema())?;
                        let width = target.get_schema().columns.len();
                        rows.into_iter()
                            .enumerate()
                            .map(|(row_no, values)| {
                                if values.len() != columns.len() {
                                    return Err(SqlCellError::schema(format!(
                                        "row {} has {} values for {} columns",
                                        row_no + 1,
                                        values.len(),
                                        columns.len()
                                    )));
                                }
                                let mut full = vec![Value::Null; width];
                                for (value, &pos) in values.into_iter().zip(&positions) {
                                    full[pos] = value;
                                }
                                Ok(full)
                            })
                            .collect::<Result<Vec<_>>>()?
                    }
                    None => rows,
                };

                let count = target.insert_rows(full_rows)?;
                Ok(QueryResult::Message(format!(
                    "{} row(s) inserted into '{}.{}'",
                    count, database, table.name
                )))
            }

            Query::Select {
                table,
                projection,
                filter,
                limit,
            } => {
                let database = self.resolve_database(&table, options);
                let catalog = self.catalog.read();
                let source = catalog.table(database, &table.name)?;
                let schema = source.get_schema();

                let (positions, columns): (Vec<usize>, Vec<ColumnInfo>) = match projection {
                    Projection::All => schema
                        .columns
                        .iter()
                        .enumerate()
                        .map(|(i, c)| (i, ColumnInfo::new(c.name.clone(), c.data_type)))
                        .unzip(),
                    Projection::Columns(list) => list
                        .into_iter()
                        .map(|(source_name, output_name)| {
                            let pos = schema
                                .get_column_index(&source_name)
                                .ok_or_else(|| SqlCellError::not_found("Column", source_name))?;
                            Ok((pos, ColumnInfo::new(output_name, schema.columns[pos].data_type)))
                        })
                        .collect::<Result<Vec<_>>>()?
                        .into_iter()
                        .unzip(),
                };

                let cap = self.row_cap(limit, options);
                let rows: Vec<Row> = source
                    .select(filter.as_ref())?
                    .take(cap)
                    .map(|(_id, row)| {
                        Row::new(positions.iter().map(|&i| row.values[i].clone()).collect())
                    })
                    .collect();

                debug!(table = %table, rows = rows.len(), "select finished");
                Ok(QueryResult::Rows(ResultSet::new(columns, rows)))
            }

            Query::Update {
                table,
                set_column,
                set_value,
                filter,
            } => {
                let database = self.resolve_database(&table, options);
                let count = self
                    .catalog
                    .write()
                    .table_mut(database, &table.name)?
                    .update(&filter, &set_column, set_value)?;

                Ok(QueryResult::Message(format!(
                    "{} row(s) updated in '{}.{}'",
                    count, database, table.name
                )))
            }

            Query::Delete { table, filter } => {
                let database = self.resolve_database(&table, options);
                let count = self
                    .catalog
                    .write()
                    .table_mut(database, &table.name)?
                    .delete(&filter)?;

                Ok(QueryResult::Message(format!(
                    "{} row(s) deleted from '{}.{}'",
                    count, database, table.name
                )))
            }

            Query::CreateIndex { table, column_name } => {
                let database = self.resolve_database(&table, options);
                self.catalog
                    .write()
                    .table_mut(database, &table.name)?
                    .create_index(&column_name)?;

                Ok(QueryResult::Message(format!(
                    "Index created on '{}.{}.{}'",
                    database, table.name, column_name
                )))
            }

            Query::ShowDatabases => {
                let rows = self
                    .list_databases()
                    .into_iter()
                    .map(|name| Row::new(vec![Value::Text(name)]))
                    .collect();
                Ok(QueryResult::Rows(ResultSet::new(
                    vec![ColumnInfo::new("database", DataType::Text)],
                    rows,
                )))
            }
        }
    }

    /// Database a table reference lives in: explicit qualifier, then the
    /// per-call option, then the engine default
    fn resolve_database<'a>(&'a self, table: &'a TableRef, options: &'a ExecuteOptions) -> &'a str {
        table
            .database
            .as_deref()
            .or(options.database.as_deref())
            .unwrap_or(&self.config.default_database)
    }

    /// Smallest of LIMIT, the per-call cap and the engine cap
    fn row_cap(&self, limit: Option<usize>, options: &ExecuteOptions) -> usize {
        [limit, options.max_rows, self.config.max_rows]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(usize::MAX)
    }

    /// Map an INSERT column list onto schema positions
    fn insert_positions(columns: &[String], schema: &Schema) -> Result<Vec<usize>> {
        let mut seen = HashSet::new();
        columns
            .iter()
            .map(|name| {
                let pos = schema
                    .get_column_index(name)
                    .ok_or_else(|| SqlCellError::not_found("Column", name.clone()))?;
                if !seen.insert(pos) {
                    return Err(SqlCellError::schema(format!(
                        "column '{}' specified more than once",
                        name
                    )));
                }
                Ok(pos)
            })
            .collect()
    }

    /// List all databases, sorted by name
    pub fn list_databases(&self) -> Vec<String> {
        self.catalog.read().database_names()
    }

    /// List the tables of one database, sorted by name
    pub fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        Ok(self.catalog.read().database(database)?.table_names())
    }

    pub fn row_count(&self, database: &str, table: &str) -> Result<usize> {
        Ok(self.catalog.read().table(database, table)?.row_count())
    }
}

impl StatementExecutor for QueryExecutor {
    fn execute(&self, statement: &str, options: &ExecuteOptions) -> Result<Option<ResultSet>> {
        let results = self.execute_sql(statement, options)?;
        Ok(results.into_iter().last().and_then(QueryResult::into_result_set))
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(executor: &QueryExecutor, sql: &str) -> QueryResult {
        executor
            .execute_sql(sql, &ExecuteOptions::default())
            .unwrap()
            .pop()
            .unwrap()
    }

    fn seeded() -> QueryExecutor {
        let executor = QueryExecutor::new();
        run(&executor, "create database if not exists e2e_1");
        run(
            &executor,
            "create table e2e_1.test_table_float_fea (features float, label int)",
        );
        run(
            &executor,
            "insert into e2e_1.test_table_float_fea (features,label) values(1.0, 0), (2.0, 1)",
        );
        executor
    }

    fn values(result: &QueryResult) -> Vec<Vec<Value>> {
        result
            .result_set()
            .unwrap()
            .rows()
            .map(|r| r.values.clone())
            .collect()
    }

    #[test]
    fn test_setup_messages() {
        let executor = QueryExecutor::new();
        let results = executor
            .execute_sql(
                "CREATE DATABASE d; CREATE TABLE d.t (x INT); INSERT INTO d.t VALUES (1), (2)",
                &ExecuteOptions::default(),
            )
            .unwrap();

        let messages: Vec<String> = results.iter().map(QueryResult::format).collect();
        assert_eq!(
            messages,
            vec![
                "Database 'd' created",
                "Table 'd.t' created",
                "2 row(s) inserted into 'd.t'",
            ]
        );
    }

    #[test]
    fn test_select_limit_one() {
        let executor = seeded();
        let result = run(&executor, "select * from e2e_1.test_table_float_fea limit 1;");
        assert_eq!(
            values(&result),
            vec![vec![Value::Float(1.0), Value::Integer(0)]]
        );
    }

    #[test]
    fn test_limit_bounds_row_count() {
        let executor = seeded();
        for (limit, expected) in [(0, 0), (1, 1), (2, 2), (5, 2)] {
            let sql = format!("select * from e2e_1.test_table_float_fea limit {}", limit);
            assert_eq!(values(&run(&executor, &sql)).len(), expected);
        }
    }

    #[test]
    fn test_max_rows_options_cap_results() {
        let executor = seeded();
        let options = ExecuteOptions::default().with_max_rows(1);
        let rs = executor
            .execute("select * from e2e_1.test_table_float_fea", &options)
            .unwrap()
            .unwrap();
        assert_eq!(rs.len(), 1);

        let capped = QueryExecutor::with_config(EngineConfig {
            max_rows: Some(1),
            ..EngineConfig::default()
        })
        .unwrap();
        run(&capped, "CREATE TABLE t (x INT)");
        run(&capped, "INSERT INTO t VALUES (1), (2), (3)");
        assert_eq!(values(&run(&capped, "SELECT * FROM t LIMIT 2")).len(), 1);
    }

    #[test]
    fn test_unqualified_names_use_option_database() {
        let executor = seeded();
        let options = ExecuteOptions::default().with_database("e2e_1");
        let rs = executor
            .execute("SELECT label FROM test_table_float_fea WHERE features = 2", &options)
            .unwrap()
            .unwrap();

        assert_eq!(rs.column_names(), vec!["label"]);
        assert_eq!(rs.rows().next().unwrap().values, vec![Value::Integer(1)]);
    }

    #[test]
    fn test_insert_with_reordered_and_missing_columns() {
        let executor = QueryExecutor::new();
        run(&executor, "CREATE TABLE t (a INT, b TEXT, c FLOAT)");
        run(&executor, "INSERT INTO t (c, a) VALUES (2, 7)");

        assert_eq!(
            values(&run(&executor, "SELECT * FROM t")),
            vec![vec![Value::Integer(7), Value::Null, Value::Float(2.0)]]
        );
    }

    #[test]
    fn test_ddl_returns_no_result_set() {
        let executor = QueryExecutor::new();
        let options = ExecuteOptions::default();
        assert_eq!(executor.execute("CREATE DATABASE x", &options).unwrap(), None);
        assert_eq!(
            executor.execute("CREATE DATABASE IF NOT EXISTS x", &options).unwrap(),
            None
        );
    }

    #[test]
    fn test_errors_are_not_empty_results() {
        let executor = seeded();
        let options = ExecuteOptions::default();

        assert!(matches!(
            executor.execute("SELECT * FROM e2e_1.missing", &options),
            Err(SqlCellError::NotFound { kind: "Table", .. })
        ));
        assert!(matches!(
            executor.execute("CREATE DATABASE e2e_1", &options),
            Err(SqlCellError::AlreadyExists { .. })
        ));
        assert!(matches!(
            executor.execute(
                "INSERT INTO e2e_1.test_table_float_fea VALUES (1.5, 2.5)",
                &options
            ),
            Err(SqlCellError::Type(_))
        ));
        assert!(matches!(
            executor.execute("SELECT nope FROM e2e_1.test_table_float_fea", &options),
            Err(SqlCellError::NotFound { kind: "Column", .. })
        ));

        // an empty match is still Ok
        let rs = executor
            .execute(
                "SELECT * FROM e2e_1.test_table_float_fea WHERE label = 9",
                &options,
            )
            .unwrap()
            .unwrap();
        assert!(rs.is_empty());
    }

    #[test]
    fn test_failed_statement_stops_the_batch() {
        let executor = QueryExecutor::new();
        let result = executor.execute_sql(
            "CREATE TABLE t (x INT); INSERT INTO missing VALUES (1); INSERT INTO t VALUES (1)",
            &ExecuteOptions::default(),
        );

        assert!(result.is_err());
        assert_eq!(executor.row_count("default", "t").unwrap(), 0);
    }

    #[test]
    fn test_result_set_is_a_snapshot() {
        let executor = seeded();
        let options = ExecuteOptions::default();
        let before = executor
            .execute("SELECT * FROM e2e_1.test_table_float_fea", &options)
            .unwrap()
            .unwrap();
        executor
            .execute("INSERT INTO e2e_1.test_table_float_fea VALUES (3.0, 0)", &options)
            .unwrap();

        assert_eq!(before.len(), 2);
        assert_eq!(executor.row_count("e2e_1", "test_table_float_fea").unwrap(), 3);
    }

    #[test]
    fn test_update_delete_and_index() {
        let executor = QueryExecutor::new();
        run(&executor, "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)");
        run(&executor, "INSERT INTO users VALUES (1, 'Alice', 30), (2, 'Bob', 25), (3, 'Carol', 35)");
        run(&executor, "CREATE INDEX ON users (name)");

        assert_eq!(
            run(&executor, "UPDATE users SET age = 26 WHERE name = 'Bob'").format(),
            "1 row(s) updated in 'default.users'"
        );
        assert_eq!(
            run(&executor, "DELETE FROM users WHERE age > 30").format(),
            "1 row(s) deleted from 'default.users'"
        );
        assert_eq!(
            values(&run(&executor, "SELECT name, age FROM users")),
            vec![
                vec![Value::from("Alice"), Value::Integer(30)],
                vec![Value::from("Bob"), Value::Integer(26)],
            ]
        );
    }

    #[test]
    fn test_show_and_drop() {
        let executor = seeded();
        let dbs = values(&run(&executor, "SHOW DATABASES"));
        assert_eq!(
            dbs,
            vec![vec![Value::from("default")], vec![Value::from("e2e_1")]]
        );

        run(&executor, "DROP TABLE e2e_1.test_table_float_fea");
        assert!(executor.list_tables("e2e_1").unwrap().is_empty());

        run(&executor, "DROP DATABASE e2e_1");
        assert_eq!(executor.list_databases(), vec!["default".to_string()]);
    }

    #[test]
    fn test_drop_table_with_repeated_name() {
        let executor = seeded();
        run(&executor, "CREATE TABLE e2e_1.other (x INT)");

        let result = run(
            &executor,
            "DROP TABLE e2e_1.test_table_float_fea, e2e_1.test_table_float_fea",
        );
        assert_eq!(result.format(), "1 table(s) dropped");
        assert_eq!(executor.list_tables("e2e_1").unwrap(), vec!["other".to_string()]);

        // a missing name still leaves every listed table in place
        let err = executor
            .execute_sql("DROP TABLE e2e_1.other, e2e_1.other, e2e_1.missing", &ExecuteOptions::default())
            .unwrap_err();
        assert!(matches!(err, SqlCellError::NotFound { .. }));
        assert_eq!(executor.list_tables("e2e_1").unwrap(), vec!["other".to_string()]);
    }

    #[test]
    fn test_clones_share_the_catalog() {
        let executor = QueryExecutor::new();
        let other = executor.clone();
        run(&executor, "CREATE DATABASE shared");
        assert!(other.list_databases().contains(&"shared".to_string()));
    }
}
