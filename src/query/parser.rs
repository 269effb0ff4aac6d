// SQL Parser
// This module converts SQL strings into structured queries
// We use the sqlparser crate to handle the complex SQL grammar

use crate::error::{Result, SqlCellError};
use crate::storage::table::{CompareOp, Filter};
use crate::storage::{Column, DataType, Schema, Value};
use sqlparser::ast::{
    AssignmentTarget, BinaryOperator, ColumnOption, CreateTable, DataType as SqlDataType,
    Expr, FromTable, GroupByExpr, Ident, ObjectName, ObjectType, Select, SelectItem, SetExpr, Statement,
    TableConstraint, TableFactor, TableWithJoins, UnaryOperator, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::fmt;

/// A possibly database-qualified table name: `[database.]table`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub database: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(database: Option<&str>, name: &str) -> Self {
        Self {
            database: database.map(str::to_string),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.database {
            Some(db) => write!(f, "{}.{}", db, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// What a SELECT returns
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// SELECT *
    All,
    /// SELECT col [AS alias], ... as (source column, output name) pairs
    Columns(Vec<(String, String)>),
}

/// The statements we support
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// CREATE DATABASE [IF NOT EXISTS] name
    CreateDatabase { name: String, if_not_exists: bool },
    /// DROP DATABASE [IF EXISTS] name
    DropDatabase { name: String, if_exists: bool },
    /// CREATE TABLE [IF NOT EXISTS] [db.]name (col1 TYPE, col2 TYPE, ...)
    CreateTable {
        table: TableRef,
        schema: Schema,
        if_not_exists: bool,
    },
    /// DROP TABLE [IF EXISTS] [db.]name, ...
    DropTable {
        tables: Vec<TableRef>,
        if_exists: bool,
    },
    /// INSERT INTO [db.]name [(cols)] VALUES (..), (..)
    Insert {
        table: TableRef,
        columns: Option<Vec<String>>,
        rows: Vec<Vec<Value>>,
    },
    /// SELECT * | cols FROM [db.]name [WHERE column op value] [LIMIT n]
    Select {
        table: TableRef,
        projection: Projection,
        filter: Option<Filter>,
        limit: Option<usize>,
    },
    /// UPDATE [db.]name SET column = value WHERE column op value
    Update {
        table: TableRef,
        set_column: String,
        set_value: Value,
        filter: Filter,
    },
    /// DELETE FROM [db.]name WHERE column op value
    Delete { table: TableRef, filter: Filter },
    /// CREATE INDEX ON [db.]name (column)
    CreateIndex { table: TableRef, column_name: String },
    /// SHOW DATABASES
    ShowDatabases,
}

impl Query {
    /// True for statements that produce a result set
    pub fn is_read(&self) -> bool {
        matches!(self, Query::Select { .. } | Query::ShowDatabases)
    }
}

/// The query parser
pub struct QueryParser;

impl QueryParser {
    /// Parse a SQL string holding exactly one statement
    pub fn parse(sql: &str) -> Result<Query> {
        let mut queries = Self::parse_all(sql)?;
        if queries.len() != 1 {
            return Err(SqlCellError::unsupported(format!(
                "expected a single statement, found {}",
                queries.len()
            )));
        }
        Ok(queries.remove(0))
    }

    /// Parse every `;`-separated statement in `sql`, in order
    pub fn parse_all(sql: &str) -> Result<Vec<Query>> {
        let dialect = GenericDialect {};
        let ast = Parser::parse_sql(&dialect, sql)?;

        if ast.is_empty() {
            return Err(SqlCellError::Parse("no statement found".to_string()));
        }

        ast.iter().map(Self::parse_statement).collect()
    }

    fn parse_statement(statement: &Statement) -> Result<Query> {
        match statement {
            Statement::CreateDatabase {
                db_name,
                if_not_exists,
                ..
            } => Ok(Query::CreateDatabase {
                name: Self::single_name(db_name)?,
                if_not_exists: *if_not_exists,
            }),
            Statement::CreateTable(create_table) => Self::parse_create_table(create_table),
            Statement::Drop {
                object_type,
                if_exists,
                names,
                ..
            } => Self::parse_drop(object_type, *if_exists, names),
            Statement::Insert(insert) => Self::parse_insert(insert),
            Statement::Query(query) => Self::parse_select(query),
            Statement::Update {
                table,
                assignments,
                selection,
                ..
            } => Self::parse_update(table, assignments, selection),
            Statement::Delete(delete) => Self::parse_delete(delete),
            Statement::CreateIndex(create_index) => Self::parse_create_index(create_index),
            Statement::ShowDatabases { .. } => Ok(Query::ShowDatabases),
            other => Err(SqlCellError::unsupported(format!(
                "statement not supported: {}",
                other
            ))),
        }
    }

    fn parse_create_table(create_table: &CreateTable) -> Result<Query> {
        let table = Self::table_ref(&create_table.name)?;

        // table-level PRIMARY KEY (col)
        let mut table_pk: Option<String> = None;
        for constraint in &create_table.constraints {
            if let TableConstraint::PrimaryKey { columns, .. } = constraint {
                if columns.len() != 1 {
                    return Err(SqlCellError::unsupported(
                        "only single column primary keys are supported",
                    ));
                }
                table_pk = Some(Self::ident_name(&columns[0]));
            }
        }

        let mut columns: Vec<Column> = Vec::new();
        for column_def in &create_table.columns {
            let name = Self::ident_name(&column_def.name);
            if columns.iter().any(|c| c.name.eq_ignore_ascii_case(&name)) {
                return Err(SqlCellError::schema(format!("duplicate column '{}'", name)));
            }

            let data_type = Self::parse_data_type(&column_def.data_type)?;

            let primary_key = column_def
                .options
                .iter()
                .any(|opt| matches!(opt.option, ColumnOption::Unique { is_primary: true, .. }))
                || table_pk
                    .as_deref()
                    .is_some_and(|pk| pk.eq_ignore_ascii_case(&name));

            let nullable = !primary_key
                && !column_def
                    .options
                    .iter()
                    .any(|opt| matches!(opt.option, ColumnOption::NotNull));

            columns.push(Column {
                name,
                data_type,
                primary_key,
                nullable,
            });
        }

        if columns.is_empty() {
            return Err(SqlCellError::schema(format!(
                "table '{}' must have at least one column",
                table
            )));
        }
        if columns.iter().filter(|c| c.primary_key).count() > 1 {
            return Err(SqlCellError::unsupported(
                "only one primary key column is supported",
            ));
        }
        if let Some(pk) = &table_pk {
            if !columns.iter().any(|c| c.name.eq_ignore_ascii_case(pk)) {
                return Err(SqlCellError::not_found("Column", pk.clone()));
            }
        }

        Ok(Query::CreateTable {
            table,
            schema: Schema::new(columns),
            if_not_exists: create_table.if_not_exists,
        })
    }

    fn parse_drop(object_type: &ObjectType, if_exists: bool, names: &[ObjectName]) -> Result<Query> {
        match object_type {
            ObjectType::Table => Ok(Query::DropTable {
                tables: names.iter().map(Self::table_ref).collect::<Result<_>>()?,
                if_exists,
            }),
            ObjectType::Database | ObjectType::Schema => {
                if names.len() != 1 {
                    return Err(SqlCellError::unsupported(
                        "only one database can be dropped at a time",
                    ));
                }
                Ok(Query::DropDatabase {
                    name: Self::single_name(&names[0])?,
                    if_exists,
                })
            }
            other => Err(SqlCellError::unsupported(format!("DROP {}", other))),
        }
    }

    fn parse_insert(insert: &sqlparser::ast::Insert) -> Result<Query> {
        let table = Self::table_ref(&insert.table_name)?;

        let columns = if insert.columns.is_empty() {
            None
        } else {
            Some(insert.columns.iter().map(Self::ident_name).collect())
        };

        let rows = match &insert.source {
            Some(source) => match source.body.as_ref() {
                SetExpr::Values(values) => {
                    if values.rows.is_empty() {
                        return Err(SqlCellError::schema("No values provided"));
                    }
                    values
                        .rows
                        .iter()
                        .map(|row| Self::parse_values(row))
                        .collect::<Result<Vec<_>>>()?
                }
                _ => return Err(SqlCellError::unsupported("only INSERT ... VALUES is supported")),
            },
            None => return Err(SqlCellError::schema("No values provided")),
        };

        Ok(Query::Insert {
            table,
            columns,
            rows,
        })
    }

    fn parse_select(query: &sqlparser::ast::Query) -> Result<Query> {
        let select = match query.body.as_ref() {
            SetExpr::Select(select) => select,
            _ => return Err(SqlCellError::unsupported("only plain SELECT queries are supported")),
        };

        if query.order_by.is_some() {
            return Err(SqlCellError::unsupported("ORDER BY"));
        }
        if query.offset.is_some() {
            return Err(SqlCellError::unsupported("OFFSET"));
        }
        if query.fetch.is_some() {
            return Err(SqlCellError::unsupported("FETCH"));
        }
        if query.with.is_some() {
            return Err(SqlCellError::unsupported("WITH"));
        }
        if select.distinct.is_some() {
            return Err(SqlCellError::unsupported("DISTINCT"));
        }
        if select.top.is_some() {
            return Err(SqlCellError::unsupported("TOP"));
        }
        if !matches!(&select.group_by, GroupByExpr::Expressions(exprs, _) if exprs.is_empty()) {
            return Err(SqlCellError::unsupported("GROUP BY"));
        }
        if select.having.is_some() {
            return Err(SqlCellError::unsupported("HAVING"));
        }

        let table = Self::extract_table(select)?;
        let projection = Self::parse_projection(&select.projection)?;

        let filter = match &select.selection {
            Some(selection) => Some(Self::parse_filter(selection)?),
            None => None,
        };

        let limit = match &query.limit {
            Some(expr) => Some(Self::parse_limit(expr)?),
            None => None,
        };

        Ok(Query::Select {
            table,
            projection,
            filter,
            limit,
        })
    }

    fn parse_update(
        table: &TableWithJoins,
        assignments: &[sqlparser::ast::Assignment],
        selection: &Option<Expr>,
    ) -> Result<Query> {
        let table = Self::relation_ref(table)?;

        // We only support single column updates
        if assignments.len() != 1 {
            return Err(SqlCellError::unsupported(
                "only single column updates are supported",
            ));
        }

        let assignment = &assignments[0];
        let set_column = match &assignment.target {
            AssignmentTarget::ColumnName(name) => Self::last_name(name)?,
            _ => return Err(SqlCellError::unsupported("tuple assignment")),
        };
        let set_value = Self::parse_value(&assignment.value)?;

        // WHERE clause is required for updates (safety feature)
        let filter = match selection {
            Some(expr) => Self::parse_filter(expr)?,
            None => return Err(SqlCellError::unsupported("UPDATE requires WHERE clause")),
        };

        Ok(Query::Update {
            table,
            set_column,
            set_value,
            filter,
        })
    }

    fn parse_delete(delete: &sqlparser::ast::Delete) -> Result<Query> {
        let from = match &delete.from {
            FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
        };
        let table = match from.as_slice() {
            [single] => Self::relation_ref(single)?,
            [] => return Err(SqlCellError::schema("No table specified")),
            _ => return Err(SqlCellError::unsupported("multi-table DELETE")),
        };

        // WHERE clause is required for deletes (safety feature)
        let filter = match &delete.selection {
            Some(expr) => Self::parse_filter(expr)?,
            None => return Err(SqlCellError::unsupported("DELETE requires WHERE clause")),
        };

        Ok(Query::Delete { table, filter })
    }

    fn parse_create_index(create_index: &sqlparser::ast::CreateIndex) -> Result<Query> {
        let table = Self::table_ref(&create_index.table_name)?;

        // We only support single column indexes
        if create_index.columns.len() != 1 {
            return Err(SqlCellError::unsupported(
                "only single column indexes are supported",
            ));
        }

        let column_name = Self::column_name(&create_index.columns[0].expr)?;

        Ok(Query::CreateIndex { table, column_name })
    }

    fn parse_data_type(sql_type: &SqlDataType) -> Result<DataType> {
        match sql_type {
            SqlDataType::Int(_)
            | SqlDataType::Integer(_)
            | SqlDataType::BigInt(_)
            | SqlDataType::SmallInt(_)
            | SqlDataType::TinyInt(_) => Ok(DataType::Integer),
            SqlDataType::Float(_) | SqlDataType::Double | SqlDataType::Real => Ok(DataType::Float),
            SqlDataType::Text | SqlDataType::Varchar(_) | SqlDataType::String(_) => {
                Ok(DataType::Text)
            }
            SqlDataType::Boolean | SqlDataType::Bool => Ok(DataType::Boolean),
            _ => Err(SqlCellError::unsupported(format!("data type {}", sql_type))),
        }
    }

    fn parse_values(exprs: &[Expr]) -> Result<Vec<Value>> {
        exprs.iter().map(Self::parse_value).collect()
    }

    /// Parse a literal, including signed numbers
    fn parse_value(expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Value(SqlValue::Number(n, _)) => Self::parse_number(n),
            Expr::Value(SqlValue::SingleQuotedString(s))
            | Expr::Value(SqlValue::DoubleQuotedString(s)) => Ok(Value::Text(s.clone())),
            Expr::Value(SqlValue::Boolean(b)) => Ok(Value::Boolean(*b)),
            Expr::Value(SqlValue::Null) => Ok(Value::Null),
            Expr::UnaryOp {
                op: UnaryOperator::Minus,
                expr,
            } => match Self::parse_value(expr)? {
                Value::Integer(i) => Ok(Value::Integer(-i)),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(SqlCellError::type_mismatch(format!(
                    "cannot negate {}",
                    other.type_name()
                ))),
            },
            Expr::UnaryOp {
                op: UnaryOperator::Plus,
                expr,
            } => Self::parse_value(expr),
            Expr::Nested(inner) => Self::parse_value(inner),
            _ => Err(SqlCellError::unsupported(format!("value expression {}", expr))),
        }
    }

    fn parse_number(n: &str) -> Result<Value> {
        if n.contains(['.', 'e', 'E']) {
            n.parse::<f64>()
                .map(Value::Float)
                .map_err(|_| SqlCellError::Parse(format!("invalid number '{}'", n)))
        } else {
            n.parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| SqlCellError::Parse(format!("integer out of range '{}'", n)))
        }
    }

    fn parse_limit(expr: &Expr) -> Result<usize> {
        match expr {
            Expr::Value(SqlValue::Number(n, _)) => n
                .parse::<usize>()
                .map_err(|_| SqlCellError::Parse(format!("invalid LIMIT '{}'", n))),
            _ => Err(SqlCellError::unsupported(format!("LIMIT {}", expr))),
        }
    }

    fn parse_projection(items: &[SelectItem]) -> Result<Projection> {
        if let [SelectItem::Wildcard(_)] = items {
            return Ok(Projection::All);
        }

        let mut columns = Vec::with_capacity(items.len());
        for item in items {
            match item {
                SelectItem::UnnamedExpr(expr) => {
                    let name = Self::column_name(expr)?;
                    columns.push((name.clone(), name));
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    columns.push((Self::column_name(expr)?, Self::ident_name(alias)));
                }
                SelectItem::Wildcard(_) => {
                    return Err(SqlCellError::unsupported("* mixed with other columns"))
                }
                _ => return Err(SqlCellError::unsupported(format!("select item {}", item))),
            }
        }
        Ok(Projection::Columns(columns))
    }

    fn extract_table(select: &Select) -> Result<TableRef> {
        match select.from.as_slice() {
            [single] => Self::relation_ref(single),
            [] => Err(SqlCellError::schema("No table specified in SELECT")),
            _ => Err(SqlCellError::unsupported("multiple tables in FROM")),
        }
    }

    fn relation_ref(table: &TableWithJoins) -> Result<TableRef> {
        if !table.joins.is_empty() {
            return Err(SqlCellError::unsupported("JOIN"));
        }
        match &table.relation {
            TableFactor::Table { name, .. } => Self::table_ref(name),
            _ => Err(SqlCellError::unsupported("table reference")),
        }
    }

    /// WHERE column op value (or value op column)
    fn parse_filter(expr: &Expr) -> Result<Filter> {
        match expr {
            Expr::Nested(inner) => Self::parse_filter(inner),
            Expr::BinaryOp { left, op, right } => {
                let op = match op {
                    BinaryOperator::Eq => CompareOp::Eq,
                    BinaryOperator::NotEq => CompareOp::NotEq,
                    BinaryOperator::Lt => CompareOp::Lt,
                    BinaryOperator::LtEq => CompareOp::LtEq,
                    BinaryOperator::Gt => CompareOp::Gt,
                    BinaryOperator::GtEq => CompareOp::GtEq,
                    other => {
                        return Err(SqlCellError::unsupported(format!(
                            "operator {} in WHERE clause",
                            other
                        )))
                    }
                };

                if let Ok(column) = Self::column_name(left) {
                    return Ok(Filter {
                        column,
                        op,
                        value: Self::parse_value(right)?,
                    });
                }

                // literal on the left: mirror the comparison
                let column = Self::column_name(right)?;
                let op = match op {
                    CompareOp::Lt => CompareOp::Gt,
                    CompareOp::LtEq => CompareOp::GtEq,
                    CompareOp::Gt => CompareOp::Lt,
                    CompareOp::GtEq => CompareOp::LtEq,
                    same => same,
                };
                Ok(Filter {
                    column,
                    op,
                    value: Self::parse_value(left)?,
                })
            }
            _ => Err(SqlCellError::unsupported(format!("WHERE clause {}", expr))),
        }
    }

    fn column_name(expr: &Expr) -> Result<String> {
        match expr {
            Expr::Identifier(ident) => Ok(Self::ident_name(ident)),
            Expr::CompoundIdentifier(idents) => idents
                .last()
                .map(Self::ident_name)
                .ok_or_else(|| SqlCellError::Parse("empty identifier".to_string())),
            _ => Err(SqlCellError::unsupported(format!(
                "expected a column name, found {}",
                expr
            ))),
        }
    }

    /// Unquoted identifiers are case-insensitive and folded to lower case
    fn ident_name(ident: &Ident) -> String {
        match ident.quote_style {
            Some(_) => ident.value.clone(),
            None => ident.value.to_lowercase(),
        }
    }

    fn table_ref(name: &ObjectName) -> Result<TableRef> {
        match name.0.as_slice() {
            [table] => Ok(TableRef {
                database: None,
                name: Self::ident_name(table),
            }),
            [database, table] => Ok(TableRef {
                database: Some(Self::ident_name(database)),
                name: Self::ident_name(table),
            }),
            _ => Err(SqlCellError::unsupported(format!("table name {}", name))),
        }
    }

    fn single_name(name: &ObjectName) -> Result<String> {
        match name.0.as_slice() {
            [ident] => Ok(Self::ident_name(ident)),
            _ => Err(SqlCellError::unsupported(format!("qualified name {}", name))),
        }
    }

    fn last_name(name: &ObjectName) -> Result<String> {
        name.0
            .last()
            .map(Self::ident_name)
            .ok_or_else(|| SqlCellError::Parse("empty name".to_string()))
    }
}
