// Query module - handles SQL parsing, execution and results
pub mod executor;
pub mod parser;
pub mod result;

pub use executor::{QueryExecutor, StatementExecutor};
pub use parser::QueryParser;
pub use result::{ColumnInfo, QueryResult, ResultSet, Rows};
