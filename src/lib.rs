// sqlcell - SQL statements from notebook cell magics, over an in-memory store
// This is the library root that exposes the public API

pub mod config;
pub mod error;
pub mod logging;
pub mod magic;
pub mod query;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::{EngineConfig, ExecuteOptions};
pub use error::{Result, SqlCellError};
pub use magic::{CellMagic, MagicRegistry, SqlMagic};
pub use query::{QueryExecutor, QueryParser, QueryResult, ResultSet, StatementExecutor};
pub use storage::{Column, DataType, Row, Schema, Value};
