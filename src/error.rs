// Error types
// Every failure surfaces as an Err, so callers can always tell a rejected
// statement apart from a query that simply matched zero rows

use thiserror::Error;

/// Main error type for sqlcell operations
#[derive(Error, Debug)]
pub enum SqlCellError {
    /// The statement text could not be parsed
    #[error("SQL parsing error: {0}")]
    Parse(String),

    /// The statement parsed but uses a feature we don't support
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A database, table, column or index does not exist
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// A database, table or index already exists
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },

    /// Row shape does not match the table schema
    #[error("Schema error: {0}")]
    Schema(String),

    /// A value cannot be stored in (or compared with) a column of another type
    #[error("Type mismatch: {0}")]
    Type(String),

    /// PRIMARY KEY / NOT NULL violations
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Invalid engine configuration or magic line options
    #[error("Configuration error: {0}")]
    Config(String),

    /// No handler registered under this magic name
    #[error("Unknown cell magic: %%{0}")]
    UnknownMagic(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SqlCellError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<sqlparser::parser::ParserError> for SqlCellError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias using SqlCellError
pub type Result<T> = std::result::Result<T, SqlCellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = SqlCellError::not_found("Table", "e2e_1.missing");
        assert_eq!(err.to_string(), "Table 'e2e_1.missing' not found");
    }

    #[test]
    fn test_already_exists_display() {
        let err = SqlCellError::already_exists("Database", "e2e_1");
        assert_eq!(err.to_string(), "Database 'e2e_1' already exists");
    }

    #[test]
    fn test_parser_error_converts() {
        let parse_err = sqlparser::parser::ParserError::ParserError("boom".to_string());
        let err: SqlCellError = parse_err.into();
        assert!(matches!(err, SqlCellError::Parse(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqlCellError>();
    }
}
