// Cell magics
// A cell magic routes the text of a notebook cell to a registered handler
// The SQL handler gets its executor at construction, never from process-wide state

pub mod options;

use crate::error::{Result, SqlCellError};
use crate::query::{ResultSet, StatementExecutor};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub use options::parse_line;

/// Name the SQL magic is registered under by default (`%%sqlflow`).
pub const DEFAULT_SQL_MAGIC: &str = "sqlflow";

/// A handler for `%%name line` cells.
pub trait CellMagic: Send + Sync {
    /// The name used after `%%`.
    fn name(&self) -> &str;

    /// Runs the cell. `line` is the rest of the `%%name` line, `cell` the body.
    fn run(&self, line: &str, cell: &str) -> Result<Option<ResultSet>>;
}

/// Runs the cell body as SQL through an injected executor.
pub struct SqlMagic {
    name: String,
    executor: Arc<dyn StatementExecutor>,
}

impl SqlMagic {
    pub fn new(executor: Arc<dyn StatementExecutor>) -> Self {
        Self::with_name(DEFAULT_SQL_MAGIC, executor)
    }

    pub fn with_name(name: impl Into<String>, executor: Arc<dyn StatementExecutor>) -> Self {
        Self {
            name: name.into(),
            executor,
        }
    }
}

impl CellMagic for SqlMagic {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, line: &str, cell: &str) -> Result<Option<ResultSet>> {
        let options = parse_line(line)?;
        debug!(magic = %self.name, ?options, "running cell");
        self.executor.execute(cell, &options)
    }
}

/// Registered cell magics, by name.
#[derive(Default)]
pub struct MagicRegistry {
    handlers: HashMap<String, Box<dyn CellMagic>>,
}

impl MagicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the SQL magic registered under [`DEFAULT_SQL_MAGIC`].
    pub fn with_sql(executor: Arc<dyn StatementExecutor>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SqlMagic::new(executor)));
        registry
    }

    /// Registers a handler, replacing any handler with the same name.
    pub fn register(&mut self, magic: Box<dyn CellMagic>) {
        self.handlers.insert(magic.name().to_string(), magic);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Dispatches a cell to the magic registered under `name`.
    pub fn run_cell_magic(&self, name: &str, line: &str, cell: &str) -> Result<Option<ResultSet>> {
        let magic = self
            .handlers
            .get(name)
            .ok_or_else(|| SqlCellError::UnknownMagic(name.to_string()))?;
        magic.run(line, cell)
    }

    /// Runs a full cell whose first line is `%%name [line]`.
    pub fn run_cell(&self, source: &str) -> Result<Option<ResultSet>> {
        let (header, body) = source.split_once('\n').unwrap_or((source, ""));
        let header = header.trim();
        let Some(invocation) = header.strip_prefix("%%") else {
            return Err(SqlCellError::config(format!(
                "cell does not start with a %% magic: '{}'",
                header
            )));
        };

        let (name, line) = invocation
            .split_once(char::is_whitespace)
            .unwrap_or((invocation, ""));
        self.run_cell_magic(name, line.trim(), body)
    }
}
