// Configuration
// EngineConfig holds engine-wide defaults (optionally loaded from a JSON file)
// ExecuteOptions is the per-call configuration handed to every execute()

use crate::error::{Result, SqlCellError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Engine-wide settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Database used for unqualified table names; always exists
    #[serde(default = "default_database")]
    pub default_database: String,

    /// Rows stored per page in every table
    #[serde(default = "default_rows_per_page")]
    pub rows_per_page: usize,

    /// Hard cap on rows returned by any query
    #[serde(default)]
    pub max_rows: Option<usize>,
}

fn default_database() -> String {
    "default".to_string()
}

fn default_rows_per_page() -> usize {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_database: default_database(),
            rows_per_page: default_rows_per_page(),
            max_rows: None,
        }
    }
}

impl EngineConfig {
    /// Load a config from a JSON file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_database.trim().is_empty() {
            return Err(SqlCellError::config("default_database must not be empty"));
        }
        if self.rows_per_page == 0 {
            return Err(SqlCellError::config("rows_per_page must be at least 1"));
        }
        Ok(())
    }
}

/// Per-call options for a statement execution
///
/// An empty magic line yields `ExecuteOptions::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Database for unqualified table names (overrides the engine default)
    pub database: Option<String>,
    /// Row cap for queries in this call
    pub max_rows: Option<usize>,
}

impl ExecuteOptions {
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    /// Set a single option by key, as parsed from a magic line
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "database" | "db" => {
                if value.is_empty() {
                    return Err(SqlCellError::config("database must not be empty"));
                }
                self.database = Some(value.to_string());
            }
            "max_rows" => {
                let n = value.parse::<usize>().map_err(|_| {
                    SqlCellError::config(format!("max_rows expects a non-negative integer, got '{}'", value))
                })?;
                self.max_rows = Some(n);
            }
            _ => return Err(SqlCellError::config(format!("unknown option '{}'", key))),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_database, "default");
        assert_eq!(config.rows_per_page, 100);
        assert_eq!(config.max_rows, None);
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_rows": 500 }}"#).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_rows, Some(500));
        assert_eq!(config.default_database, "default");
        assert_eq!(config.rows_per_page, 100);
    }

    #[test]
    fn test_from_file_rejects_zero_page_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "rows_per_page": 0 }}"#).unwrap();

        let err = EngineConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, SqlCellError::Config(_)));
    }

    #[test]
    fn test_options_set() {
        let mut options = ExecuteOptions::default();
        options.set("database", "e2e_7").unwrap();
        options.set("max_rows", "10").unwrap();
        assert_eq!(options, ExecuteOptions::default().with_database("e2e_7").with_max_rows(10));

        assert!(options.set("max_rows", "ten").is_err());
        assert!(options.set("colour", "blue").is_err());
    }
}
