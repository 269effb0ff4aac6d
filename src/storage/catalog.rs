// Database catalog
// The catalog is the whole backing store: a set of named databases, each a
// namespace of tables. Table names are resolved as `database.table`.

use super::{table::Table, Schema};
use crate::error::{Result, SqlCellError};
use std::collections::BTreeMap;
use tracing::info;

/// A named namespace of tables
pub struct Database {
    pub name: String,
    tables: BTreeMap<String, Table>,
}

impl Database {
    pub fn new(name: String) -> Self {
        Self {
            name,
            tables: BTreeMap::new(),
        }
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}

/// All databases known to one engine
pub struct Catalog {
    databases: BTreeMap<String, Database>,
    default_database: String,
    rows_per_page: usize,
}

impl Catalog {
    /// Create a catalog holding only the (always present) default database
    pub fn new(default_database: impl Into<String>, rows_per_page: usize) -> Self {
        let default_database = default_database.into();
        let mut databases = BTreeMap::new();
        databases.insert(
            default_database.clone(),
            Database::new(default_database.clone()),
        );

        Self {
            databases,
            default_database,
            rows_per_page,
        }
    }

    pub fn default_database(&self) -> &str {
        &self.default_database
    }

    /// Returns false when the database already existed and `if_not_exists` was set
    pub fn create_database(&mut self, name: &str, if_not_exists: bool) -> Result<bool> {
        if self.databases.contains_key(name) {
            if if_not_exists {
                return Ok(false);
            }
            return Err(SqlCellError::already_exists("Database", name));
        }

        self.databases
            .insert(name.to_string(), Database::new(name.to_string()));
        info!(database = name, "database created");
        Ok(true)
    }

    /// Returns false when the database was missing and `if_exists` was set
    pub fn drop_database(&mut self, name: &str, if_exists: bool) -> Result<bool> {
        if name == self.default_database {
            return Err(SqlCellError::Constraint(format!(
                "the default database '{}' cannot be dropped",
                name
            )));
        }

        match self.databases.remove(name) {
            Some(_) => {
                info!(database = name, "database dropped");
                Ok(true)
            }
            None if if_exists => Ok(false),
            None => Err(SqlCellError::not_found("Database", name)),
        }
    }

    pub fn database(&self, name: &str) -> Result<&Database> {
        self.databases
            .get(name)
            .ok_or_else(|| SqlCellError::not_found("Database", name))
    }

    fn database_mut(&mut self, name: &str) -> Result<&mut Database> {
        self.databases
            .get_mut(name)
            .ok_or_else(|| SqlCellError::not_found("Database", name))
    }

    /// Returns false when the table already existed and `if_not_exists` was set
    pub fn create_table(
        &mut self,
        database: &str,
        name: &str,
        schema: Schema,
        if_not_exists: bool,
    ) -> Result<bool> {
        let rows_per_page = self.rows_per_page;
        let db = self.database_mut(database)?;

        if db.tables.contains_key(name) {
            if if_not_exists {
                return Ok(false);
            }
            return Err(SqlCellError::already_exists(
                "Table",
                format!("{}.{}", database, name),
            ));
        }

        db.tables.insert(
            name.to_string(),
            Table::new(name.to_string(), schema, rows_per_page),
        );
        info!(database, table = name, "table created");
        Ok(true)
    }

    /// Returns false when the table was missing and `if_exists` was set
    pub fn drop_table(&mut self, database: &str, name: &str, if_exists: bool) -> Result<bool> {
        let db = self.database_mut(database)?;

        match db.tables.remove(name) {
            Some(_) => {
                info!(database, table = name, "table dropped");
                Ok(true)
            }
            None if if_exists => Ok(false),
            None => Err(SqlCellError::not_found(
                "Table",
                format!("{}.{}", database, name),
            )),
        }
    }

    pub fn table(&self, database: &str, name: &str) -> Result<&Table> {
        self.database(database)?
            .tables
            .get(name)
            .ok_or_else(|| SqlCellError::not_found("Table", format!("{}.{}", database, name)))
    }

    pub fn table_mut(&mut self, database: &str, name: &str) -> Result<&mut Table> {
        self.database_mut(database)?
            .tables
            .get_mut(name)
            .ok_or_else(|| SqlCellError::not_found("Table", format!("{}.{}", database, name)))
    }

    pub fn database_names(&self) -> Vec<String> {
        self.databases.keys().cloned().collect()
    }
}
