//! Name-to-driver lookup used by the by-name constructors.

use crate::driver::Driver;
use crate::drivers::SqlxDriver;
use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Explicit driver table. There is no process-wide registry; callers either
/// build one or use [`DriverRegistry::with_defaults`].
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the bundled sqlx driver for every supported backend,
    /// plus `sqlite3` as an alias for `sqlite`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for db_type in [
            DatabaseType::SQLite,
            DatabaseType::PostgreSQL,
            DatabaseType::MySQL,
        ] {
            registry.register(db_type.driver_name(), Arc::new(SqlxDriver::new(db_type)));
        }
        registry.register("sqlite3", Arc::new(SqlxDriver::sqlite()));
        registry
    }

    /// Register `driver` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, driver: Arc<dyn Driver>) {
        self.drivers.insert(name.into(), driver);
    }

    pub fn get(&self, name: &str) -> DbResult<Arc<dyn Driver>> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::unknown_driver(name))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_all_backends() {
        let registry = DriverRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec!["mysql", "postgres", "sqlite", "sqlite3"]
        );
        assert_eq!(registry.get("sqlite").unwrap().name(), "sqlite");
        assert_eq!(registry.get("sqlite3").unwrap().name(), "sqlite");
    }

    #[test]
    fn test_unknown_driver() {
        let registry = DriverRegistry::new();
        assert_eq!(
            registry.get("sqlite").err(),
            Some(DbError::unknown_driver("sqlite"))
        );
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = DriverRegistry::with_defaults();
        registry.register("sqlite", Arc::new(SqlxDriver::new(DatabaseType::PostgreSQL)));
        assert_eq!(registry.get("sqlite").unwrap().name(), "postgres");
    }
}
