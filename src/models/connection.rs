//! Backends spoken by the bundled driver, and data source name helpers.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// A SQL backend reachable through the bundled sqlx driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Backend named by the scheme of a data source name.
    ///
    /// Bare SQLite paths carry no scheme and yield `None`.
    pub fn from_connection_string(dsn: &str) -> Option<Self> {
        let (scheme, _) = dsn.split_once(':')?;
        match scheme.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::PostgreSQL),
            "mysql" | "mariadb" => Some(Self::MySQL),
            "sqlite" => Some(Self::SQLite),
            _ => None,
        }
    }

    /// Name the bundled driver is registered under.
    pub fn driver_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "postgres",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        })
    }
}

/// Data source name safe to log: any password is replaced by `****`.
///
/// Strings that are not URLs (e.g. `:memory:`) come back unchanged.
pub fn mask_dsn(dsn: &str) -> String {
    let Ok(mut url) = Url::parse(dsn) else {
        return dsn.to_string();
    };
    if url.password().is_none() || url.set_password(Some("****")).is_err() {
        return dsn.to_string();
    }
    url.to_string()
}
