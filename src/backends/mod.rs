use std::fmt;

use clap::ValueEnum;

use crate::error::{Result, StoreError};

pub mod memory;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "sqlx-sqlite")]
pub mod sqlite;
#[cfg(feature = "sqlx-mysql")]
pub mod sqlx;

pub use memory::MemoryStore;
#[cfg(feature = "mysql")]
pub use mysql::MySqlStore;
#[cfg(feature = "sqlx-sqlite")]
pub use sqlite::SqliteStore;
#[cfg(feature = "sqlx-mysql")]
pub use self::sqlx::SqlxMySqlStore;

/// The backend used to talk to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Driver {
    /// MySQL through sqlx
    #[clap(alias = "sqlx-mysql")]
    Sqlx,
    /// MySQL through mysql_async
    #[clap(alias = "mysql_async")]
    MysqlAsync,
    /// SQLite through sqlx
    #[clap(alias = "sqlx-sqlite")]
    Sqlite,
    /// In-process table, nothing is persisted
    Memory,
}

impl Driver {
    /// Whether support for this driver was compiled in
    pub fn is_available(self) -> bool {
        match self {
            Driver::Sqlx => cfg!(feature = "sqlx-mysql"),
            Driver::MysqlAsync => cfg!(feature = "mysql"),
            Driver::Sqlite => cfg!(feature = "sqlx-sqlite"),
            Driver::Memory => true,
        }
    }

    /// Pick a driver for a normalised connection URL
    pub fn detect(url: &str) -> Result<Self> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| StoreError::InvalidDsn(format!("no scheme in '{}'", redact(url))))?;

        match scheme.as_str() {
            "mysql" | "mariadb" => {
                if Driver::Sqlx.is_available() {
                    Ok(Driver::Sqlx)
                } else if Driver::MysqlAsync.is_available() {
                    Ok(Driver::MysqlAsync)
                } else {
                    Err(StoreError::UnsupportedDriver(
                        "no MySQL driver compiled in (enable `sqlx-mysql` or `mysql`)".to_string(),
                    ))
                }
            }
            "sqlite" => Ok(Driver::Sqlite),
            "memory" => Ok(Driver::Memory),
            other => Err(StoreError::UnsupportedDriver(format!(
                "unknown URL scheme '{}'",
                other
            ))),
        }
    }

    /// Use the requested driver, or detect one, and make sure it is compiled in
    pub fn resolve(requested: Option<Driver>, url: &str) -> Result<Self> {
        let driver = match requested {
            Some(driver) => driver,
            None => Driver::detect(url)?,
        };
        if !driver.is_available() {
            return Err(StoreError::UnsupportedDriver(format!(
                "driver '{}' was not compiled in",
                driver
            )));
        }
        Ok(driver)
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{:?}", self),
        }
    }
}

/// Strip credentials from a URL before it is logged
pub fn redact(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => match url.rsplit_once('@') {
            Some((_, tail)) => format!("***@{}", tail),
            None => url.to_string(),
        },
    }
}
