use std::fmt;

use thiserror::Error;

/// Error type for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The table name cannot be used as an SQL identifier
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    /// The connection string could not be understood
    #[error("Invalid connection string: {0}")]
    InvalidDsn(String),

    /// The requested driver is unknown or was not compiled in
    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    /// Failed to connect to the database
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error executing a query
    #[error("Query execution error: {0}")]
    QueryExecutionError(String),

    /// Error beginning, committing or rolling back a transaction
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// A row with the same primary key already exists
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// A statement touched a different number of rows than required
    #[error("Expected {expected} affected row(s), got {actual}")]
    UnexpectedRowsAffected { expected: u64, actual: u64 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "sqlx-backend")]
    #[error("SQLx error: {0}")]
    SqlxError(sqlx::Error),

    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    MySqlError(mysql_async::Error),
}

#[cfg(feature = "sqlx-backend")]
impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::DuplicateKey(db.message().to_string())
            }
            _ => StoreError::SqlxError(error),
        }
    }
}

#[cfg(feature = "mysql")]
impl From<mysql_async::Error> for StoreError {
    fn from(error: mysql_async::Error) -> Self {
        match &error {
            // ER_DUP_ENTRY
            mysql_async::Error::Server(server) if server.code == 1062 => {
                StoreError::DuplicateKey(server.message.clone())
            }
            _ => StoreError::MySqlError(error),
        }
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// The step of a run that was executing when something went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Count,
    Read,
    Create,
    Delete,
    Truncate,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::Count => "count",
            Phase::Read => "read",
            Phase::Create => "create",
            Phase::Delete => "delete",
            Phase::Truncate => "truncate",
        };
        f.write_str(name)
    }
}

/// A fatal error that ends a run
#[derive(Debug, Error)]
#[error("{}: {source}", failure_message(.phase))]
pub struct RunError {
    pub phase: Phase,
    #[source]
    pub source: StoreError,
}

impl RunError {
    pub fn new(phase: Phase, source: StoreError) -> Self {
        Self { phase, source }
    }

    /// Returns a closure that tags a store error with `phase`
    pub fn at(phase: Phase) -> impl FnOnce(StoreError) -> RunError {
        move |source| RunError::new(phase, source)
    }
}

fn failure_message(phase: &Phase) -> &'static str {
    match phase {
        Phase::Init => "Failed to connect to database",
        Phase::Count => "Failed to count rows",
        Phase::Read => "Failed to read rows",
        Phase::Create => "Failed to insert data",
        Phase::Delete => "Failed to delete data",
        Phase::Truncate => "Failed to truncate table",
    }
}
