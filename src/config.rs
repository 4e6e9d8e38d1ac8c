use std::time::Duration;

use crate::{backends::Driver, record::Record, table::TableName};

/// Connection tuning for a store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of connections held open
    pub max_connections: u32,
    /// Maximum time to wait for a connection
    pub connect_timeout: Duration,
    /// Statements slower than this are logged as warnings
    pub slow_threshold: Duration,
    /// Log every executed statement (never its parameters)
    pub log_statements: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            slow_threshold: Duration::from_secs(1),
            log_statements: true,
        }
    }
}

impl StoreConfig {
    /// Create a new builder starting from the defaults
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for store configuration
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Set the maximum number of connections; zero is bumped to one
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.config.max_connections = max_connections.max(1);
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.config.connect_timeout = connect_timeout;
        self
    }

    /// Set the slow statement threshold
    pub fn slow_threshold(mut self, slow_threshold: Duration) -> Self {
        self.config.slow_threshold = slow_threshold;
        self
    }

    /// Turn statement logging on or off
    pub fn log_statements(mut self, log_statements: bool) -> Self {
        self.config.log_statements = log_statements;
        self
    }

    /// Build the store configuration
    pub fn build(self) -> StoreConfig {
        self.config
    }
}

/// What a run does once connected
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// The row inserted and then deleted
    pub record: Record,
    /// Whether to finish with a truncate
    pub truncate: bool,
    /// Create the table before starting if it is missing
    pub create_table: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            record: Record::default(),
            truncate: true,
            create_table: false,
        }
    }
}

/// Everything needed to connect and run
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub table: TableName,
    /// Explicit driver; detected from the URL when absent
    pub driver: Option<Driver>,
    pub store: StoreConfig,
    pub run: RunOptions,
}

impl Settings {
    pub fn new(database_url: impl Into<String>, table: TableName) -> Self {
        Self {
            database_url: database_url.into(),
            table,
            driver: None,
            store: StoreConfig::default(),
            run: RunOptions::default(),
        }
    }
}
