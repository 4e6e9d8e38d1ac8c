//! Runs a fixed create, read, delete and truncate exercise against one table
//! and prints what happened.
//!
//! The store is reached through the [`Store`] trait; every mutating step runs
//! inside its own transaction via [`with_transaction`].

pub mod app;
pub mod backends;
pub mod config;
pub mod dsn;
pub mod env;
pub mod error;
pub mod logging;
pub mod record;
pub mod runner;
pub mod sql;
pub mod store;
pub mod table;

pub use backends::{Driver, MemoryStore};
pub use config::{RunOptions, Settings, StoreConfig};
pub use error::{Phase, Result, RunError, StoreError};
pub use logging::init_tracing;
pub use record::Record;
pub use runner::{RunReport, Runner};
pub use store::{with_transaction, Mutation, Store, StoreTransaction};
pub use table::TableName;
