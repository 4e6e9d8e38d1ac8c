use std::fmt;

use async_trait::async_trait;

use crate::{
    error::{Result, StoreError},
    record::Record,
    table::TableName,
};

/// A handle to one table in a relational store
#[async_trait]
pub trait Store: Send + Sync {
    /// The transaction type for this store
    type Transaction<'s>: StoreTransaction + 's
    where
        Self: 's;

    /// The table this handle operates on
    fn table(&self) -> &TableName;

    /// Create the table if it does not exist yet
    async fn ensure_table(&self) -> Result<()>;

    /// Number of committed rows in the table
    async fn count(&self) -> Result<i64>;

    /// All committed rows in the table
    async fn find_all(&self) -> Result<Vec<Record>>;

    /// Begin a new transaction
    async fn begin(&self) -> Result<Self::Transaction<'_>>;

    /// Release the underlying connection
    async fn close(&self);
}

/// The mutating half of a store, only reachable inside a transaction
#[async_trait]
pub trait StoreTransaction: Send {
    /// Insert a row, returning the number of rows affected
    async fn create(&mut self, record: &Record) -> Result<u64>;

    /// Delete rows matching `id = ? AND name = ?`, returning the number of rows affected
    async fn delete_where(&mut self, id: &str, name: &str) -> Result<u64>;

    /// Remove every row with referential-integrity checks suspended
    ///
    /// Checks are restored before returning, whether or not the truncate succeeded.
    async fn truncate(&mut self) -> Result<()>;

    /// Commit the transaction
    async fn commit(self) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self) -> Result<()>;

    /// Apply one mutation, returning the number of rows it affected
    ///
    /// Truncation reports zero affected rows.
    async fn apply(&mut self, mutation: &Mutation) -> Result<u64> {
        match mutation {
            Mutation::Create(record) => self.create(record).await,
            Mutation::Delete { id, name } => self.delete_where(id, name).await,
            Mutation::Truncate => self.truncate().await.map(|_| 0),
        }
    }
}

/// A single mutating step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create(Record),
    Delete { id: String, name: String },
    Truncate,
}

impl Mutation {
    /// Delete the row that `record` describes
    pub fn delete_matching(record: &Record) -> Self {
        Mutation::Delete {
            id: record.id.clone(),
            name: record.name.clone(),
        }
    }

    /// Check the affected-row count of a successful statement
    pub fn verify(&self, rows_affected: u64) -> Result<()> {
        match self {
            Mutation::Create(_) if rows_affected != 1 => Err(StoreError::UnexpectedRowsAffected {
                expected: 1,
                actual: rows_affected,
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Create(record) => write!(f, "create ({})", record),
            Mutation::Delete { id, name } => write!(f, "delete (ID: {}, Name: {})", id, name),
            Mutation::Truncate => f.write_str("truncate"),
        }
    }
}

/// Run one mutation inside its own transaction
///
/// Commits when the mutation succeeds and passes verification. Otherwise the
/// transaction is rolled back and the original error is returned; a failed
/// rollback is logged but does not replace that error.
pub async fn with_transaction<S>(store: &S, mutation: &Mutation) -> Result<u64>
where
    S: Store,
{
    let mut tx = store.begin().await?;
    tracing::debug!(table = %store.table(), %mutation, "Transaction started");

    let outcome = match tx.apply(mutation).await {
        Ok(rows) => mutation.verify(rows).map(|_| rows),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(rows) => {
            tx.commit().await?;
            tracing::debug!(table = %store.table(), %mutation, rows, "Transaction committed");
            Ok(rows)
        }
        Err(e) => {
            tracing::warn!(table = %store.table(), %mutation, error = %e, "Rolling back transaction");
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}
