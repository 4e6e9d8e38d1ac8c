//! An in-process table, used for dry runs.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    error::{Result, StoreError},
    record::Record,
    store::{Store, StoreTransaction},
    table::TableName,
};

/// A table held in memory
///
/// `id` acts as the primary key. Transactions work on a staged copy of the
/// rows, so nothing they do is visible until commit.
#[derive(Debug)]
pub struct MemoryStore {
    table: TableName,
    rows: Mutex<Vec<Record>>,
    stats: Mutex<TransactionStats>,
    #[cfg(test)]
    fail_on: Option<&'static str>,
}

/// Counters of finished transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub committed: usize,
    pub rolled_back: usize,
}

impl MemoryStore {
    pub fn new(table: TableName) -> Self {
        Self::with_rows(table, Vec::new())
    }

    /// Create a store that already holds `rows`
    pub fn with_rows(table: TableName, rows: Vec<Record>) -> Self {
        Self {
            table,
            rows: Mutex::new(rows),
            stats: Mutex::new(TransactionStats::default()),
            #[cfg(test)]
            fail_on: None,
        }
    }

    /// Make the named mutation ("create", "delete" or "truncate") fail
    #[cfg(test)]
    pub(crate) fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    /// Snapshot of the committed rows
    pub fn rows(&self) -> Vec<Record> {
        self.rows.lock().clone()
    }

    pub fn stats(&self) -> TransactionStats {
        *self.stats.lock()
    }

    #[cfg(test)]
    fn check_fault(&self, operation: &str) -> Result<()> {
        if self.fail_on == Some(operation) {
            return Err(StoreError::QueryExecutionError(format!(
                "injected {} failure",
                operation
            )));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_fault(&self, _operation: &str) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Transaction<'s> = MemoryTransaction<'s>;

    fn table(&self) -> &TableName {
        &self.table
    }

    async fn ensure_table(&self) -> Result<()> {
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.rows.lock().len() as i64)
    }

    async fn find_all(&self) -> Result<Vec<Record>> {
        Ok(self.rows())
    }

    async fn begin(&self) -> Result<Self::Transaction<'_>> {
        Ok(MemoryTransaction {
            staged: self.rows(),
            store: self,
        })
    }

    async fn close(&self) {}
}

/// A transaction over a [`MemoryStore`]
pub struct MemoryTransaction<'s> {
    store: &'s MemoryStore,
    staged: Vec<Record>,
}

#[async_trait]
impl<'s> StoreTransaction for MemoryTransaction<'s> {
    async fn create(&mut self, record: &Record) -> Result<u64> {
        self.store.check_fault("create")?;
        if self.staged.iter().any(|row| row.id == record.id) {
            return Err(StoreError::DuplicateKey(format!(
                "Duplicate entry '{}' for key '{}.PRIMARY'",
                record.id, self.store.table
            )));
        }
        self.staged.push(record.clone());
        Ok(1)
    }

    async fn delete_where(&mut self, id: &str, name: &str) -> Result<u64> {
        self.store.check_fault("delete")?;
        let before = self.staged.len();
        self.staged.retain(|row| !row.matches(id, name));
        Ok((before - self.staged.len()) as u64)
    }

    async fn truncate(&mut self) -> Result<()> {
        self.store.check_fault("truncate")?;
        self.staged.clear();
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        *self.store.rows.lock() = self.staged;
        self.store.stats.lock().committed += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.store.stats.lock().rolled_back += 1;
        Ok(())
    }
}
