use std::{
    future::Future,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use mysql_async::{prelude::*, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, TxOpts};

use crate::{
    backends::redact,
    config::StoreConfig,
    error::{Result, StoreError},
    record::Record,
    sql::{Dialect, Statements},
    store::{Store, StoreTransaction},
    table::TableName,
};

/// How executed statements are reported
#[derive(Debug, Clone, Copy)]
struct StatementLog {
    enabled: bool,
    slow_threshold: Duration,
}

impl StatementLog {
    async fn run<T, F>(self, sql: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, mysql_async::Error>>,
    {
        let started = Instant::now();
        let result = fut.await;
        let elapsed = started.elapsed();

        if self.enabled {
            if elapsed >= self.slow_threshold {
                tracing::warn!(sql, ?elapsed, "Slow statement");
            } else {
                tracing::info!(sql, ?elapsed, "Executed statement");
            }
        }

        result.map_err(StoreError::from)
    }
}

/// A MySQL table reached through mysql_async
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: Pool,
    table: TableName,
    statements: Statements,
    log: StatementLog,
}

impl MySqlStore {
    /// Connect to the database at `url` and bind the handle to `table`
    pub async fn connect(url: &str, table: TableName, config: &StoreConfig) -> Result<Self> {
        let opts = Opts::from_url(url)
            .map_err(|e| StoreError::ConnectionError(format!("{}: {}", redact(url), e)))?;
        let constraints = PoolConstraints::new(1, config.max_connections as usize)
            .ok_or_else(|| {
                StoreError::ConfigError(format!(
                    "invalid pool size {}",
                    config.max_connections
                ))
            })?;
        let opts = OptsBuilder::from_opts(opts)
            .pool_opts(PoolOpts::default().with_constraints(constraints));
        let pool = Pool::new(opts);

        // Fail at start-up rather than on the first query.
        let conn = tokio::time::timeout(config.connect_timeout, pool.get_conn())
            .await
            .map_err(|_| {
                StoreError::ConnectionError(format!(
                    "timed out after {:?} connecting to {}",
                    config.connect_timeout,
                    redact(url)
                ))
            })?
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
        drop(conn);

        tracing::info!(url = %redact(url), %table, "Connected to MySQL via mysql_async");
        let statements = Statements::new(&table, Dialect::MySql);
        Ok(Self {
            pool,
            table,
            statements,
            log: StatementLog {
                enabled: config.log_statements,
                slow_threshold: config.slow_threshold,
            },
        })
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl Store for MySqlStore {
    type Transaction<'s> = MySqlTransaction<'s>;

    fn table(&self) -> &TableName {
        &self.table
    }

    async fn ensure_table(&self) -> Result<()> {
        let mut conn = self.pool.get_conn().await?;
        let sql = self.statements.create_table.as_str();
        self.log.run(sql, conn.query_drop(sql)).await
    }

    async fn count(&self) -> Result<i64> {
        let mut conn = self.pool.get_conn().await?;
        let sql = self.statements.count.as_str();
        let count: Option<i64> = self.log.run(sql, conn.query_first(sql)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn find_all(&self) -> Result<Vec<Record>> {
        let mut conn = self.pool.get_conn().await?;
        let sql = self.statements.select_all.as_str();
        self.log
            .run(
                sql,
                conn.query_map(sql, |(id, name): (String, String)| Record { id, name }),
            )
            .await
    }

    async fn begin(&self) -> Result<Self::Transaction<'_>> {
        let tx = self
            .pool
            .start_transaction(TxOpts::default())
            .await
            .map_err(|e| StoreError::TransactionError(e.to_string()))?;
        Ok(MySqlTransaction {
            tx,
            statements: &self.statements,
            log: self.log,
        })
    }

    async fn close(&self) {
        if let Err(e) = self.pool.clone().disconnect().await {
            tracing::warn!(error = %e, "Failed to disconnect MySQL pool");
        }
    }
}

/// A MySQL transaction
pub struct MySqlTransaction<'s> {
    tx: mysql_async::Transaction<'static>,
    statements: &'s Statements,
    log: StatementLog,
}

#[async_trait]
impl<'s> StoreTransaction for MySqlTransaction<'s> {
    async fn create(&mut self, record: &Record) -> Result<u64> {
        let sql = self.statements.insert.as_str();
        let params = (record.id.as_str(), record.name.as_str());
        self.log.run(sql, self.tx.exec_drop(sql, params)).await?;
        Ok(self.tx.affected_rows())
    }

    async fn delete_where(&mut self, id: &str, name: &str) -> Result<u64> {
        let sql = self.statements.delete.as_str();
        self.log.run(sql, self.tx.exec_drop(sql, (id, name))).await?;
        Ok(self.tx.affected_rows())
    }

    async fn truncate(&mut self) -> Result<()> {
        let dialect = self.statements.dialect;
        let log = self.log;

        let disable = dialect.disable_fk_checks();
        log.run(disable, self.tx.query_drop(disable)).await?;

        let truncate = self.statements.truncate.as_str();
        let truncated = log.run(truncate, self.tx.query_drop(truncate)).await;
        // FOREIGN_KEY_CHECKS is session state on a pooled connection.
        let restore = dialect.restore_fk_checks();
        let restored = log.run(restore, self.tx.query_drop(restore)).await;

        truncated?;
        restored
    }

    async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::TransactionError(e.to_string()))
    }

    async fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StoreError::TransactionError(e.to_string()))
    }
}
