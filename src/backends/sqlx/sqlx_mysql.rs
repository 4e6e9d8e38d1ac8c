use std::str::FromStr;

use async_trait::async_trait;
use log::LevelFilter;
use sqlx::{
    mysql::{MySqlConnectOptions, MySqlPoolOptions},
    ConnectOptions, MySql, MySqlPool, Transaction,
};

use crate::{
    backends::redact,
    config::StoreConfig,
    error::{Result, StoreError},
    record::Record,
    sql::{Dialect, Statements},
    store::{Store, StoreTransaction},
    table::TableName,
};

/// A MySQL table reached through sqlx
#[derive(Debug, Clone)]
pub struct SqlxMySqlStore {
    pool: MySqlPool,
    table: TableName,
    statements: Statements,
}

impl SqlxMySqlStore {
    /// Connect to the database at `url` and bind the handle to `table`
    pub async fn connect(url: &str, table: TableName, config: &StoreConfig) -> Result<Self> {
        let mut options = MySqlConnectOptions::from_str(url)
            .map_err(|e| StoreError::ConnectionError(format!("{}: {}", redact(url), e)))?;
        options = if config.log_statements {
            options
                .log_statements(LevelFilter::Info)
                .log_slow_statements(LevelFilter::Warn, config.slow_threshold)
        } else {
            options.disable_statement_logging()
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        tracing::info!(url = %redact(url), %table, "Connected to MySQL via sqlx");
        Ok(Self::from_pool(pool, table))
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: MySqlPool, table: TableName) -> Self {
        let statements = Statements::new(&table, Dialect::MySql);
        Self {
            pool,
            table,
            statements,
        }
    }

    /// Get a reference to the underlying SQLx MySqlPool
    pub fn sqlx_pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqlxMySqlStore {
    type Transaction<'s> = SqlxMySqlTransaction<'s>;

    fn table(&self) -> &TableName {
        &self.table
    }

    async fn ensure_table(&self) -> Result<()> {
        sqlx::query(&self.statements.create_table)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&self.statements.count)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn find_all(&self) -> Result<Vec<Record>> {
        let rows: Vec<(String, String)> = sqlx::query_as(&self.statements.select_all)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Record::from).collect())
    }

    async fn begin(&self) -> Result<Self::Transaction<'_>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::TransactionError(e.to_string()))?;
        Ok(SqlxMySqlTransaction {
            tx,
            statements: &self.statements,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// A transaction holding one pooled MySQL connection
pub struct SqlxMySqlTransaction<'s> {
    tx: Transaction<'static, MySql>,
    statements: &'s Statements,
}

#[async_trait]
impl<'s> StoreTransaction for SqlxMySqlTransaction<'s> {
    async fn create(&mut self, record: &Record) -> Result<u64> {
        let result = sqlx::query(&self.statements.insert)
            .bind(&record.id)
            .bind(&record.name)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_where(&mut self, id: &str, name: &str) -> Result<u64> {
        let result = sqlx::query(&self.statements.delete)
            .bind(id)
            .bind(name)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn truncate(&mut self) -> Result<()> {
        let dialect = self.statements.dialect;
        sqlx::query(dialect.disable_fk_checks())
            .execute(&mut *self.tx)
            .await?;

        let truncated = sqlx::query(&self.statements.truncate)
            .execute(&mut *self.tx)
            .await;
        // FOREIGN_KEY_CHECKS is session state on a pooled connection.
        let restored = sqlx::query(dialect.restore_fk_checks())
            .execute(&mut *self.tx)
            .await;

        truncated?;
        restored?;
        Ok(())
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
