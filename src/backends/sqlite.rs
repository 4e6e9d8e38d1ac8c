use std::str::FromStr;

use async_trait::async_trait;
use log::LevelFilter;
use sqlx::{
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    ConnectOptions, Sqlite, SqlitePool,
};

use crate::{
    config::StoreConfig,
    error::{Result, StoreError},
    record::Record,
    sql::{Dialect, Statements},
    store::{Store, StoreTransaction},
    table::TableName,
};

const DEFER_FOREIGN_KEYS: &str = "PRAGMA defer_foreign_keys = ON";

/// A SQLite table reached through sqlx
///
/// SQLite has no `TRUNCATE`, so truncation is a `DELETE`. Foreign keys can
/// only be switched off outside a transaction, which is why transactions
/// hold their own pooled connection and only issue `BEGIN` on first use.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    table: TableName,
    statements: Statements,
}

impl SqliteStore {
    pub async fn connect(url: &str, table: TableName, config: &StoreConfig) -> Result<Self> {
        let mut options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::ConnectionError(format!("{}: {}", url, e)))?
            .create_if_missing(true);
        options = if config.log_statements {
            options
                .log_statements(LevelFilter::Info)
                .log_slow_statements(LevelFilter::Warn, config.slow_threshold)
        } else {
            options.disable_statement_logging()
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        tracing::info!(%url, %table, "Connected to SQLite");
        Ok(Self::from_pool(pool, table))
    }

    pub fn from_pool(pool: SqlitePool, table: TableName) -> Self {
        let statements = Statements::new(&table, Dialect::Sqlite);
        Self {
            pool,
            table,
            statements,
        }
    }

    pub fn sqlx_pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    type Transaction<'s> = SqliteTransaction<'s>;

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
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::TransactionError(e.to_string()))?;
        Ok(SqliteTransaction {
            conn,
            statements: &self.statements,
            open: false,
            restore_foreign_keys: false,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// A transaction on one pooled connection
///
/// `BEGIN` is sent lazily so that a truncate running first can turn
/// `foreign_keys` off beforehand. The setting is restored once the
/// transaction ends.
pub struct SqliteTransaction<'s> {
    conn: PoolConnection<Sqlite>,
    statements: &'s Statements,
    open: bool,
    restore_foreign_keys: bool,
}

impl SqliteTransaction<'_> {
    async fn start(&mut self) -> Result<()> {
        if !self.open {
            self.control("BEGIN").await?;
            self.open = true;
        }
        Ok(())
    }

    async fn control(&mut self, statement: &str) -> Result<()> {
        sqlx::query(statement)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| StoreError::TransactionError(e.to_string()))?;
        Ok(())
    }

    async fn finish(&mut self, statement: &str) -> Result<()> {
        let mut ended = Ok(());
        if self.open {
            ended = self.control(statement).await;
            if ended.is_ok() {
                self.open = false;
            } else if statement == "COMMIT" {
                // A failed COMMIT leaves the transaction open
                match self.control("ROLLBACK").await {
                    Ok(()) => self.open = false,
                    Err(e) => tracing::warn!(error = %e, "Rollback after failed commit also failed"),
                }
            }
        }

        if self.restore_foreign_keys && !self.open {
            sqlx::query(self.statements.dialect.restore_fk_checks())
                .execute(&mut *self.conn)
                .await?;
            self.restore_foreign_keys = false;
        }
        ended
    }
}

#[async_trait]
impl<'s> StoreTransaction for SqliteTransaction<'s> {
    async fn create(&mut self, record: &Record) -> Result<u64> {
        self.start().await?;
        let result = sqlx::query(&self.statements.insert)
            .bind(&record.id)
            .bind(&record.name)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_where(&mut self, id: &str, name: &str) -> Result<u64> {
        self.start().await?;
        let result = sqlx::query(&self.statements.delete)
            .bind(id)
            .bind(name)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected())
    }

    async fn truncate(&mut self) -> Result<()> {
        if self.open {
            // foreign_keys is a no-op inside a transaction
            sqlx::query(DEFER_FOREIGN_KEYS)
                .execute(&mut *self.conn)
                .await?;
        } else {
            let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
                .fetch_one(&mut *self.conn)
                .await?;
            if enabled != 0 {
                sqlx::query(self.statements.dialect.disable_fk_checks())
                    .execute(&mut *self.conn)
                    .await?;
                self.restore_foreign_keys = true;
            }
            self.start().await?;
        }

        sqlx::query(&self.statements.truncate)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(mut self) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if self.open || self.restore_foreign_keys {
            tracing::warn!("SQLite transaction was not committed or rolled back explicitly");
            // The connection may still be inside BEGIN or have foreign keys off
            self.conn.close_on_drop();
        }
    }
}
