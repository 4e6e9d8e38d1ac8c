use std::io::Write;

#[cfg(feature = "mysql")]
use crate::backends::MySqlStore;
#[cfg(feature = "sqlx-sqlite")]
use crate::backends::SqliteStore;
#[cfg(feature = "sqlx-mysql")]
use crate::backends::SqlxMySqlStore;
use crate::{
    backends::{redact, Driver, MemoryStore},
    config::{RunOptions, Settings},
    dsn,
    error::{Phase, RunError, StoreError},
    runner::{RunReport, Runner},
    store::Store,
};

/// Connect with the configured driver and run the exercise
pub async fn run<W: Write>(settings: &Settings, out: W) -> Result<RunReport, RunError> {
    let url = dsn::normalize(&settings.database_url).map_err(RunError::at(Phase::Init))?;
    let driver = Driver::resolve(settings.driver, &url).map_err(RunError::at(Phase::Init))?;
    tracing::info!(%driver, url = %redact(&url), table = %settings.table, "Starting run");

    let table = settings.table.clone();
    let config = &settings.store;
    let options = settings.run.clone();

    match driver {
        #[cfg(feature = "sqlx-mysql")]
        Driver::Sqlx => {
            let store = SqlxMySqlStore::connect(&url, table, config)
                .await
                .map_err(RunError::at(Phase::Init))?;
            run_store(&store, out, options).await
        }
        #[cfg(feature = "mysql")]
        Driver::MysqlAsync => {
            let store = MySqlStore::connect(&url, table, config)
                .await
                .map_err(RunError::at(Phase::Init))?;
            run_store(&store, out, options).await
        }
        #[cfg(feature = "sqlx-sqlite")]
        Driver::Sqlite => {
            let store = SqliteStore::connect(&url, table, config)
                .await
                .map_err(RunError::at(Phase::Init))?;
            run_store(&store, out, options).await
        }
        Driver::Memory => {
            let store = MemoryStore::new(table);
            run_store(&store, out, options).await
        }
        #[allow(unreachable_patterns)]
        other => Err(RunError::new(
            Phase::Init,
            StoreError::UnsupportedDriver(other.to_string()),
        )),
    }
}

/// Run against an already connected store, closing it afterwards
pub async fn run_store<S, W>(store: &S, out: W, options: RunOptions) -> Result<RunReport, RunError>
where
    S: Store,
    W: Write,
{
    let result = Runner::new(store, out, options).run().await;
    store.close().await;
    result
}
