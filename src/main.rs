use std::{process::ExitCode, time::Duration};

use clap::{builder::FalseyValueParser, Parser};
use crud_runner::{
    app,
    env::{load_env, report_env},
    init_tracing, Driver, Record, RunOptions, Settings, StoreConfig, StoreError, TableName,
};

#[derive(Parser, Debug)]
#[clap(
    name = "crud-runner",
    about = "Insert, list, delete and truncate rows of a single table"
)]
struct Args {
    /// Connection string: a URL or a Go MySQL DSN
    #[clap(long, env = "DB_CONFIG")]
    database_url: String,

    /// The table to operate on
    #[clap(long, env = "TABLENAME")]
    table: String,

    /// Prefix prepended to the table name
    #[clap(long, env = "TABLE_PREFIX", default_value = "")]
    table_prefix: String,

    /// `sqlx`, `mysql-async`, `sqlite` or `memory`; detected from the URL when omitted
    #[clap(long, env = "DB_DRIVER", ignore_case = true)]
    driver: Option<Driver>,

    #[clap(long, env = "DB_MAX_CONNECTIONS", default_value_t = 1)]
    max_connections: u32,

    #[clap(long, env = "DB_CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    connect_timeout_secs: u64,

    /// Statements slower than this are logged as warnings
    #[clap(long, env = "SLOW_QUERY_THRESHOLD_MS", default_value_t = 1000)]
    slow_threshold_ms: u64,

    /// Don't log executed SQL
    #[clap(long, env = "NO_SQL_LOG", value_parser = FalseyValueParser::new())]
    no_sql_log: bool,

    /// Plain log output without colours
    #[clap(long, env = "NO_COLOR", value_parser = FalseyValueParser::new())]
    no_color: bool,

    /// Create the table first if it doesn't exist
    #[clap(long)]
    create_table: bool,

    /// Stop after the delete step
    #[clap(long)]
    skip_truncate: bool,

    /// ID of the inserted row
    #[clap(long, default_value = "1")]
    id: String,

    /// Name of the inserted row
    #[clap(long, default_value = "test")]
    name: String,
}

impl Args {
    fn into_settings(self) -> Result<Settings, StoreError> {
        let table = TableName::with_prefix(&self.table_prefix, &self.table)?;
        let store = StoreConfig::builder()
            .max_connections(self.max_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .slow_threshold(Duration::from_millis(self.slow_threshold_ms))
            .log_statements(!self.no_sql_log)
            .build();

        let mut settings = Settings::new(self.database_url, table);
        settings.driver = self.driver;
        settings.store = store;
        settings.run = RunOptions {
            record: Record::new(self.id, self.name),
            truncate: !self.skip_truncate,
            create_table: self.create_table,
        };
        Ok(settings)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // The env file has to be read before clap looks at the environment.
    let env_file = load_env();
    let args = Args::parse();

    init_tracing(!args.no_color, !args.no_sql_log);
    report_env(env_file);

    let settings = match args.into_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match app::run(&settings, std::io::stdout().lock()).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(phase = %e.phase, "Run aborted");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::{const_mutex, Mutex};

    const VARS: &[&str] = &[
        "DB_CONFIG",
        "TABLENAME",
        "TABLE_PREFIX",
        "DB_DRIVER",
        "DB_MAX_CONNECTIONS",
        "DB_CONNECT_TIMEOUT_SECS",
        "SLOW_QUERY_THRESHOLD_MS",
        "NO_SQL_LOG",
        "NO_COLOR",
    ];

    // The process environment is shared by every test thread.
    static ENV_LOCK: Mutex<()> = const_mutex(());

    fn parse_with_env(vars: &[(&str, &str)], argv: &[&str]) -> Result<Args, clap::Error> {
        let _guard = ENV_LOCK.lock();
        for name in VARS {
            std::env::remove_var(name);
        }
        for (name, value) in vars {
            std::env::set_var(name, value);
        }
        let result =
            Args::try_parse_from(std::iter::once("crud-runner").chain(argv.iter().copied()));
        for name in VARS {
            std::env::remove_var(name);
        }
        result
    }

    const BASE: &[(&str, &str)] = &[("DB_CONFIG", "memory:"), ("TABLENAME", "advertiser")];

    fn with_base<'a>(extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        BASE.iter().copied().chain(extra.iter().copied()).collect()
    }

    #[test]
    fn test_defaults_from_env() {
        let args = parse_with_env(BASE, &[]).unwrap();
        assert!(!args.no_color);
        assert!(!args.no_sql_log);

        let settings = args.into_settings().unwrap();
        assert_eq!(settings.database_url, "memory:");
        assert_eq!(settings.table.as_str(), "advertiser");
        assert_eq!(settings.driver, None);
        assert_eq!(settings.store.max_connections, 1);
        assert_eq!(settings.store.connect_timeout, Duration::from_secs(5));
        assert_eq!(settings.store.slow_threshold, Duration::from_millis(1000));
        assert!(settings.store.log_statements);
        assert_eq!(settings.run.record, Record::new("1", "test"));
        assert!(settings.run.truncate);
        assert!(!settings.run.create_table);
    }

    #[test]
    fn test_missing_connection_string_is_rejected() {
        assert!(parse_with_env(&[("TABLENAME", "advertiser")], &[]).is_err());
    }

    #[test]
    fn test_flags_override_env() {
        let args = parse_with_env(
            BASE,
            &["--database-url", "sqlite::memory:", "--table", "campaign"],
        )
        .unwrap();
        let settings = args.into_settings().unwrap();
        assert_eq!(settings.database_url, "sqlite::memory:");
        assert_eq!(settings.table.as_str(), "campaign");
    }

    #[test]
    fn test_boolean_env_values() {
        for (value, expected) in [
            ("1", true),
            ("true", true),
            ("yes", true),
            ("0", false),
            ("false", false),
            ("", false),
        ] {
            let args = parse_with_env(
                &with_base(&[("NO_COLOR", value), ("NO_SQL_LOG", value)]),
                &[],
            )
            .unwrap_or_else(|e| panic!("NO_COLOR={:?} rejected: {}", value, e));
            assert_eq!(args.no_color, expected, "NO_COLOR={:?}", value);
            assert_eq!(args.no_sql_log, expected, "NO_SQL_LOG={:?}", value);
        }
    }

    #[test]
    fn test_no_sql_log_disables_statement_logging() {
        let args = parse_with_env(BASE, &["--no-sql-log"]).unwrap();
        assert!(args.no_sql_log);
        assert!(!args.into_settings().unwrap().store.log_statements);
    }

    #[test]
    fn test_table_prefix_is_applied() {
        let args = parse_with_env(&with_base(&[("TABLE_PREFIX", "tmp_")]), &[]).unwrap();
        let settings = args.into_settings().unwrap();
        assert_eq!(settings.table.as_str(), "tmp_advertiser");
    }

    #[test]
    fn test_invalid_table_name_is_rejected() {
        let args = parse_with_env(
            &[("DB_CONFIG", "memory:"), ("TABLENAME", "advertiser; DROP TABLE x")],
            &[],
        )
        .unwrap();
        assert!(matches!(
            args.into_settings(),
            Err(StoreError::InvalidTableName(_))
        ));
    }

    #[test]
    fn test_pool_and_timing_from_env() {
        let args = parse_with_env(
            &with_base(&[
                ("DB_MAX_CONNECTIONS", "0"),
                ("DB_CONNECT_TIMEOUT_SECS", "2"),
                ("SLOW_QUERY_THRESHOLD_MS", "250"),
            ]),
            &[],
        )
        .unwrap();
        let settings = args.into_settings().unwrap();
        assert_eq!(settings.store.max_connections, 1);
        assert_eq!(settings.store.connect_timeout, Duration::from_secs(2));
        assert_eq!(settings.store.slow_threshold, Duration::from_millis(250));
    }

    #[test]
    fn test_driver_names_and_aliases() {
        for (value, expected) in [
            ("sqlx", Driver::Sqlx),
            ("sqlx-mysql", Driver::Sqlx),
            ("MYSQL-ASYNC", Driver::MysqlAsync),
            ("mysql_async", Driver::MysqlAsync),
            ("sqlx-sqlite", Driver::Sqlite),
            ("Memory", Driver::Memory),
        ] {
            let args = parse_with_env(&with_base(&[("DB_DRIVER", value)]), &[]).unwrap();
            assert_eq!(args.driver, Some(expected), "DB_DRIVER={}", value);
        }
        assert!(parse_with_env(BASE, &["--driver", "postgres"]).is_err());
    }

    #[test]
    fn test_run_options_from_flags() {
        let args = parse_with_env(
            BASE,
            &["--skip-truncate", "--create-table", "--id", "7", "--name", "seven"],
        )
        .unwrap();
        let settings = args.into_settings().unwrap();
        assert!(!settings.run.truncate);
        assert!(settings.run.create_table);
        assert_eq!(settings.run.record, Record::new("7", "seven"));
    }
}
