//! Tracing setup for the runner

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "crud_runner=info,sqlx=warn";
const DEFAULT_FILTER_WITH_SQL: &str = "crud_runner=info,sqlx=warn,sqlx::query=info";

/// Initialize tracing for the application.
///
/// `RUST_LOG` takes precedence over the built-in filter. Output goes to
/// stderr so that the row listings on stdout stay clean.
pub fn init_tracing(color: bool, log_sql: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if log_sql {
            DEFAULT_FILTER_WITH_SQL
        } else {
            DEFAULT_FILTER
        })
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(color)
        .with_writer(std::io::stderr)
        .try_init();
}
