#[cfg(feature = "sqlx-mysql")]
mod sqlx_mysql;
#[cfg(feature = "sqlx-mysql")]
pub use sqlx_mysql::*;
