//! SQL text for the statements the runner needs, per dialect.

use crate::table::TableName;

/// The SQL flavour a backend speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    /// Statement that suspends referential-integrity checks for the session
    ///
    /// SQLite ignores `foreign_keys` inside a transaction, so it has to run
    /// before `BEGIN`.
    pub fn disable_fk_checks(self) -> &'static str {
        match self {
            Dialect::MySql => "SET FOREIGN_KEY_CHECKS=0",
            Dialect::Sqlite => "PRAGMA foreign_keys = OFF",
        }
    }

    /// Statement that restores referential-integrity checks
    pub fn restore_fk_checks(self) -> &'static str {
        match self {
            Dialect::MySql => "SET FOREIGN_KEY_CHECKS=1",
            Dialect::Sqlite => "PRAGMA foreign_keys = ON",
        }
    }
}

/// Prebuilt statements for one table
#[derive(Debug, Clone)]
pub struct Statements {
    pub create_table: String,
    pub count: String,
    pub select_all: String,
    pub insert: String,
    pub delete: String,
    pub truncate: String,
    pub dialect: Dialect,
}

impl Statements {
    pub fn new(table: &TableName, dialect: Dialect) -> Self {
        let t = table.quoted(dialect);
        let truncate = match dialect {
            Dialect::MySql => format!("TRUNCATE TABLE {}", t),
            Dialect::Sqlite => format!("DELETE FROM {}", t),
        };

        Self {
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {} (id VARCHAR(255) NOT NULL PRIMARY KEY, name VARCHAR(255) NOT NULL)",
                t
            ),
            count: format!("SELECT COUNT(*) FROM {}", t),
            select_all: format!("SELECT id, name FROM {}", t),
            insert: format!("INSERT INTO {} (id, name) VALUES (?, ?)", t),
            delete: format!("DELETE FROM {} WHERE id = ? AND name = ?", t),
            truncate,
            dialect,
        }
    }
}
