use std::fmt::Display;

use crate::{
    error::{Result, StoreError},
    sql::Dialect,
};

/// MySQL's limit on identifier length
pub const MAX_TABLE_NAME_LEN: usize = 64;

/// A validated table name
///
/// Table names end up interpolated into SQL text, so only plain identifiers
/// are accepted: ASCII letters, digits, `_` and `$`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    /// Create a table name, rejecting anything that is not a plain identifier
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidTableName(
                "table name must not be empty".to_string(),
            ));
        }
        if name.len() > MAX_TABLE_NAME_LEN {
            return Err(StoreError::InvalidTableName(format!(
                "'{}' is longer than {} characters",
                name, MAX_TABLE_NAME_LEN
            )));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '$'))
        {
            return Err(StoreError::InvalidTableName(format!(
                "'{}' contains unsupported character {:?}",
                name, bad
            )));
        }
        Ok(Self(name.to_string()))
    }

    /// Apply the naming strategy: an optional prefix in front of the singular name
    pub fn with_prefix(prefix: &str, name: &str) -> Result<Self> {
        Self::new(&format!("{}{}", prefix.trim(), name.trim()))
    }

    /// Get the table name as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name quoted for use in a statement of the given dialect
    pub fn quoted(&self, dialect: Dialect) -> String {
        match dialect {
            Dialect::MySql => format!("`{}`", self.0),
            Dialect::Sqlite => format!("\"{}\"", self.0),
        }
    }
}

impl Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_identifiers() {
        assert_eq!(TableName::new("advertiser").unwrap().as_str(), "advertiser");
        assert_eq!(TableName::new(" ad_2024$ ").unwrap().as_str(), "ad_2024$");
    }

    #[test]
    fn test_rejects_injection_and_empty_names() {
        assert!(TableName::new("").is_err());
        assert!(TableName::new("   ").is_err());
        assert!(TableName::new("advertiser; DROP TABLE x").is_err());
        assert!(TableName::new("ad`vertiser").is_err());
        assert!(TableName::new(&"a".repeat(MAX_TABLE_NAME_LEN + 1)).is_err());
        assert!(TableName::new(&"a".repeat(MAX_TABLE_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_prefix_is_prepended_without_pluralising() {
        let table = TableName::with_prefix("app_", "advertiser").unwrap();
        assert_eq!(table.as_str(), "app_advertiser");

        let table = TableName::with_prefix("", "advertiser").unwrap();
        assert_eq!(table.as_str(), "advertiser");
    }

    #[test]
    fn test_quoting_per_dialect() {
        let table = TableName::new("advertiser").unwrap();
        assert_eq!(table.quoted(Dialect::MySql), "`advertiser`");
        assert_eq!(table.quoted(Dialect::Sqlite), "\"advertiser\"");
    }
}
