use std::fmt;

/// A single row of the target table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    pub id: String,
    pub name: String,
}

impl Record {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Whether this row matches a delete predicate of `id = ? AND name = ?`
    pub fn matches(&self, id: &str, name: &str) -> bool {
        self.id == id && self.name == name
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new("1", "test")
    }
}

impl From<(String, String)> for Record {
    fn from((id, name): (String, String)) -> Self {
        Self { id, name }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID: {}, Name: {}", self.id, self.name)
    }
}
