//! SQL port: parameterized queries used by SQL triggers.

use std::sync::Arc;

use async_trait::async_trait;

use cadence_domain::automation::Parameters;
use cadence_domain::error::CadenceError;

/// One result row: column name → stringified value, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlRow {
    columns: Vec<(String, String)>,
}

impl SqlRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.columns.push((column.into(), value.into()));
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(column, value);
        self
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl IntoIterator for SqlRow {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

/// An open database connection.
#[async_trait]
pub trait SqlConnection: Send + Sync {
    /// Run `sql`, binding any `@name` placeholder that is a key of `parameters`.
    async fn query(&self, sql: &str, parameters: &Parameters) -> Result<Vec<SqlRow>, CadenceError>;
}

/// Creates connections from the connection strings stored in trigger settings.
pub trait SqlConnector: Send + Sync {
    /// Open (or lazily prepare) a connection.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection string is unusable.
    fn connect(&self, connection_string: &str) -> Result<Arc<dyn SqlConnection>, CadenceError>;
}
