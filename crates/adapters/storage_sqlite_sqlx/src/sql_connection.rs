//! `SQLite` implementation of the SQL trigger ports.
//!
//! Queries name their inputs as `@name` placeholders. Before execution each
//! placeholder is rewritten to a positional `?` bound to the matching
//! parameter, or to `NULL` when the parameter map has no such key. Text
//! inside quotes is left alone.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};

use cadence_app::ports::{SqlConnection, SqlConnector, SqlRow};
use cadence_domain::automation::Parameters;
use cadence_domain::error::CadenceError;

use crate::error::StorageError;
use crate::pool::Database;

/// Rewrite `@name` placeholders to positional ones.
///
/// Returns the rewritten statement and the values to bind, in order.
pub(crate) fn bind_named<'p>(sql: &str, parameters: &'p Parameters) -> (String, Vec<&'p str>) {
    let mut statement = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut quote = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(open), c) => {
                if c == open {
                    quote = None;
                }
                statement.push(c);
            }
            (None, '\'' | '"') => {
                quote = Some(c);
                statement.push(c);
            }
            (None, '@') if chars.peek().is_some_and(|n| is_name_char(*n)) => {
                let mut name = String::new();
                while let Some(n) = chars.next_if(|n| is_name_char(*n)) {
                    name.push(n);
                }
                if let Some(value) = parameters.get(&name) {
                    statement.push('?');
                    values.push(value.as_str());
                } else {
                    tracing::trace!(%name, "unbound placeholder replaced with NULL");
                    statement.push_str("NULL");
                }
            }
            (None, c) => statement.push(c),
        }
    }
    (statement, values)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Column value as text. `NULL` becomes the empty string, blobs are hex encoded.
fn stringify(row: &SqliteRow, index: usize) -> Result<String, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(String::new());
    }
    let type_name = raw.type_info().name().to_string();
    match type_name.as_str() {
        "INTEGER" => Ok(row.try_get_unchecked::<i64, _>(index)?.to_string()),
        "REAL" => Ok(row.try_get_unchecked::<f64, _>(index)?.to_string()),
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get_unchecked(index)?;
            let mut hex = String::with_capacity(bytes.len() * 2);
            for byte in bytes {
                let _ = write!(hex, "{byte:02x}");
            }
            Ok(hex)
        }
        _ => row.try_get_unchecked::<String, _>(index),
    }
}

fn to_sql_row(row: &SqliteRow) -> Result<SqlRow, sqlx::Error> {
    let mut out = SqlRow::new();
    for column in row.columns() {
        out.push(column.name(), stringify(row, column.ordinal())?);
    }
    Ok(out)
}

/// Connection handed to SQL triggers.
#[derive(Debug, Clone)]
pub struct SqliteConnection {
    pool: SqlitePool,
}

impl SqliteConnection {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SqlConnection for SqliteConnection {
    #[tracing::instrument(skip(self, parameters))]
    async fn query(&self, sql: &str, parameters: &Parameters) -> Result<Vec<SqlRow>, CadenceError> {
        let (statement, values) = bind_named(sql, parameters);
        let mut query = sqlx::query(&statement);
        for value in values {
            query = query.bind(value);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        tracing::trace!(rows = rows.len(), "query finished");
        let rows = rows
            .iter()
            .map(to_sql_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(rows)
    }
}

/// Opens [`SqliteConnection`]s through a [`Database`].
///
/// An empty connection string, or the database's own URL, shares its pool.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    database: Database,
}

impl SqliteConnector {
    #[must_use]
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

impl SqlConnector for SqliteConnector {
    fn connect(&self, connection_string: &str) -> Result<Arc<dyn SqlConnection>, CadenceError> {
        let pool = self.database.resolve(connection_string)?;
        Ok(Arc::new(SqliteConnection::new(pool)))
    }
}
