//! SQL trigger: met when every query in its list returns at least one row.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use cadence_domain::automation::{AutomationResult, Parameters, TriggerDefinition};
use cadence_domain::error::{CadenceError, ValidationError};

use super::schema::{PropertySchema, PropertyType, TriggerSchema};
use super::{Trigger, TriggerHeader, delegate_header};
use crate::ports::{SqlConnection, SqlConnector};

/// Runs its queries in order against one connection.
///
/// Each query may reference any key of the incoming parameter map as an
/// `@name` placeholder. Evaluation stops at the first query that returns no
/// rows. When all return rows, the columns of the first row of the last
/// query become the trigger's output parameters.
pub struct SqlTrigger {
    header: TriggerHeader,
    connection: Arc<dyn SqlConnection>,
    queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Settings {
    connection_string: String,
    #[serde(default)]
    queries: Vec<String>,
}

impl SqlTrigger {
    pub const KIND: &'static str = "sql";

    #[must_use]
    pub fn new(
        connection: Arc<dyn SqlConnection>,
        id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            header: TriggerHeader::new(id, description),
            connection,
            queries: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.queries.push(query.into());
        self
    }

    /// Build from a stored definition, opening the connection through `connector`.
    ///
    /// # Errors
    ///
    /// Returns an error when the settings are malformed or the connection
    /// string is rejected by the connector.
    pub fn from_definition(
        definition: &TriggerDefinition,
        connector: &dyn SqlConnector,
    ) -> Result<Self, CadenceError> {
        let settings: Settings = definition.decode_settings()?;
        let connection = connector.connect(&settings.connection_string)?;
        let mut trigger = Self::new(connection, definition.id.clone(), definition.description.clone());
        trigger.queries = settings.queries;
        Ok(trigger)
    }

    #[must_use]
    pub fn schema() -> TriggerSchema {
        TriggerSchema::new(Self::KIND)
            .required(
                "connection_string",
                PropertySchema::new(PropertyType::String, "Connection string")
                    .format("connection-string"),
            )
            .required(
                "queries",
                PropertySchema::new(PropertyType::Array, "Queries")
                    .description("Run in order; `@name` placeholders are bound from parameters")
                    .format("sql"),
            )
    }

    #[must_use]
    pub fn queries(&self) -> &[String] {
        &self.queries
    }
}

impl std::fmt::Debug for SqlTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlTrigger")
            .field("header", &self.header)
            .field("queries", &self.queries)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Trigger for SqlTrigger {
    delegate_header!();

    async fn execute(&self, parameters: &Parameters) -> Result<AutomationResult, CadenceError> {
        if self.queries.is_empty() {
            tracing::warn!(trigger = %self.header.id, "sql trigger has no queries");
            return Ok(AutomationResult::not_met());
        }
        let mut last_row = None;
        for (index, query) in self.queries.iter().enumerate() {
            let rows = self.connection.query(query, parameters).await?;
            match rows.into_iter().next() {
                Some(row) => last_row = Some(row),
                None => {
                    tracing::trace!(trigger = %self.header.id, index, "query returned no rows");
                    return Ok(AutomationResult::not_met());
                }
            }
        }
        let output: Parameters = last_row.into_iter().flatten().collect();
        Ok(AutomationResult::met(output))
    }
}
