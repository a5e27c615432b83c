//! Job-completed trigger: met once a task has at least one completed job.

use async_trait::async_trait;
use serde::Deserialize;

use cadence_domain::automation::{AutomationResult, Parameters, TriggerDefinition};
use cadence_domain::error::{CadenceError, ValidationError};
use cadence_domain::job::JobStatus;

use super::schema::{PropertySchema, PropertyType, TriggerSchema};
use super::{Trigger, TriggerHeader, delegate_header};
use crate::ports::{JobRepositoryOpener, JobRepositoryProviders};

/// Watches the job repository for a completed job of `task_id`.
///
/// The repository is named by kind and opened on every execution, so the
/// trigger holds no connection between evaluations.
pub struct JobCompletedTrigger {
    header: TriggerHeader,
    task_id: String,
    repository_kind: String,
    connection_string: String,
    opener: JobRepositoryOpener,
}

#[derive(Debug, Deserialize)]
struct Settings {
    task_id: String,
    repository_kind: String,
    #[serde(default)]
    connection_string: String,
}

impl JobCompletedTrigger {
    pub const KIND: &'static str = "job_completed";

    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownJobRepository`] when
    /// `repository_kind` is not registered in `providers`.
    pub fn new(
        id: impl Into<String>,
        task_id: impl Into<String>,
        repository_kind: impl Into<String>,
        connection_string: impl Into<String>,
        providers: &JobRepositoryProviders,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        let repository_kind = repository_kind.into();
        let opener = providers
            .get(&repository_kind)
            .ok_or_else(|| ValidationError::UnknownJobRepository(repository_kind.clone()))?;
        Ok(Self {
            header: TriggerHeader::new(id.clone(), id),
            task_id: task_id.into(),
            repository_kind,
            connection_string: connection_string.into(),
            opener,
        })
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.header.description = description.into();
        self
    }

    /// Build from a stored definition.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the settings are malformed or the
    /// repository kind is unknown.
    pub fn from_definition(
        definition: &TriggerDefinition,
        providers: &JobRepositoryProviders,
    ) -> Result<Self, ValidationError> {
        let settings: Settings = definition.decode_settings()?;
        let trigger = Self::new(
            definition.id.clone(),
            settings.task_id,
            settings.repository_kind,
            settings.connection_string,
            providers,
        )?;
        Ok(trigger.with_description(definition.label()))
    }

    #[must_use]
    pub fn schema() -> TriggerSchema {
        TriggerSchema::new(Self::KIND)
            .required(
                "task_id",
                PropertySchema::new(PropertyType::String, "Task id")
                    .description("Task whose jobs are watched"),
            )
            .required(
                "repository_kind",
                PropertySchema::new(PropertyType::String, "Job repository type")
                    .description("Registered kind of the job repository to read"),
            )
            .property(
                "connection_string",
                PropertySchema::new(PropertyType::String, "Connection string")
                    .format("connection-string"),
            )
    }

    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    #[must_use]
    pub fn repository_kind(&self) -> &str {
        &self.repository_kind
    }
}

impl std::fmt::Debug for JobCompletedTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCompletedTrigger")
            .field("header", &self.header)
            .field("task_id", &self.task_id)
            .field("repository_kind", &self.repository_kind)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Trigger for JobCompletedTrigger {
    delegate_header!();

    async fn execute(&self, _parameters: &Parameters) -> Result<AutomationResult, CadenceError> {
        let repository = (self.opener)(&self.connection_string)?;
        let completed = repository
            .find_by_task(&self.task_id, Some(JobStatus::Completed))
            .await?;
        tracing::trace!(
            trigger = %self.header.id,
            task_id = %self.task_id,
            completed = completed.len(),
            "job-completed trigger evaluated"
        );
        Ok(if completed.is_empty() {
            AutomationResult::not_met()
        } else {
            AutomationResult::met(Parameters::new())
        })
    }
}
