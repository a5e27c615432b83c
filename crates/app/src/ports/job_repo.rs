//! Job repository port: read access to the job system's records.
//!
//! Job repositories are opened by *kind* through [`JobRepositoryProviders`],
//! so a trigger can name a repository type and a connection string in its
//! stored settings and have the kind checked when the trigger is built.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use cadence_domain::error::CadenceError;
use cadence_domain::job::{Job, JobStatus};

/// Read-only view over jobs recorded by the job system.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Jobs submitted for `task_id`, optionally filtered by `status`.
    async fn find_by_task(
        &self,
        task_id: &str,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>, CadenceError>;
}

/// Opens a job repository from a connection string.
pub type JobRepositoryOpener =
    Arc<dyn Fn(&str) -> Result<Arc<dyn JobRepository>, CadenceError> + Send + Sync>;

/// Table of job repository kinds that triggers may refer to.
#[derive(Clone, Default)]
pub struct JobRepositoryProviders {
    openers: BTreeMap<String, JobRepositoryOpener>,
}

impl JobRepositoryProviders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the opener for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, opener: F)
    where
        F: Fn(&str) -> Result<Arc<dyn JobRepository>, CadenceError> + Send + Sync + 'static,
    {
        let kind = kind.into();
        tracing::debug!(%kind, "registered job repository kind");
        self.openers.insert(kind, Arc::new(opener));
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with<F>(mut self, kind: impl Into<String>, opener: F) -> Self
    where
        F: Fn(&str) -> Result<Arc<dyn JobRepository>, CadenceError> + Send + Sync + 'static,
    {
        self.register(kind, opener);
        self
    }

    #[must_use]
    pub fn get(&self, kind: &str) -> Option<JobRepositoryOpener> {
        self.openers.get(kind).cloned()
    }

    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.openers.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.openers.keys().map(String::as_str)
    }
}

impl fmt::Debug for JobRepositoryProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.kinds()).finish()
    }
}
