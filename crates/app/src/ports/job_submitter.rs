//! Job submitter port: hands released parameters to the job system.

use std::future::Future;

use cadence_domain::error::CadenceError;
use cadence_domain::job::Job;

/// Accepts new jobs on behalf of met automations.
pub trait JobSubmitter: Send + Sync {
    /// Submit a pending job and return it as recorded.
    fn submit(&self, job: Job) -> impl Future<Output = Result<Job, CadenceError>> + Send;
}

impl<T: JobSubmitter> JobSubmitter for std::sync::Arc<T> {
    fn submit(&self, job: Job) -> impl Future<Output = Result<Job, CadenceError>> + Send {
        (**self).submit(job)
    }
}
