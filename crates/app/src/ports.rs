//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod automation_repo;
pub mod job_repo;
pub mod job_submitter;
pub mod scalar_store;
pub mod sql;

pub use automation_repo::AutomationRepository;
pub use job_repo::{JobRepository, JobRepositoryOpener, JobRepositoryProviders};
pub use job_submitter::JobSubmitter;
pub use scalar_store::{Scalar, ScalarStore};
pub use sql::{SqlConnection, SqlConnector, SqlRow};
