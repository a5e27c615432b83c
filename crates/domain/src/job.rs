//! Job: one submission of a task to the downstream job system.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::JobId;
use crate::time::Timestamp;

/// Lifecycle state of a [`Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Error,
    Cancelled,
}

impl JobStatus {
    /// Whether the job has stopped running, successfully or not.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Error returned when parsing an unknown [`JobStatus`] string.
#[derive(Debug, thiserror::Error)]
#[error("unknown job status `{0}`")]
pub struct UnknownJobStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownJobStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownJobStatus(other.to_string())),
        }
    }
}

/// A request to run a task, as recorded by the job system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub task_id: String,
    pub status: JobStatus,
    pub host_group: Option<String>,
    pub priority: i32,
    pub tag: Option<String>,
    pub parameters: BTreeMap<String, String>,
    pub requested: Timestamp,
    pub started: Option<Timestamp>,
    pub finished: Option<Timestamp>,
}

impl Job {
    /// A freshly requested, pending job for `task_id`.
    #[must_use]
    pub fn pending(task_id: impl Into<String>, requested: Timestamp) -> Self {
        Self {
            id: JobId::new(),
            task_id: task_id.into(),
            status: JobStatus::Pending,
            host_group: None,
            priority: 1,
            tag: None,
            parameters: BTreeMap::new(),
            requested,
            started: None,
            finished: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_roundtrip_status_through_display_and_from_str() {
        for status in [
            JobStatus::Pending,
            JobStatus::InProgress,
            JobStatus::Completed,
            JobStatus::Error,
            JobStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
    }

    #[test]
    fn should_reject_unknown_status() {
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn should_classify_finished_states() {
        assert!(JobStatus::Completed.is_finished());
        assert!(JobStatus::Error.is_finished());
        assert!(!JobStatus::Pending.is_finished());
        assert!(!JobStatus::InProgress.is_finished());
    }

    #[test]
    fn should_create_pending_job_with_default_priority() {
        let job = Job::pending("export", crate::time::now());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.priority, 1);
        assert!(job.parameters.is_empty());
    }
}
