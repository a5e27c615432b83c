//! In-memory port implementations shared by the unit tests of this crate.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{TimeDelta, TimeZone, Utc};

use cadence_domain::automation::Automation;
use cadence_domain::error::{CadenceError, NotFoundError, ValidationError};
use cadence_domain::id::FullName;
use cadence_domain::job::Job;
use cadence_domain::time::{Clock, Timestamp};

use crate::ports::{AutomationRepository, JobSubmitter};

/// Map-backed repository whose version advances one second per mutation.
pub struct InMemoryAutomationRepo {
    store: Mutex<BTreeMap<FullName, Automation>>,
    version: Mutex<Timestamp>,
}

impl Default for InMemoryAutomationRepo {
    fn default() -> Self {
        Self {
            store: Mutex::new(BTreeMap::new()),
            version: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        }
    }
}

impl InMemoryAutomationRepo {
    fn bump(&self) -> Timestamp {
        let mut version = self.version.lock().unwrap();
        *version += TimeDelta::seconds(1);
        *version
    }

    /// Replace an automation without touching the version.
    pub fn overwrite_silently(&self, automation: Automation) {
        self.store
            .lock()
            .unwrap()
            .insert(automation.id().clone(), automation);
    }
}

impl AutomationRepository for InMemoryAutomationRepo {
    async fn get(&self, id: &FullName) -> Result<Option<Automation>, CadenceError> {
        Ok(self.store.lock().unwrap().get(id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Automation>, CadenceError> {
        Ok(self.store.lock().unwrap().values().cloned().collect())
    }

    async fn get_by_group(&self, group: &str) -> Result<Vec<Automation>, CadenceError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.id().is_in_group(group))
            .cloned()
            .collect())
    }

    async fn get_ids(&self) -> Result<Vec<FullName>, CadenceError> {
        Ok(self.store.lock().unwrap().keys().cloned().collect())
    }

    async fn get_full_names(&self, group: &str) -> Result<Vec<FullName>, CadenceError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .keys()
            .filter(|id| id.is_in_group(group))
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, CadenceError> {
        Ok(self.store.lock().unwrap().len())
    }

    async fn contains(&self, id: &FullName) -> Result<bool, CadenceError> {
        Ok(self.store.lock().unwrap().contains_key(id))
    }

    async fn contains_group(&self, group: &str) -> Result<bool, CadenceError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .keys()
            .any(|id| id.is_in_group(group)))
    }

    async fn add(&self, automation: Automation) -> Result<(), CadenceError> {
        {
            let mut store = self.store.lock().unwrap();
            if store.contains_key(automation.id()) {
                return Err(ValidationError::AlreadyExists(automation.id().to_string()).into());
            }
            store.insert(automation.id().clone(), automation);
        }
        self.bump();
        Ok(())
    }

    async fn update(&self, automation: Automation) -> Result<(), CadenceError> {
        {
            let mut store = self.store.lock().unwrap();
            let Some(slot) = store.get_mut(automation.id()) else {
                return Err(NotFoundError {
                    entity: "Automation",
                    id: automation.id().to_string(),
                }
                .into());
            };
            *slot = automation;
        }
        self.bump();
        Ok(())
    }

    async fn remove(&self, id: &FullName) -> Result<(), CadenceError> {
        if self.store.lock().unwrap().remove(id).is_none() {
            return Err(NotFoundError {
                entity: "Automation",
                id: id.to_string(),
            }
            .into());
        }
        self.bump();
        Ok(())
    }

    async fn get_version_timestamp(&self) -> Result<Timestamp, CadenceError> {
        Ok(*self.version.lock().unwrap())
    }

    async fn touch_version(&self) -> Result<Timestamp, CadenceError> {
        Ok(self.bump())
    }
}

/// Records submitted jobs; fails for task ids listed in `rejected`.
#[derive(Default)]
pub struct RecordingSubmitter {
    pub submitted: Mutex<Vec<Job>>,
    pub rejected: Vec<String>,
}

impl JobSubmitter for RecordingSubmitter {
    async fn submit(&self, job: Job) -> Result<Job, CadenceError> {
        if self.rejected.contains(&job.task_id) {
            return Err(CadenceError::storage(std::io::Error::other(format!(
                "queue refused {}",
                job.task_id
            ))));
        }
        self.submitted.lock().unwrap().push(job.clone());
        Ok(job)
    }
}

/// Clock pinned to one instant.
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// Clock moved forward by hand.
pub struct SteppingClock(Mutex<Timestamp>);

impl SteppingClock {
    pub fn new(start: Timestamp) -> Self {
        Self(Mutex::new(start))
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Timestamp {
        *self.0.lock().unwrap()
    }
}
