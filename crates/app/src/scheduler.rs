//! Polling scheduler: evaluates stored automations and submits jobs.
//!
//! The automation list is cached together with the repository version it
//! was read at; a poll only reloads it when the version moved.
//!
//! Releasing is edge-triggered: a job is submitted when an automation
//! becomes met, and not again until a poll has seen it not met. A scheduled
//! trigger stays met for [`TOLERANCE`] after each boundary, so with polls at
//! most [`MAX_POLL_INTERVAL`] apart every boundary releases exactly one job.
//!
//! [`TOLERANCE`]: crate::triggers::scheduled::TOLERANCE

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use cadence_domain::automation::Automation;
use cadence_domain::error::CadenceError;
use cadence_domain::id::FullName;
use cadence_domain::job::Job;
use cadence_domain::time::{Clock, SystemClock, Timestamp};

use crate::automation_executor::AutomationExecutor;
use crate::ports::{AutomationRepository, JobSubmitter, ScalarStore};

/// Default delay between two polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Longest poll interval that cannot step over a scheduled met window.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// What one poll did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The automation list was read again from the repository.
    pub reloaded: bool,
    pub evaluated: usize,
    pub submitted: usize,
    /// Met, but already released since it last was not met.
    pub held: usize,
    pub failed: usize,
}

struct Snapshot {
    version: Timestamp,
    automations: Vec<Automation>,
}

/// Periodically evaluates every enabled automation.
pub struct Scheduler<R, S, J, C = SystemClock> {
    repo: R,
    executor: AutomationExecutor<S, C>,
    submitter: J,
    poll_interval: Duration,
    cache: Mutex<Option<Snapshot>>,
    released: Mutex<HashSet<FullName>>,
}

impl<R, S, J, C> Scheduler<R, S, J, C>
where
    R: AutomationRepository,
    S: ScalarStore,
    J: JobSubmitter,
    C: Clock,
{
    pub fn new(repo: R, executor: AutomationExecutor<S, C>, submitter: J) -> Self {
        Self {
            repo,
            executor,
            submitter,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cache: Mutex::new(None),
            released: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Poll once: refresh the cache if needed, evaluate, submit.
    ///
    /// A failure inside one automation is logged and counted; the others
    /// are still evaluated.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the repository cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) -> Result<TickReport, CadenceError> {
        let mut report = TickReport::default();
        let automations = {
            let mut cache = self.cache.lock().await;
            let version = self.repo.get_version_timestamp().await?;
            if cache.as_ref().is_none_or(|snapshot| snapshot.version != version) {
                let automations = self.repo.get_all().await?;
                tracing::debug!(%version, count = automations.len(), "automations reloaded");
                *cache = Some(Snapshot {
                    version,
                    automations,
                });
                report.reloaded = true;
            }
            cache
                .as_ref()
                .map(|snapshot| snapshot.automations.clone())
                .unwrap_or_default()
        };

        let mut released = self.released.lock().await;
        let mut seen = HashSet::new();
        for automation in automations.iter().filter(|a| a.is_enabled()) {
            report.evaluated += 1;
            let id = automation.id();
            seen.insert(id.clone());
            match self.evaluate(automation, released.contains(id)).await {
                Ok(Release::Submitted) => {
                    report.submitted += 1;
                    released.insert(id.clone());
                }
                Ok(Release::Held) => report.held += 1,
                Ok(Release::NotMet) => {
                    released.remove(id);
                }
                Err(err) => {
                    report.failed += 1;
                    released.remove(id);
                    tracing::error!(automation = %id, error = ?err, "automation failed");
                }
            }
        }
        released.retain(|id| seen.contains(id));
        Ok(report)
    }

    /// Poll every interval until `shutdown` resolves.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        tracing::info!(poll_interval = ?self.poll_interval, "scheduler started");
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = interval.tick() => match self.tick().await {
                    Ok(report) => tracing::debug!(?report, "poll finished"),
                    Err(err) => tracing::error!(error = ?err, "poll failed"),
                },
            }
        }
        tracing::info!("scheduler stopped");
    }

    async fn evaluate(
        &self,
        automation: &Automation,
        already_released: bool,
    ) -> Result<Release, CadenceError> {
        let result = self.executor.execute(automation).await?;
        if !result.is_met() {
            return Ok(Release::NotMet);
        }
        if already_released {
            tracing::debug!(automation = %automation.id(), "still met, job already released");
            return Ok(Release::Held);
        }
        let mut job = Job::pending(automation.task_id.clone(), self.executor.clock().now());
        job.host_group.clone_from(&automation.host_group);
        job.priority = automation.priority;
        job.tag.clone_from(&automation.tag);
        job.parameters = result.into_task_parameters();

        let job = self.submitter.submit(job).await?;
        tracing::info!(
            automation = %automation.id(),
            job = %job.id,
            task_id = %job.task_id,
            "job submitted"
        );
        Ok(Release::Submitted)
    }
}

enum Release {
    NotMet,
    Held,
    Submitted,
}
