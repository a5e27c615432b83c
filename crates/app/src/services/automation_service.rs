//! Automation service: use-cases for managing automations.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use cadence_domain::automation::Automation;
use cadence_domain::error::{CadenceError, NotFoundError};
use cadence_domain::id::FullName;
use cadence_domain::time::Timestamp;

use crate::automation_executor::{DEFAULT_ROOT_GROUP, audit_path};
use crate::ports::{AutomationRepository, Scalar, ScalarStore};
use crate::triggers::TriggerRegistry;

/// An automation together with its last recorded evaluation outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutomationStatus {
    pub automation: Automation,
    /// Last automation-level verdict, if it was ever evaluated.
    pub is_met: Option<Scalar>,
    /// Last verdict per trigger id, for triggers evaluated at least once.
    pub triggers: BTreeMap<String, Scalar>,
}

/// Application service for automation management.
///
/// Definitions are checked against the trigger registry before they are
/// stored, so a broken trigger surfaces here and not on the next poll.
pub struct AutomationService<R, S> {
    repo: R,
    registry: Arc<TriggerRegistry>,
    scalars: S,
    root_group: String,
}

impl<R, S> AutomationService<R, S>
where
    R: AutomationRepository,
    S: ScalarStore,
{
    pub fn new(repo: R, registry: Arc<TriggerRegistry>, scalars: S) -> Self {
        Self {
            repo,
            registry,
            scalars,
            root_group: DEFAULT_ROOT_GROUP.to_string(),
        }
    }

    /// Root of the audit paths read by the `*_with_status` queries.
    #[must_use]
    pub fn with_root_group(mut self, root_group: impl Into<String>) -> Self {
        self.root_group = root_group.into();
        self
    }

    /// Store a new automation.
    ///
    /// # Errors
    ///
    /// Returns [`CadenceError::Validation`] when the automation or one of its
    /// triggers is invalid or the id is taken, [`CadenceError::Expression`]
    /// when the conditional does not parse, or a storage error.
    #[tracing::instrument(skip(self, automation), fields(automation = %automation.id()))]
    pub async fn add(&self, automation: Automation) -> Result<(), CadenceError> {
        self.check(&automation)?;
        self.repo.add(automation).await
    }

    /// Replace an existing automation.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add`], plus [`CadenceError::NotFound`] when the id is unknown.
    #[tracing::instrument(skip(self, automation), fields(automation = %automation.id()))]
    pub async fn update(&self, automation: Automation) -> Result<(), CadenceError> {
        self.check(&automation)?;
        self.repo.update(automation).await
    }

    /// Delete an automation.
    ///
    /// # Errors
    ///
    /// Returns [`CadenceError::NotFound`] when the id is unknown, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, id: &FullName) -> Result<(), CadenceError> {
        self.repo.remove(id).await
    }

    /// Enable or disable an automation in place.
    ///
    /// # Errors
    ///
    /// Returns [`CadenceError::NotFound`] when the id is unknown, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn set_enabled(&self, id: &FullName, enabled: bool) -> Result<(), CadenceError> {
        let mut automation = self.get(id).await?;
        if automation.is_enabled() == enabled {
            return Ok(());
        }
        if enabled {
            automation.enable();
        } else {
            automation.disable();
        }
        self.repo.update(automation).await
    }

    /// Look up an automation, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`CadenceError::NotFound`] when no automation with `id` exists,
    /// or a storage error from the repository.
    pub async fn get(&self, id: &FullName) -> Result<Automation, CadenceError> {
        self.repo.get(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Automation",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn find(&self, id: &FullName) -> Result<Option<Automation>, CadenceError> {
        self.repo.get(id).await
    }

    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list(&self) -> Result<Vec<Automation>, CadenceError> {
        self.repo.get_all().await
    }

    /// Automations of `group` and its subgroups.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_by_group(&self, group: &str) -> Result<Vec<Automation>, CadenceError> {
        self.repo.get_by_group(group).await
    }

    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn ids(&self) -> Result<Vec<FullName>, CadenceError> {
        self.repo.get_ids().await
    }

    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn full_names(&self, group: &str) -> Result<Vec<FullName>, CadenceError> {
        self.repo.get_full_names(group).await
    }

    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn count(&self) -> Result<usize, CadenceError> {
        self.repo.count().await
    }

    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn contains(&self, id: &FullName) -> Result<bool, CadenceError> {
        self.repo.contains(id).await
    }

    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn contains_group(&self, group: &str) -> Result<bool, CadenceError> {
        self.repo.contains_group(group).await
    }

    /// Current version marker of the automation store.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn version(&self) -> Result<Timestamp, CadenceError> {
        self.repo.get_version_timestamp().await
    }

    /// Force the version marker forward, e.g. after editing files by hand.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn touch_version(&self) -> Result<Timestamp, CadenceError> {
        self.repo.touch_version().await
    }

    /// Look up an automation with its last recorded outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`CadenceError::NotFound`] when the id is unknown, or a
    /// storage error from the repository or the scalar store.
    pub async fn get_with_status(&self, id: &FullName) -> Result<AutomationStatus, CadenceError> {
        let automation = self.get(id).await?;
        self.status(automation).await
    }

    /// Every automation with its last recorded outcomes.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the repository or the scalar store.
    pub async fn list_with_status(&self) -> Result<Vec<AutomationStatus>, CadenceError> {
        let automations = self.repo.get_all().await?;
        let mut statuses = Vec::with_capacity(automations.len());
        for automation in automations {
            statuses.push(self.status(automation).await?);
        }
        Ok(statuses)
    }

    fn check(&self, automation: &Automation) -> Result<(), CadenceError> {
        automation.validate()?;
        self.registry.validate(&automation.trigger_condition)
    }

    async fn status(&self, automation: Automation) -> Result<AutomationStatus, CadenceError> {
        let is_met = self
            .scalars
            .get(&audit_path(&self.root_group, automation.id(), None))
            .await?;
        let mut triggers = BTreeMap::new();
        for definition in &automation.trigger_condition.triggers {
            let path = audit_path(&self.root_group, automation.id(), Some(&definition.id));
            if let Some(scalar) = self.scalars.get(&path).await? {
                triggers.insert(definition.id.clone(), scalar);
            }
        }
        Ok(AutomationStatus {
            automation,
            is_met,
            triggers,
        })
    }
}
