//! Automation repository port: grouped persistence for automations.
//!
//! Automations are addressed by their hierarchical [`FullName`]. Every
//! mutation advances a version marker so pollers can tell "nothing changed
//! since T" without listing the whole store.

use std::future::Future;

use cadence_domain::automation::Automation;
use cadence_domain::error::CadenceError;
use cadence_domain::id::FullName;
use cadence_domain::time::Timestamp;

/// Repository for persisting and querying [`Automation`]s.
pub trait AutomationRepository: Send + Sync {
    /// Get an automation by its full name.
    fn get(
        &self,
        id: &FullName,
    ) -> impl Future<Output = Result<Option<Automation>, CadenceError>> + Send;

    /// Get all automations, ordered by full name.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Automation>, CadenceError>> + Send;

    /// Get the automations of `group` and all of its subgroups.
    fn get_by_group(
        &self,
        group: &str,
    ) -> impl Future<Output = Result<Vec<Automation>, CadenceError>> + Send;

    /// Full names of every stored automation, ordered.
    fn get_ids(&self) -> impl Future<Output = Result<Vec<FullName>, CadenceError>> + Send;

    /// Full names of the automations in `group` and its subgroups.
    fn get_full_names(
        &self,
        group: &str,
    ) -> impl Future<Output = Result<Vec<FullName>, CadenceError>> + Send;

    /// Number of stored automations.
    fn count(&self) -> impl Future<Output = Result<usize, CadenceError>> + Send;

    /// Whether an automation with this full name exists.
    fn contains(&self, id: &FullName) -> impl Future<Output = Result<bool, CadenceError>> + Send;

    /// Whether at least one automation lives in `group` or a subgroup.
    fn contains_group(&self, group: &str)
    -> impl Future<Output = Result<bool, CadenceError>> + Send;

    /// Store a new automation. Fails when the id is taken.
    fn add(&self, automation: Automation) -> impl Future<Output = Result<(), CadenceError>> + Send;

    /// Replace an existing automation. Fails when the id is unknown.
    fn update(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<(), CadenceError>> + Send;

    /// Delete an automation. Fails when the id is unknown.
    fn remove(&self, id: &FullName) -> impl Future<Output = Result<(), CadenceError>> + Send;

    /// Current version marker, created on first access.
    fn get_version_timestamp(&self)
    -> impl Future<Output = Result<Timestamp, CadenceError>> + Send;

    /// Advance the version marker to "now" and return it.
    fn touch_version(&self) -> impl Future<Output = Result<Timestamp, CadenceError>> + Send;
}

impl<T: AutomationRepository> AutomationRepository for std::sync::Arc<T> {
    fn get(
        &self,
        id: &FullName,
    ) -> impl Future<Output = Result<Option<Automation>, CadenceError>> + Send {
        (**self).get(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Automation>, CadenceError>> + Send {
        (**self).get_all()
    }

    fn get_by_group(
        &self,
        group: &str,
    ) -> impl Future<Output = Result<Vec<Automation>, CadenceError>> + Send {
        (**self).get_by_group(group)
    }

    fn get_ids(&self) -> impl Future<Output = Result<Vec<FullName>, CadenceError>> + Send {
        (**self).get_ids()
    }

    fn get_full_names(
        &self,
        group: &str,
    ) -> impl Future<Output = Result<Vec<FullName>, CadenceError>> + Send {
        (**self).get_full_names(group)
    }

    fn count(&self) -> impl Future<Output = Result<usize, CadenceError>> + Send {
        (**self).count()
    }

    fn contains(&self, id: &FullName) -> impl Future<Output = Result<bool, CadenceError>> + Send {
        (**self).contains(id)
    }

    fn contains_group(
        &self,
        group: &str,
    ) -> impl Future<Output = Result<bool, CadenceError>> + Send {
        (**self).contains_group(group)
    }

    fn add(&self, automation: Automation) -> impl Future<Output = Result<(), CadenceError>> + Send {
        (**self).add(automation)
    }

    fn update(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<(), CadenceError>> + Send {
        (**self).update(automation)
    }

    fn remove(&self, id: &FullName) -> impl Future<Output = Result<(), CadenceError>> + Send {
        (**self).remove(id)
    }

    fn get_version_timestamp(
        &self,
    ) -> impl Future<Output = Result<Timestamp, CadenceError>> + Send {
        (**self).get_version_timestamp()
    }

    fn touch_version(&self) -> impl Future<Output = Result<Timestamp, CadenceError>> + Send {
        (**self).touch_version()
    }
}
