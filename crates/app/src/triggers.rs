//! Triggers: executable units that test one condition.
//!
//! A [`Trigger`] is built from a stored
//! [`TriggerDefinition`](cadence_domain::automation::TriggerDefinition) by
//! the [`TriggerRegistry`], executed against the current parameter map, and
//! answers with an [`AutomationResult`]: met or not met, plus any parameters
//! it produced.
//!
//! Reference implementations:
//! - [`ScheduledTrigger`]: fires on fixed interval boundaries
//! - [`JobCompletedTrigger`]: met once a task has a completed job
//! - [`SqlTrigger`]: met when every query returns a row

pub mod job_completed;
pub mod registry;
pub mod scheduled;
pub mod schema;
pub mod sql;

use std::fmt;

use async_trait::async_trait;

use cadence_domain::automation::{AutomationResult, Parameters};
use cadence_domain::error::CadenceError;

pub use job_completed::JobCompletedTrigger;
pub use registry::{TriggerFactory, TriggerRegistry, TriggerServices};
pub use scheduled::ScheduledTrigger;
pub use schema::{PropertySchema, PropertyType, TriggerSchema};
pub use sql::SqlTrigger;

/// A pluggable condition producing a verdict and output parameters.
///
/// `execute` only reads `parameters`; output goes into the returned
/// result. A condition that does not hold is `Ok(AutomationResult::not_met())`,
/// never an error. Errors are reserved for malformed input and failing IO.
#[async_trait]
pub trait Trigger: Send + Sync + fmt::Debug {
    /// Unique within the owning trigger condition.
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    fn is_enabled(&self) -> bool;

    fn enable(&mut self);

    fn disable(&mut self);

    /// Evaluate the trigger against the current parameter map.
    async fn execute(&self, parameters: &Parameters) -> Result<AutomationResult, CadenceError>;
}

/// Identity shared by every trigger implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TriggerHeader {
    pub id: String,
    pub description: String,
    pub enabled: bool,
}

impl TriggerHeader {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            enabled: true,
        }
    }
}

/// Implements the identity half of [`Trigger`] by delegating to a `header` field.
macro_rules! delegate_header {
    () => {
        fn id(&self) -> &str {
            &self.header.id
        }

        fn description(&self) -> &str {
            &self.header.description
        }

        fn is_enabled(&self) -> bool {
            self.header.enabled
        }

        fn enable(&mut self) {
            self.header.enabled = true;
        }

        fn disable(&mut self) {
            self.header.enabled = false;
        }
    };
}

pub(crate) use delegate_header;
