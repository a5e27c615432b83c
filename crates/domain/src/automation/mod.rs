//! Automation: a named rule that releases a task's parameters when its
//! trigger condition is met.
//!
//! An [`Automation`] binds a task id, the *declared* task parameters that
//! are released to the job system, free-form runtime parameters that
//! triggers may read, and a [`TriggerCondition`] over one or more
//! [`TriggerDefinition`]s.

mod condition;
mod result;
mod trigger;

pub use condition::TriggerCondition;
pub use result::AutomationResult;
pub use trigger::TriggerDefinition;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::FullName;

/// String parameters passed between automations, triggers and jobs.
pub type Parameters = BTreeMap<String, String>;

/// A rule that submits a task when its trigger condition is met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automation {
    id: FullName,
    pub task_id: String,
    /// Declared schema released to the job system, with default values.
    #[serde(default)]
    pub task_parameters: Parameters,
    /// Runtime inputs visible to triggers but not necessarily released.
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_group: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    pub trigger_condition: TriggerCondition,
}

fn default_priority() -> i32 {
    1
}

fn default_enabled() -> bool {
    true
}

impl Automation {
    /// Create an enabled automation with no triggers.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the name or group is invalid or
    /// `task_id` is empty.
    pub fn new(name: &str, group: Option<&str>, task_id: &str) -> Result<Self, ValidationError> {
        Self::builder()
            .name(name)
            .group(group.unwrap_or_default())
            .task_id(task_id)
            .build()
    }

    /// Create a builder for constructing an [`Automation`].
    #[must_use]
    pub fn builder() -> AutomationBuilder {
        AutomationBuilder::default()
    }

    /// Hierarchical id: `group/name`, or `name` when ungrouped.
    #[must_use]
    pub fn id(&self) -> &FullName {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.id.name()
    }

    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.id.group()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when:
    /// - `task_id` is empty ([`ValidationError::MissingTaskId`])
    /// - a trigger id is empty ([`ValidationError::EmptyTriggerId`])
    /// - two triggers share an id ([`ValidationError::DuplicateTriggerId`])
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.task_id.trim().is_empty() {
            return Err(ValidationError::MissingTaskId);
        }
        let mut seen = HashSet::new();
        for trigger in &self.trigger_condition.triggers {
            if trigger.id.is_empty() {
                return Err(ValidationError::EmptyTriggerId);
            }
            if !seen.insert(trigger.id.as_str()) {
                return Err(ValidationError::DuplicateTriggerId(trigger.id.clone()));
            }
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Automation`].
#[derive(Debug, Default)]
pub struct AutomationBuilder {
    name: Option<String>,
    group: Option<String>,
    task_id: Option<String>,
    task_parameters: Parameters,
    parameters: Parameters,
    host_group: Option<String>,
    priority: Option<i32>,
    tag: Option<String>,
    enabled: Option<bool>,
    triggers: Vec<TriggerDefinition>,
    conditional: Option<String>,
}

impl AutomationBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    #[must_use]
    pub fn task_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.task_parameters.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn host_group(mut self, host_group: impl Into<String>) -> Self {
        self.host_group = Some(host_group.into());
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: TriggerDefinition) -> Self {
        self.triggers.push(trigger);
        self
    }

    #[must_use]
    pub fn conditional(mut self, conditional: impl Into<String>) -> Self {
        self.conditional = Some(conditional.into());
        self
    }

    /// Consume the builder, validate, and return an [`Automation`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if required fields are missing or invalid.
    pub fn build(self) -> Result<Automation, ValidationError> {
        let name = self.name.unwrap_or_default();
        let id = FullName::new(self.group.as_deref(), &name)?;
        let automation = Automation {
            id,
            task_id: self.task_id.unwrap_or_default(),
            task_parameters: self.task_parameters,
            parameters: self.parameters,
            host_group: self.host_group,
            priority: self.priority.unwrap_or_else(default_priority),
            tag: self.tag,
            enabled: self.enabled.unwrap_or(true),
            trigger_condition: TriggerCondition {
                triggers: self.triggers,
                conditional: self.conditional,
            },
        };
        automation.validate()?;
        Ok(automation)
    }
}
