//! Trigger definition: the persisted, kind-tagged form of a trigger.
//!
//! The executable side of a trigger lives in the application layer; this
//! envelope only carries what is stored: the `kind` discriminator, the id,
//! a description, the enabled flag and every other field as raw JSON.
//! Fields a kind does not understand are kept and written back untouched.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Serialized trigger: `{"kind": "...", "id": "...", ...settings}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDefinition {
    pub kind: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
    /// Kind-specific and unrecognized fields, in document order.
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

fn default_enabled() -> bool {
    true
}

impl TriggerDefinition {
    /// An enabled definition of `kind` with no settings.
    #[must_use]
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            description: String::new(),
            enabled: true,
            settings: Map::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
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

    /// Description, falling back to the id when none was given.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.description.is_empty() {
            &self.id
        } else {
            &self.description
        }
    }

    /// Decode the settings into a kind-specific struct.
    ///
    /// Unknown keys are ignored by the decode and stay in
    /// [`settings`](Self::settings).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidSettings`] when the settings do not
    /// match `T`.
    pub fn decode_settings<T: DeserializeOwned>(&self) -> Result<T, ValidationError> {
        serde_json::from_value(Value::Object(self.settings.clone())).map_err(|source| {
            ValidationError::InvalidSettings {
                kind: self.kind.clone(),
                trigger: self.id.clone(),
                source,
            }
        })
    }
}

impl fmt::Display for TriggerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.id)
    }
}
