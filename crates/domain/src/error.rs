//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`CadenceError`] via `#[from]`. The split mirrors how callers react:
//!
//! - [`ValidationError`]: a definition is invalid; raised when it is built.
//! - [`ArgumentError`]: a runtime parameter is missing or malformed.
//! - [`ExpressionError`]: a conditional expression is broken or refers to
//!   an unknown trigger.
//! - [`NotFoundError`]: a lookup by key came back empty.
//!
//! A trigger that is simply not met is **not** an error.

use std::error::Error as StdError;

pub use crate::expression::ExpressionError;

/// Boxed error used for adapter failures crossing the port boundary.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Root error type for every cadence operation.
#[derive(Debug, thiserror::Error)]
pub enum CadenceError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("invalid argument")]
    Argument(#[from] ArgumentError),

    #[error("invalid conditional expression")]
    Expression(#[from] ExpressionError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("storage error")]
    Storage(#[source] BoxError),

    /// A trigger failed while an automation was being evaluated.
    #[error("automation `{automation}` failed in trigger `{trigger}`")]
    Evaluation {
        automation: String,
        trigger: String,
        #[source]
        source: Box<CadenceError>,
    },
}

impl CadenceError {
    /// Wrap any adapter error as [`CadenceError::Storage`].
    pub fn storage(err: impl Into<BoxError>) -> Self {
        Self::Storage(err.into())
    }

    /// Return the innermost error, looking through [`CadenceError::Evaluation`].
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Evaluation { source, .. } => source.root(),
            other => other,
        }
    }
}

/// A definition violates a domain invariant.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("invalid name `{value}`: {reason}")]
    InvalidName { value: String, reason: &'static str },

    #[error("task id must not be empty")]
    MissingTaskId,

    #[error("trigger id must not be empty")]
    EmptyTriggerId,

    #[error("duplicate trigger id `{0}`")]
    DuplicateTriggerId(String),

    #[error("trigger `{trigger}` interval of {seconds}s is shorter than one minute")]
    IntervalTooShort { trigger: String, seconds: i64 },

    #[error("unknown trigger kind `{0}`")]
    UnknownTriggerKind(String),

    #[error("trigger kind `{0}` is already registered")]
    DuplicateTriggerKind(String),

    #[error("`{0}` is not a registered job repository type")]
    UnknownJobRepository(String),

    #[error("invalid settings for `{kind}` trigger `{trigger}`")]
    InvalidSettings {
        kind: String,
        trigger: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("automation `{0}` already exists")]
    AlreadyExists(String),
}

/// A runtime parameter needed by a trigger is absent or unusable.
///
/// The two variants are kept apart so callers can tell "not configured"
/// from "bad data".
#[derive(Debug, thiserror::Error)]
pub enum ArgumentError {
    #[error("required parameter `{name}` is missing")]
    Missing { name: String },

    #[error("parameter `{name}` has malformed value `{value}`")]
    Malformed { name: String, value: String },
}

/// A lookup by key found nothing.
#[derive(Debug, thiserror::Error)]
#[error("{entity} `{id}` not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}
