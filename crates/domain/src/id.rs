//! Identifiers: `/`-delimited hierarchical names and UUID-backed job ids.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Separator between the segments of a hierarchical name.
pub const SEPARATOR: char = '/';

/// Hierarchical name of a grouped entity: `group/sub/name`, or just `name`.
///
/// Every segment is checked on construction, so a `FullName` can be mapped
/// onto a directory tree without escaping it: empty segments, `.`, `..`,
/// backslashes and absolute paths are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FullName {
    group: Option<String>,
    name: String,
}

impl FullName {
    /// Build a full name from an optional group path and a leaf name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] when `name` is empty and
    /// [`ValidationError::InvalidName`] when any segment is unsafe.
    pub fn new(group: Option<&str>, name: &str) -> Result<Self, ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if name.contains(SEPARATOR) {
            return Err(invalid(name, "name must not contain `/`"));
        }
        check_segment(name)?;
        let group = match group {
            None | Some("") => None,
            Some(group) => {
                check_group(group)?;
                Some(group.to_string())
            }
        };
        Ok(Self {
            group,
            name: name.to_string(),
        })
    }

    /// Split `a/b/name` into group `a/b` and name `name`.
    ///
    /// # Errors
    ///
    /// Same as [`FullName::new`].
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        match text.rsplit_once(SEPARATOR) {
            Some((group, name)) => {
                if group.is_empty() {
                    return Err(invalid(text, "absolute paths are not allowed"));
                }
                Self::new(Some(group), name)
            }
            None => Self::new(None, text),
        }
    }

    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Segments of the group path, outermost first.
    pub fn group_segments(&self) -> impl Iterator<Item = &str> {
        self.group.iter().flat_map(|g| g.split(SEPARATOR))
    }

    /// Whether this name lives in `group` or one of its subgroups.
    #[must_use]
    pub fn is_in_group(&self, group: &str) -> bool {
        let group = group.trim_end_matches(SEPARATOR);
        if group.is_empty() {
            return true;
        }
        match &self.group {
            Some(own) => {
                own == group
                    || own
                        .strip_prefix(group)
                        .is_some_and(|rest| rest.starts_with(SEPARATOR))
            }
            None => false,
        }
    }
}

/// Validate a `/`-delimited group path.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidName`] on the first unsafe segment.
pub fn check_group(group: &str) -> Result<(), ValidationError> {
    if group.starts_with(SEPARATOR) {
        return Err(invalid(group, "absolute paths are not allowed"));
    }
    group.split(SEPARATOR).try_for_each(check_segment)
}

fn check_segment(segment: &str) -> Result<(), ValidationError> {
    if segment.is_empty() {
        return Err(invalid(segment, "empty path segment"));
    }
    if segment == "." || segment == ".." {
        return Err(invalid(segment, "relative path segments are not allowed"));
    }
    if segment.contains('\\') || segment.contains('\0') {
        return Err(invalid(segment, "illegal character"));
    }
    Ok(())
}

fn invalid(value: &str, reason: &'static str) -> ValidationError {
    ValidationError::InvalidName {
        value: value.to_string(),
        reason,
    }
}

impl fmt::Display for FullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{group}{SEPARATOR}{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for FullName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for FullName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FullName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a [`Job`](crate::job::Job).
    JobId
);
