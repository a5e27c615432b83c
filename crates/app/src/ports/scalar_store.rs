//! Scalar store port: the audit sink for evaluation outcomes.
//!
//! The executor writes one boolean per trigger evaluation and per
//! automation result, keyed by a `/`-delimited path. Durability and
//! retries are the store's business.

use std::future::Future;

use serde::{Deserialize, Serialize};

use cadence_domain::error::CadenceError;
use cadence_domain::time::Timestamp;

/// Last value written for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scalar {
    pub value: bool,
    pub timestamp: Timestamp,
}

/// Keyed store of boolean monitoring values.
pub trait ScalarStore: Send + Sync {
    /// Record `value` for `path` at `timestamp`, replacing any previous value.
    fn set(
        &self,
        path: &str,
        value: bool,
        timestamp: Timestamp,
    ) -> impl Future<Output = Result<(), CadenceError>> + Send;

    /// Last value recorded for `path`.
    fn get(&self, path: &str) -> impl Future<Output = Result<Option<Scalar>, CadenceError>> + Send;
}

impl<T: ScalarStore> ScalarStore for std::sync::Arc<T> {
    fn set(
        &self,
        path: &str,
        value: bool,
        timestamp: Timestamp,
    ) -> impl Future<Output = Result<(), CadenceError>> + Send {
        (**self).set(path, value, timestamp)
    }

    fn get(&self, path: &str) -> impl Future<Output = Result<Option<Scalar>, CadenceError>> + Send {
        (**self).get(path)
    }
}
