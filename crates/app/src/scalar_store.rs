//! In-process scalar store backed by a map.
//!
//! Useful when no external monitoring store is configured and in tests.

use std::collections::BTreeMap;

use tokio::sync::RwLock;

use cadence_domain::error::CadenceError;
use cadence_domain::time::Timestamp;

use crate::ports::{Scalar, ScalarStore};

/// Keeps the last value written per path in memory.
#[derive(Debug, Default)]
pub struct InMemoryScalarStore {
    values: RwLock<BTreeMap<String, Scalar>>,
}

impl InMemoryScalarStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every recorded value, ordered by path.
    pub async fn snapshot(&self) -> BTreeMap<String, Scalar> {
        self.values.read().await.clone()
    }
}

impl ScalarStore for InMemoryScalarStore {
    async fn set(&self, path: &str, value: bool, timestamp: Timestamp) -> Result<(), CadenceError> {
        self.values
            .write()
            .await
            .insert(path.to_string(), Scalar { value, timestamp });
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Scalar>, CadenceError> {
        Ok(self.values.read().await.get(path).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_domain::time::now;

    #[tokio::test]
    async fn should_return_last_written_value() {
        let store = InMemoryScalarStore::new();
        let ts = now();
        store.set("Automations/a", false, ts).await.unwrap();
        store.set("Automations/a", true, ts).await.unwrap();

        let scalar = store.get("Automations/a").await.unwrap().unwrap();
        assert!(scalar.value);
        assert_eq!(scalar.timestamp, ts);
    }

    #[tokio::test]
    async fn should_return_none_for_unknown_path() {
        let store = InMemoryScalarStore::new();
        assert!(store.get("nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_snapshot_all_values() {
        let store = InMemoryScalarStore::new();
        store.set("b", true, now()).await.unwrap();
        store.set("a", false, now()).await.unwrap();
        let keys: Vec<String> = store.snapshot().await.into_keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
