//! Single-file implementation of [`AutomationRepository`].
//!
//! Every automation lives in one JSON object keyed by full name. The version
//! marker sits next to it as `<file>.version`.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::Mutex;

use cadence_app::ports::AutomationRepository;
use cadence_domain::automation::Automation;
use cadence_domain::error::{CadenceError, ValidationError};
use cadence_domain::id::FullName;
use cadence_domain::time::{Clock, SystemClock, Timestamp};

use crate::directory_repo::{normalize_group, not_found};
use crate::error::StorageError;
use crate::version::VersionMarker;

type Document = BTreeMap<FullName, Automation>;

/// All automations in one JSON document.
#[derive(Debug)]
pub struct JsonFileAutomationRepository<C = SystemClock> {
    path: PathBuf,
    marker: VersionMarker<C>,
    write: Mutex<()>,
}

impl JsonFileAutomationRepository {
    /// Repository stored in `path`. The file is created on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, SystemClock)
    }
}

impl<C: Clock> JsonFileAutomationRepository<C> {
    pub fn with_clock(path: impl Into<PathBuf>, clock: C) -> Self {
        let path = path.into();
        Self {
            marker: VersionMarker::with_clock(version_path(&path), clock),
            path,
            write: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn version_path(&self) -> &Path {
        self.marker.path()
    }

    async fn load(&self) -> Result<Document, StorageError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Document::new()),
            Err(err) => return Err(StorageError::io(&self.path, err)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Document::new());
        }
        let document: Document =
            serde_json::from_slice(&bytes).map_err(|err| StorageError::json(&self.path, err))?;
        for automation in document.values() {
            automation
                .validate()
                .map_err(|err| StorageError::invalid(&self.path, err))?;
        }
        Ok(document)
    }

    async fn save(&self, document: &Document) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| StorageError::io(parent, err))?;
        }
        let json = serde_json::to_vec_pretty(document)
            .map_err(|err| StorageError::json(&self.path, err))?;
        fs::write(&self.path, json)
            .await
            .map_err(|err| StorageError::io(&self.path, err))
    }

    async fn in_group(&self, group: &str) -> Result<Vec<Automation>, CadenceError> {
        let group = normalize_group(group)?;
        Ok(self
            .load()
            .await?
            .into_values()
            .filter(|automation| automation.id().is_in_group(group))
            .collect())
    }

    /// Apply `change` to the document under the write lock, save, advance the version.
    async fn mutate<F>(&self, change: F) -> Result<(), CadenceError>
    where
        F: FnOnce(&mut Document) -> Result<(), CadenceError> + Send,
    {
        let _guard = self.write.lock().await;
        let mut document = self.load().await?;
        change(&mut document)?;
        self.save(&document).await?;
        self.marker.touch().await?;
        Ok(())
    }
}

fn version_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".version");
    PathBuf::from(name)
}

impl<C: Clock> AutomationRepository for JsonFileAutomationRepository<C> {
    async fn get(&self, id: &FullName) -> Result<Option<Automation>, CadenceError> {
        Ok(self.load().await?.remove(id))
    }

    async fn get_all(&self) -> Result<Vec<Automation>, CadenceError> {
        Ok(self.load().await?.into_values().collect())
    }

    async fn get_by_group(&self, group: &str) -> Result<Vec<Automation>, CadenceError> {
        self.in_group(group).await
    }

    async fn get_ids(&self) -> Result<Vec<FullName>, CadenceError> {
        Ok(self.load().await?.into_keys().collect())
    }

    async fn get_full_names(&self, group: &str) -> Result<Vec<FullName>, CadenceError> {
        let automations = self.in_group(group).await?;
        Ok(automations.iter().map(|a| a.id().clone()).collect())
    }

    async fn count(&self) -> Result<usize, CadenceError> {
        Ok(self.load().await?.len())
    }

    async fn contains(&self, id: &FullName) -> Result<bool, CadenceError> {
        Ok(self.load().await?.contains_key(id))
    }

    async fn contains_group(&self, group: &str) -> Result<bool, CadenceError> {
        Ok(!self.in_group(group).await?.is_empty())
    }

    #[tracing::instrument(skip_all, fields(automation = %automation.id()))]
    async fn add(&self, automation: Automation) -> Result<(), CadenceError> {
        self.mutate(move |document| {
            if document.contains_key(automation.id()) {
                return Err(ValidationError::AlreadyExists(automation.id().to_string()).into());
            }
            document.insert(automation.id().clone(), automation);
            Ok(())
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(automation = %automation.id()))]
    async fn update(&self, automation: Automation) -> Result<(), CadenceError> {
        self.mutate(move |document| match document.get_mut(automation.id()) {
            Some(slot) => {
                *slot = automation;
                Ok(())
            }
            None => Err(not_found(automation.id())),
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, id: &FullName) -> Result<(), CadenceError> {
        self.mutate(|document| match document.remove(id) {
            Some(_) => Ok(()),
            None => Err(not_found(id)),
        })
        .await
    }

    async fn get_version_timestamp(&self) -> Result<Timestamp, CadenceError> {
        Ok(self.marker.get_or_create().await?)
    }

    async fn touch_version(&self) -> Result<Timestamp, CadenceError> {
        Ok(self.marker.touch().await?)
    }
}
