//! Directory-tree implementation of [`AutomationRepository`].
//!
//! Layout under the root directory:
//!
//! ```text
//! version.txt
//! nightly.json              <- "nightly"
//! etl/import.json           <- "etl/import"
//! etl/daily/cleanup.json    <- "etl/daily/cleanup"
//! ```

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::Mutex;

use cadence_app::ports::AutomationRepository;
use cadence_domain::automation::Automation;
use cadence_domain::error::{CadenceError, NotFoundError, ValidationError};
use cadence_domain::id::{FullName, SEPARATOR, check_group};
use cadence_domain::time::{Clock, SystemClock, Timestamp};

use crate::error::StorageError;
use crate::version::VersionMarker;

/// Name of the version marker file at the root of the tree.
pub const VERSION_FILE: &str = "version.txt";

const EXTENSION: &str = "json";

/// One JSON document per automation, group segments as directories.
#[derive(Debug)]
pub struct DirectoryAutomationRepository<C = SystemClock> {
    root: PathBuf,
    marker: VersionMarker<C>,
    write: Mutex<()>,
}

impl DirectoryAutomationRepository {
    /// Repository rooted at `root`. Nothing is created until the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, SystemClock)
    }
}

impl<C: Clock> DirectoryAutomationRepository<C> {
    pub fn with_clock(root: impl Into<PathBuf>, clock: C) -> Self {
        let root = root.into();
        Self {
            marker: VersionMarker::with_clock(root.join(VERSION_FILE), clock),
            root,
            write: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_of(&self, id: &FullName) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(id.group_segments());
        path.push(format!("{}.{EXTENSION}", id.name()));
        path
    }

    fn dir_of(&self, group: &str) -> Result<PathBuf, ValidationError> {
        let group = normalize_group(group)?;
        let mut path = self.root.clone();
        if !group.is_empty() {
            path.extend(group.split(SEPARATOR));
        }
        Ok(path)
    }

    /// Every automation file below `dir`, with its full name, ordered by name.
    async fn scan(&self, dir: PathBuf) -> Result<Vec<(FullName, PathBuf)>, StorageError> {
        let mut found = Vec::new();
        let mut pending = vec![dir];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(StorageError::io(&dir, err)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|err| StorageError::io(&dir, err))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|err| StorageError::io(&path, err))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() && path.extension() == Some(OsStr::new(EXTENSION)) {
                    match self.name_of(&path) {
                        Some(id) => found.push((id, path)),
                        None => {
                            tracing::warn!(path = %path.display(), "skipping file with unusable name");
                        }
                    }
                }
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    fn name_of(&self, path: &Path) -> Option<FullName> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let name = relative.file_stem()?.to_str()?;
        let separator = SEPARATOR.to_string();
        let group = relative
            .parent()?
            .iter()
            .map(OsStr::to_str)
            .collect::<Option<Vec<_>>>()?
            .join(separator.as_str());
        let group = (!group.is_empty()).then_some(group);
        FullName::new(group.as_deref(), name).ok()
    }

    async fn load(&self, path: &Path) -> Result<Option<Automation>, StorageError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::io(path, err)),
        };
        let automation: Automation =
            serde_json::from_slice(&bytes).map_err(|err| StorageError::json(path, err))?;
        automation
            .validate()
            .map_err(|err| StorageError::invalid(path, err))?;
        Ok(Some(automation))
    }

    async fn load_all(&self, dir: PathBuf) -> Result<Vec<Automation>, StorageError> {
        let mut automations = Vec::new();
        for (_, path) in self.scan(dir).await? {
            if let Some(automation) = self.load(&path).await? {
                automations.push(automation);
            }
        }
        Ok(automations)
    }

    async fn store(&self, automation: &Automation) -> Result<(), StorageError> {
        let path = self.file_of(automation.id());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| StorageError::io(parent, err))?;
        }
        let json =
            serde_json::to_vec_pretty(automation).map_err(|err| StorageError::json(&path, err))?;
        fs::write(&path, json)
            .await
            .map_err(|err| StorageError::io(&path, err))
    }

    async fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        fs::try_exists(path)
            .await
            .map_err(|err| StorageError::io(path, err))
    }

    /// Remove directories left empty between `dir` and the root.
    async fn prune(&self, mut dir: &Path) {
        while dir != self.root && dir.starts_with(&self.root) {
            if fs::remove_dir(dir).await.is_err() {
                break;
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }
}

/// Strip trailing separators and reject unsafe group paths. `""` means every group.
pub(crate) fn normalize_group(group: &str) -> Result<&str, ValidationError> {
    let group = group.trim_end_matches(SEPARATOR);
    if !group.is_empty() {
        check_group(group)?;
    }
    Ok(group)
}

pub(crate) fn not_found(id: &FullName) -> CadenceError {
    NotFoundError {
        entity: "Automation",
        id: id.to_string(),
    }
    .into()
}

impl<C: Clock> AutomationRepository for DirectoryAutomationRepository<C> {
    async fn get(&self, id: &FullName) -> Result<Option<Automation>, CadenceError> {
        Ok(self.load(&self.file_of(id)).await?)
    }

    async fn get_all(&self) -> Result<Vec<Automation>, CadenceError> {
        Ok(self.load_all(self.root.clone()).await?)
    }

    async fn get_by_group(&self, group: &str) -> Result<Vec<Automation>, CadenceError> {
        let dir = self.dir_of(group)?;
        Ok(self.load_all(dir).await?)
    }

    async fn get_ids(&self) -> Result<Vec<FullName>, CadenceError> {
        let found = self.scan(self.root.clone()).await?;
        Ok(found.into_iter().map(|(id, _)| id).collect())
    }

    async fn get_full_names(&self, group: &str) -> Result<Vec<FullName>, CadenceError> {
        let dir = self.dir_of(group)?;
        let found = self.scan(dir).await?;
        Ok(found.into_iter().map(|(id, _)| id).collect())
    }

    async fn count(&self) -> Result<usize, CadenceError> {
        Ok(self.scan(self.root.clone()).await?.len())
    }

    async fn contains(&self, id: &FullName) -> Result<bool, CadenceError> {
        Ok(self.exists(&self.file_of(id)).await?)
    }

    async fn contains_group(&self, group: &str) -> Result<bool, CadenceError> {
        let dir = self.dir_of(group)?;
        Ok(!self.scan(dir).await?.is_empty())
    }

    #[tracing::instrument(skip_all, fields(automation = %automation.id()))]
    async fn add(&self, automation: Automation) -> Result<(), CadenceError> {
        let _guard = self.write.lock().await;
        if self.exists(&self.file_of(automation.id())).await? {
            return Err(ValidationError::AlreadyExists(automation.id().to_string()).into());
        }
        self.store(&automation).await?;
        self.marker.touch().await?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(automation = %automation.id()))]
    async fn update(&self, automation: Automation) -> Result<(), CadenceError> {
        let _guard = self.write.lock().await;
        if !self.exists(&self.file_of(automation.id())).await? {
            return Err(not_found(automation.id()));
        }
        self.store(&automation).await?;
        self.marker.touch().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, id: &FullName) -> Result<(), CadenceError> {
        let _guard = self.write.lock().await;
        let path = self.file_of(id);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found(id)),
            Err(err) => return Err(StorageError::io(&path, err).into()),
        }
        if let Some(parent) = path.parent() {
            self.prune(parent).await;
        }
        self.marker.touch().await?;
        Ok(())
    }

    async fn get_version_timestamp(&self) -> Result<Timestamp, CadenceError> {
        Ok(self.marker.get_or_create().await?)
    }

    async fn touch_version(&self) -> Result<Timestamp, CadenceError> {
        Ok(self.marker.touch().await?)
    }
}
