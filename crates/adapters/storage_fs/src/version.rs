//! Version marker file: one ISO-8601 UTC timestamp, advanced on every mutation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{SubsecRound, TimeDelta};
use tokio::fs;
use tokio::sync::Mutex;

use cadence_domain::time::{self, Clock, SystemClock, Timestamp};

use crate::error::StorageError;

/// Timestamp file guarded by an instance-level lock.
///
/// The lock only serializes writers inside this process. Two processes
/// sharing the file race on it and the last write wins.
#[derive(Debug)]
pub struct VersionMarker<C = SystemClock> {
    path: PathBuf,
    clock: C,
    lock: Mutex<()>,
}

impl VersionMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, SystemClock)
    }
}

impl<C: Clock> VersionMarker<C> {
    pub fn with_clock(path: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            path: path.into(),
            clock,
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the marker, writing "now" first when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the file cannot be read, written or parsed.
    pub async fn get_or_create(&self) -> Result<Timestamp, StorageError> {
        let _guard = self.lock.lock().await;
        match self.read().await? {
            Some(version) => Ok(version),
            None => {
                let version = self.now();
                self.write(version).await?;
                tracing::debug!(path = %self.path.display(), %version, "version marker created");
                Ok(version)
            }
        }
    }

    /// Advance the marker to "now" and return the new value.
    ///
    /// The result is always later than the previous value, even when the
    /// clock has not moved or went backwards.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the file cannot be written.
    pub async fn touch(&self) -> Result<Timestamp, StorageError> {
        let _guard = self.lock.lock().await;
        let now = self.now();
        let previous = match self.read().await {
            Ok(previous) => previous,
            Err(StorageError::Version { .. }) => {
                tracing::warn!(path = %self.path.display(), "unreadable version marker overwritten");
                None
            }
            Err(err) => return Err(err),
        };
        let version = match previous {
            Some(previous) if now <= previous => previous + TimeDelta::microseconds(1),
            _ => now,
        };
        self.write(version).await?;
        Ok(version)
    }

    /// The clock truncated to the precision the marker file keeps.
    fn now(&self) -> Timestamp {
        self.clock.now().trunc_subsecs(6)
    }

    async fn read(&self) -> Result<Option<Timestamp>, StorageError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::io(&self.path, err)),
        };
        time::parse(&text)
            .map(Some)
            .map_err(|source| StorageError::Version {
                path: self.path.clone(),
                source,
            })
    }

    async fn write(&self, version: Timestamp) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| StorageError::io(parent, err))?;
        }
        fs::write(&self.path, time::format(version))
            .await
            .map_err(|err| StorageError::io(&self.path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex as StdMutex;

    /// Returns the queued instants in order, then repeats the last one.
    struct ScriptedClock(StdMutex<Vec<Timestamp>>);

    impl ScriptedClock {
        fn new(mut instants: Vec<Timestamp>) -> Self {
            instants.reverse();
            Self(StdMutex::new(instants))
        }
    }

    impl Clock for ScriptedClock {
        fn now(&self) -> Timestamp {
            let mut queue = self.0.lock().unwrap();
            if queue.len() > 1 {
                queue.pop().unwrap()
            } else {
                queue[0]
            }
        }
    }

    fn at(secs: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, secs).unwrap()
    }

    #[tokio::test]
    async fn should_create_marker_on_first_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version.txt");
        let marker = VersionMarker::with_clock(&path, ScriptedClock::new(vec![at(1), at(2)]));

        assert_eq!(marker.get_or_create().await.unwrap(), at(1));
        let stored = std::fs::read_to_string(&path).unwrap();
        assert_eq!(time::parse(&stored).unwrap(), at(1));

        // an existing marker is returned as is
        assert_eq!(marker.get_or_create().await.unwrap(), at(1));
    }

    #[tokio::test]
    async fn should_advance_with_the_clock() {
        let dir = tempfile::tempdir().unwrap();
        let marker = VersionMarker::with_clock(
            dir.path().join("version.txt"),
            ScriptedClock::new(vec![at(1), at(5)]),
        );
        let first = marker.touch().await.unwrap();
        let second = marker.touch().await.unwrap();
        assert_eq!(first, at(1));
        assert_eq!(second, at(5));
    }

    #[tokio::test]
    async fn should_strictly_increase_when_clock_stands_still() {
        let dir = tempfile::tempdir().unwrap();
        let marker =
            VersionMarker::with_clock(dir.path().join("version.txt"), ScriptedClock::new(vec![at(3)]));
        let first = marker.touch().await.unwrap();
        let second = marker.touch().await.unwrap();
        assert!(second > first);
        assert_eq!(second - first, TimeDelta::microseconds(1));
        assert_eq!(marker.get_or_create().await.unwrap(), second);
    }

    #[tokio::test]
    async fn should_return_what_a_later_read_sees() {
        let dir = tempfile::tempdir().unwrap();
        let precise = at(4) + TimeDelta::nanoseconds(1_234_567);
        let marker =
            VersionMarker::with_clock(dir.path().join("version.txt"), ScriptedClock::new(vec![precise]));
        let touched = marker.touch().await.unwrap();
        assert_eq!(touched, at(4) + TimeDelta::microseconds(1_234));
        assert_eq!(marker.get_or_create().await.unwrap(), touched);
    }

    #[tokio::test]
    async fn should_create_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let marker = VersionMarker::new(dir.path().join("nested/deeper/version.txt"));
        marker.touch().await.unwrap();
        assert!(marker.path().exists());
    }

    #[tokio::test]
    async fn should_reject_garbled_marker_on_read_but_repair_on_touch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version.txt");
        std::fs::write(&path, "yesterday").unwrap();
        let marker = VersionMarker::with_clock(&path, ScriptedClock::new(vec![at(7)]));

        assert!(matches!(
            marker.get_or_create().await,
            Err(StorageError::Version { .. })
        ));
        assert_eq!(marker.touch().await.unwrap(), at(7));
        assert_eq!(marker.get_or_create().await.unwrap(), at(7));
    }
}
