//! Registry of synthesized audio files and their reclamation.

use crate::defaults;
use crate::error::{RelayError, Result};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Outcome of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Registered artifacts reclaimed (file deleted or already gone).
    pub removed: usize,
    /// Stale files found in the directory without a registry entry.
    pub untracked_removed: usize,
}

/// Tracks synthesized artifacts by filename within one directory.
///
/// Registry entries are removed before their files, so a sweep racing a
/// clear never reports an error: deleting an already-missing file counts
/// as reclaimed.
#[derive(Debug)]
pub struct ArtifactCache {
    dir: PathBuf,
    registry: Mutex<HashMap<String, SystemTime>>,
    sweeping: AtomicBool,
}

impl ArtifactCache {
    /// Creates a cache rooted at `dir` without touching the filesystem.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            registry: Mutex::new(HashMap::new()),
            sweeping: AtomicBool::new(false),
        }
    }

    /// Creates a cache rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let cache = Self::new(dir);
        fs::create_dir_all(&cache.dir).map_err(|e| RelayError::ArtifactStorage {
            message: format!("Failed to create {}: {}", cache.dir.display(), e),
        })?;
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Allocates a unique artifact name and its full path.
    ///
    /// Names look like `output_1a2b3c4d_1718000000.mp3`. Nothing is
    /// registered until [`register`](Self::register) is called.
    pub fn new_artifact(&self) -> (String, PathBuf) {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let filename = format!(
            "output_{}_{}.{}",
            &id[..8],
            secs,
            defaults::ARTIFACT_EXTENSION
        );
        let path = self.dir.join(&filename);
        (filename, path)
    }

    /// Records an artifact created at `created`.
    pub fn register(&self, filename: &str, created: SystemTime) {
        self.lock().insert(filename.to_string(), created);
    }

    /// Drops one artifact and deletes its file. Returns whether it was tracked.
    pub fn remove(&self, filename: &str) -> bool {
        let tracked = self.lock().remove(filename).is_some();
        self.delete_file(filename);
        tracked
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.lock().contains_key(filename)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Reclaims every artifact older than `max_age`.
    pub fn sweep(&self, max_age: Duration) -> SweepReport {
        self.sweep_at(SystemTime::now(), max_age)
    }

    /// Reclaims every artifact older than `max_age` as of `now`.
    ///
    /// Registered artifacts are aged by their registration timestamp.
    /// Files in the directory with no registry entry (left over from an
    /// earlier process) are aged by their modification time.
    pub fn sweep_at(&self, now: SystemTime, max_age: Duration) -> SweepReport {
        let expired: Vec<String> = {
            let mut registry = self.lock();
            let expired: Vec<String> = registry
                .iter()
                .filter(|(_, created)| is_older_than(now, **created, max_age))
                .map(|(name, _)| name.clone())
                .collect();
            for name in &expired {
                registry.remove(name);
            }
            expired
        };

        for name in &expired {
            self.delete_file(name);
            tracing::debug!(artifact = %name, "reclaimed expired artifact");
        }

        let untracked_removed = self.sweep_untracked(now, max_age);

        let report = SweepReport {
            removed: expired.len(),
            untracked_removed,
        };
        if report.removed > 0 || report.untracked_removed > 0 {
            tracing::info!(
                removed = report.removed,
                untracked_removed = report.untracked_removed,
                remaining = self.len(),
                "artifact sweep finished"
            );
        }
        report
    }

    /// Removes every tracked artifact regardless of age. Returns the count.
    pub fn clear(&self) -> usize {
        let names: Vec<String> = self.lock().drain().map(|(name, _)| name).collect();
        for name in &names {
            self.delete_file(name);
        }
        names.len()
    }

    /// Marks a background sweep as running. Returns false if one already is.
    pub(crate) fn begin_sweep(&self) -> bool {
        self.sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_sweep(&self) {
        self.sweeping.store(false, Ordering::Release);
    }

    fn sweep_untracked(&self, now: SystemTime, max_age: Duration) -> usize {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return 0,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "cannot scan artifact dir");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_artifact_name(&name) || self.contains(&name) {
                continue;
            }
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            if is_older_than(now, modified, max_age) {
                self.delete_file(&name);
                removed += 1;
            }
        }
        removed
    }

    fn delete_file(&self, filename: &str) {
        let path = self.dir.join(filename);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete artifact");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SystemTime>> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// True for names shaped like [`ArtifactCache::new_artifact`] output:
/// `output_<8 hex>_<unix seconds>.<ARTIFACT_EXTENSION>`.
fn is_artifact_name(name: &str) -> bool {
    let Some(stem) = name
        .strip_prefix("output_")
        .and_then(|rest| rest.strip_suffix(defaults::ARTIFACT_EXTENSION))
        .and_then(|rest| rest.strip_suffix('.'))
    else {
        return false;
    };
    let Some((id, secs)) = stem.split_once('_') else {
        return false;
    };
    id.len() == 8
        && id.bytes().all(|b| b.is_ascii_hexdigit())
        && !secs.is_empty()
        && secs.bytes().all(|b| b.is_ascii_digit())
}

fn is_older_than(now: SystemTime, then: SystemTime, max_age: Duration) -> bool {
    now.duration_since(then)
        .map(|age| age > max_age)
        .unwrap_or(false)
}
