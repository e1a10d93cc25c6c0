//! Content-addressed artifact cache
//!
//! Artifacts are cached in memory keyed by path, with a file fingerprint
//! (path, mtime, size) deciding freshness. A load hits disk only when the
//! fingerprint changed since the cached copy was taken. Saves are atomic
//! from the reader's point of view: the previous file is renamed to
//! `<path>.backup` before the new one is written, and the new file is
//! re-read and row-counted before the save is considered successful.

use crate::artifact::TableArtifact;
use crate::error::{PipelineError, Result};
use leadflow_common::fingerprint::{file_fingerprint, Fingerprint};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

struct CacheEntry {
    fingerprint: Fingerprint,
    payload: Arc<TableArtifact>,
}

/// In-process cache over CSV artifacts.
#[derive(Default)]
pub struct ContentCache {
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
    disk_reads: AtomicU64,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times a load actually touched disk. Test hook.
    pub fn disk_reads(&self) -> u64 {
        self.disk_reads.load(Ordering::Relaxed)
    }

    /// Load an artifact, serving from memory when the file is unchanged.
    pub fn load(&self, path: &Path) -> Result<Arc<TableArtifact>> {
        let current = file_fingerprint(path)?;

        {
            let entries = self.lock_entries();
            if let Some(entry) = entries.get(path) {
                if entry.fingerprint == current {
                    debug!(path = %path.display(), "Artifact cache hit");
                    return Ok(entry.payload.clone());
                }
            }
        }

        debug!(path = %path.display(), "Artifact cache miss, reading from disk");
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
        let payload = Arc::new(TableArtifact::read_csv(path)?);
        // Fingerprint taken before the read; a concurrent writer at worst
        // forces one extra disk read on the next load.
        self.lock_entries().insert(
            path.to_path_buf(),
            CacheEntry {
                fingerprint: current,
                payload: payload.clone(),
            },
        );

        Ok(payload)
    }

    /// Persist an artifact with backup and read-back verification.
    pub fn save(&self, artifact: &TableArtifact, path: &Path) -> Result<()> {
        self.save_inner(artifact, path, artifact.row_count())
    }

    fn save_inner(
        &self,
        artifact: &TableArtifact,
        path: &Path,
        expected_rows: usize,
    ) -> Result<()> {
        if path.exists() {
            let backup = backup_path(path);
            std::fs::rename(path, &backup)?;
            debug!(
                path = %path.display(),
                backup = %backup.display(),
                "Previous artifact moved to backup"
            );
        }

        artifact.write_csv(path)?;

        let reread = TableArtifact::read_csv(path)?;
        if reread.row_count() != expected_rows {
            return Err(PipelineError::integrity(
                path,
                expected_rows,
                reread.row_count(),
            ));
        }

        let fingerprint = file_fingerprint(path)?;
        self.lock_entries().insert(
            path.to_path_buf(),
            CacheEntry {
                fingerprint,
                payload: Arc::new(artifact.clone()),
            },
        );

        info!(
            path = %path.display(),
            rows = expected_rows,
            "Artifact saved and verified"
        );
        Ok(())
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".backup");
    PathBuf::from(name)
}
