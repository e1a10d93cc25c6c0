//! File fingerprints for staleness detection
//!
//! A fingerprint hashes a file's path, modification time, and size. Two
//! loads of the same unmodified file produce the same fingerprint; any
//! rewrite of the file changes it.

use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Opaque fingerprint of a file's identity and modification state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the fingerprint for a file on disk.
///
/// Fails with the underlying IO error if the file cannot be stat'ed.
pub fn file_fingerprint(path: &Path) -> std::io::Result<Fingerprint> {
    let meta = std::fs::metadata(path)?;
    let mtime = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(mtime.as_nanos().to_le_bytes());
    hasher.update(meta.len().to_le_bytes());

    Ok(Fingerprint(hex::encode(hasher.finalize())))
}
