//! Process-wide registry of open store locations.
//!
//! The directory LOCK file excludes other processes. The registry rejects a
//! second open from this process before the directory is touched.

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static OPEN_LOCATIONS: LazyLock<Mutex<HashSet<PathBuf>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// Hands out at most one lease per store location.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreRegistry;

impl StoreRegistry {
    /// Claims `path` for the caller.
    ///
    /// The path is canonicalized when it exists, so different spellings of
    /// one directory share a lease.
    ///
    /// # Errors
    ///
    /// Returns `StoreLocked` if the location is already held.
    pub fn acquire(path: &Path) -> CoreResult<LocationLease> {
        let location = canonical(path);
        let mut open = OPEN_LOCATIONS.lock();
        if !open.insert(location.clone()) {
            return Err(CoreError::locked(location));
        }
        debug!(location = %location.display(), "store location acquired");
        Ok(LocationLease { location })
    }

    /// Whether `path` is currently held.
    #[must_use]
    pub fn is_held(path: &Path) -> bool {
        OPEN_LOCATIONS.lock().contains(&canonical(path))
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Claim on one store location. Dropping it releases the location.
#[derive(Debug)]
pub struct LocationLease {
    location: PathBuf,
}

impl LocationLease {
    /// The canonical location held.
    #[must_use]
    pub fn location(&self) -> &Path {
        &self.location
    }
}

impl Drop for LocationLease {
    fn drop(&mut self) {
        OPEN_LOCATIONS.lock().remove(&self.location);
        debug!(location = %self.location.display(), "store location released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_acquire_fails_until_release() {
        let temp = tempdir().unwrap();
        let lease = StoreRegistry::acquire(temp.path()).unwrap();
        assert!(StoreRegistry::is_held(temp.path()));
        assert!(matches!(
            StoreRegistry::acquire(temp.path()),
            Err(CoreError::StoreLocked { .. })
        ));

        drop(lease);
        assert!(!StoreRegistry::is_held(temp.path()));
        let _again = StoreRegistry::acquire(temp.path()).unwrap();
    }

    #[test]
    fn spellings_of_one_directory_share_a_lease() {
        let temp = tempdir().unwrap();
        let inner = temp.path().join("store");
        std::fs::create_dir(&inner).unwrap();
        let _lease = StoreRegistry::acquire(&inner).unwrap();

        let dotted = temp.path().join(".").join("store");
        assert!(StoreRegistry::acquire(&dotted).is_err());
    }
}
