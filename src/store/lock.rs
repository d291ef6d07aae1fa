use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::store::StoreError;

/// Exclusive OS-level lock on `<store>.lock`, held for one read-modify-write.
/// Released when dropped.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Blocks until no other holder (in this or another process) remains.
    pub fn acquire(store_path: &Path) -> Result<Self, StoreError> {
        let path = lock_path(store_path);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| StoreError::Lock {
                path: path.clone(),
                source,
            })?;

        FileExt::lock_exclusive(&file).map_err(|source| StoreError::Lock {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "acquired store lock");

        Ok(Self { file, path })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(path = %self.path.display(), "unlock failed: {}", e);
        }
    }
}

fn lock_path(store_path: &Path) -> PathBuf {
    let mut name = store_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    store_path.with_file_name(name)
}
