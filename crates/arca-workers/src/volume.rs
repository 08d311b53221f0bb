//! Free-disk admission gate for the scratch volume.
//!
//! Scratch disk is shared across every stage on a host, so fetch asks
//! this gate before downloading a bag.

use std::path::Path;

use crate::error::{Result, WorkerError};

/// Bytes currently available to unprivileged writers on the filesystem
/// holding `path`.
pub fn available_space(path: &Path) -> Result<u64> {
    let stat = nix::sys::statvfs::statvfs(path)
        .map_err(|e| WorkerError::object_store(format!("statvfs failed: {}", e)))?;
    Ok(stat.blocks_available() as u64 * stat.fragment_size() as u64)
}

/// Fail with [`WorkerError::InsufficientSpace`] unless the filesystem
/// holding `path` has at least `needed` bytes free.
pub fn require_space(path: &Path, needed: u64) -> Result<()> {
    let available = available_space(path)?;
    if available < needed {
        return Err(WorkerError::InsufficientSpace {
            path: path.display().to_string(),
            needed,
            available,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_space_on_a_real_filesystem() {
        let tmp = tempfile::tempdir().unwrap();
        let available = available_space(tmp.path()).unwrap();
        assert!(available > 0);
    }

    #[test]
    fn require_space_accepts_small_and_rejects_absurd() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(require_space(tmp.path(), 1).is_ok());
        let err = require_space(tmp.path(), u64::MAX).unwrap_err();
        assert!(matches!(err, WorkerError::InsufficientSpace { .. }));
        assert!(err.is_transient());
    }
}
