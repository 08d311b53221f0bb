//! Uniform forward-only iteration over bag contents.
//!
//! Tar streams cannot rewind, so the iteration contract is a fresh
//! in-order pass per call: the validator makes one pass to build its
//! side-index and a second to parse manifests and tag files. Directory
//! bags follow the same contract (each pass walks in stable
//! lexicographic order) so both forms share one code path.
//!
//! Entry readers passed to the visitor are only valid during the visit;
//! an entry that is not fully read is skipped cleanly before the next
//! one is yielded.

mod dir;
mod tar;

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{BagError, Result};

/// What the iterator knows about one entry, independent of source.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSummary {
    /// Path relative to the bag root, e.g. "data/img_001.tif"
    pub rel_path: String,

    /// Absolute path on disk; empty when reading from a tar stream
    pub abs_path: String,

    /// Size in bytes
    pub size: i64,

    /// Modification time, when the source records one
    pub mod_time: Option<DateTime<Utc>>,

    /// Owner id, best effort; zero where unavailable
    pub uid: u32,

    /// Group id, best effort; zero where unavailable
    pub gid: u32,

    /// Whether this is a regular file (directories and special entries
    /// are yielded with this unset so callers can skip them)
    pub is_regular: bool,
}

/// Callback receiving each entry in order.
pub type EntryVisitor<'a> = &'a mut dyn FnMut(&mut dyn Read, &FileSummary) -> Result<()>;

/// A bag on disk, either tarred or untarred.
#[derive(Debug, Clone)]
pub enum BagSource {
    Tar(PathBuf),
    Dir(PathBuf),
}

impl BagSource {
    /// Classify a bag path by its `.tar` suffix.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BagError::BagNotFound(path.display().to_string()));
        }
        if path.extension().is_some_and(|ext| ext == "tar") {
            Ok(BagSource::Tar(path.to_path_buf()))
        } else {
            Ok(BagSource::Dir(path.to_path_buf()))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            BagSource::Tar(p) | BagSource::Dir(p) => p,
        }
    }

    /// Make one fresh, in-order pass over every entry.
    pub fn visit_entries(&self, visit: EntryVisitor<'_>) -> Result<()> {
        match self {
            BagSource::Tar(path) => tar::visit_entries(path, visit),
            BagSource::Dir(path) => dir::visit_entries(path, visit),
        }
    }
}
