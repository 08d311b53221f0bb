//! Iteration over untarred (directory) bags.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use super::{EntryVisitor, FileSummary};
use crate::error::Result;

/// Visit every entry under the bag root in lexicographic order.
pub fn visit_entries(root: &Path, visit: EntryVisitor<'_>) -> Result<()> {
    for entry in WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = entry.map_err(|e| std::io::Error::other(e))?;
        let metadata = entry.metadata().map_err(|e| std::io::Error::other(e))?;

        let rel_path = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();

        let (uid, gid) = owner_ids(&metadata);
        let summary = FileSummary {
            rel_path,
            abs_path: entry.path().to_string_lossy().into_owned(),
            size: metadata.len() as i64,
            mod_time: metadata
                .modified()
                .ok()
                .map(DateTime::<Utc>::from),
            uid,
            gid,
            is_regular: metadata.is_file(),
        };

        if summary.is_regular {
            let mut file = File::open(entry.path())?;
            visit(&mut file, &summary)?;
        } else {
            visit(&mut std::io::empty(), &summary)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn owner_ids(metadata: &std::fs::Metadata) -> (u32, u32) {
    use std::os::unix::fs::MetadataExt;
    (metadata.uid(), metadata.gid())
}

#[cfg(not(unix))]
fn owner_ids(_metadata: &std::fs::Metadata) -> (u32, u32) {
    (0, 0)
}
