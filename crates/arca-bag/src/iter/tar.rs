//! Forward-only iteration over tarred bags.

use std::fs::File;
use std::path::Path;

use chrono::DateTime;
use tar::{Archive, EntryType};

use super::{EntryVisitor, FileSummary};
use crate::error::Result;

/// Visit every entry of the tar in archive order.
///
/// Tarred bags conventionally wrap their contents in a top-level folder
/// named after the bag; that leading component is stripped from
/// `rel_path` so tar and directory bags present identical paths.
pub fn visit_entries(path: &Path, visit: EntryVisitor<'_>) -> Result<()> {
    let file = File::open(path)?;
    let mut archive = Archive::new(file);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let header = entry.header();

        let entry_path = entry.path()?.to_string_lossy().into_owned();
        let rel_path = strip_bag_folder(&entry_path);
        if rel_path.is_empty() {
            // the wrapper directory itself
            continue;
        }

        let summary = FileSummary {
            rel_path,
            abs_path: String::new(),
            size: header.size().unwrap_or(0) as i64,
            mod_time: header
                .mtime()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs as i64, 0)),
            uid: header.uid().unwrap_or(0) as u32,
            gid: header.gid().unwrap_or(0) as u32,
            is_regular: header.entry_type() == EntryType::Regular,
        };

        visit(&mut entry, &summary)?;
        // An entry the visitor did not drain is skipped by the archive
        // reader when the loop advances.
    }

    Ok(())
}

fn strip_bag_folder(entry_path: &str) -> String {
    let trimmed = entry_path.trim_end_matches('/');
    match trimmed.split_once('/') {
        Some((_, rest)) => rest.to_string(),
        None => {
            // No separator: either the wrapper directory itself (drop)
            // or a bare top-level file in an unwrapped tar (keep).
            if entry_path.ends_with('/') {
                String::new()
            } else {
                trimmed.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_wrapper_folder() {
        assert_eq!(strip_bag_folder("my_bag/data/a.txt"), "data/a.txt");
        assert_eq!(strip_bag_folder("my_bag/bagit.txt"), "bagit.txt");
        assert_eq!(strip_bag_folder("my_bag/"), "");
    }

    #[test]
    fn keeps_bare_top_level_files() {
        assert_eq!(strip_bag_folder("bagit.txt"), "bagit.txt");
    }
}
