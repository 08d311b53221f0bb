//! The per-bag validation side-index.
//!
//! A single-writer embedded key-value file living next to the bag as
//! `<bag>.valdb`. Keys are the object identifier and each file
//! identifier; values are the serialized in-progress records. The index
//! lets the validator and the store stage work on bags far larger than
//! memory: each pass looks up exactly the record it needs.
//!
//! Concurrent access to one bag's side-index is forbidden; the work-item
//! lease guarantees one worker per bag.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use arca_common::models::{GenericFile, IntellectualObject};

use crate::error::Result;

/// Disk-backed key→record map for one bag.
pub struct ValDb {
    conn: Connection,
    path: PathBuf,
}

impl ValDb {
    /// Open (or create) the side-index at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save a record under the given key, replacing any existing value.
    pub fn save<T: Serialize>(&self, key: &str, record: &T) -> Result<()> {
        let value = serde_json::to_string(record)?;
        self.conn.execute(
            "INSERT INTO records (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Load the record stored under the given key, if any.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM records WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Remove the record stored under the given key.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM records WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// All keys starting with the given prefix, in sorted order.
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        let mut stmt = self.conn.prepare(
            "SELECT key FROM records WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key",
        )?;
        let keys = stmt
            .query_map(params![pattern], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// Number of stored records.
    pub fn record_count(&self) -> Result<i64> {
        let count =
            self.conn
                .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn save_object(&self, object: &IntellectualObject) -> Result<()> {
        self.save(&object.identifier, object)
    }

    pub fn get_object(&self, identifier: &str) -> Result<Option<IntellectualObject>> {
        self.get(identifier)
    }

    pub fn save_file(&self, file: &GenericFile) -> Result<()> {
        self.save(&file.identifier, file)
    }

    pub fn get_file(&self, identifier: &str) -> Result<Option<GenericFile>> {
        self.get(identifier)
    }

    /// Close the index, deleting the file unless the caller asks to
    /// preserve it for a downstream stage.
    pub fn close(self, preserve: bool) -> Result<()> {
        let path = self.path.clone();
        drop(self.conn);
        if !preserve {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
