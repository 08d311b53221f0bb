//! Durable in-flight state for each work stage.
//!
//! Every non-trivial mutation a stage makes to its in-memory state is
//! written through to the registry as a JSON blob attached to the work
//! item. A worker that crashes mid-stage leaves the last durable blob
//! intact; the next worker reconstructs from it.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::Action;
use crate::error::Result;
use crate::models::{IntellectualObject, WorkSummary};

/// The registry record wrapping a stage's serialized state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkItemState {
    #[serde(default)]
    pub id: i64,

    pub work_item_id: i64,

    pub action: Action,

    /// The stage state, serialized as JSON
    #[serde(default)]
    pub state: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkItemState {
    pub fn new(work_item_id: i64, action: Action) -> Self {
        Self {
            id: 0,
            work_item_id,
            action,
            state: String::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn has_data(&self) -> bool {
        !self.state.trim().is_empty()
    }

    /// Serialize a stage state into this record.
    pub fn set_state<T: Serialize>(&mut self, state: &T) -> Result<()> {
        self.state = serde_json::to_string(state)?;
        Ok(())
    }

    /// Decode the stage state; `None` when no data has been saved yet.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        if !self.has_data() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&self.state)?))
    }
}

/// In-flight state for the ingest pipeline (fetch, store, record).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestState {
    pub fetch: WorkSummary,
    pub store: WorkSummary,
    pub record: WorkSummary,

    /// The object under ingest, as known so far
    #[serde(default)]
    pub object: Option<IntellectualObject>,

    /// Scratch path of the downloaded tar
    #[serde(default)]
    pub tar_path: String,

    /// Path of the preserved validation side-index
    #[serde(default)]
    pub valdb_path: String,
}

/// One file's cold-tier thaw request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ColdRestoreRequest {
    pub generic_file_identifier: String,

    /// Cold-tier bucket holding the file
    #[serde(default)]
    pub bucket: String,

    /// Object key within the bucket (the file's storage UUID)
    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub requested_at: Option<DateTime<Utc>>,

    /// Whether the cold tier accepted our thaw request
    #[serde(default)]
    pub request_accepted: bool,

    /// Whether the thawed copy is now readable from primary storage
    #[serde(default)]
    pub is_available_in_primary: bool,

    /// Whether a thaw was already in progress when we asked
    #[serde(default)]
    pub someone_else_requested: bool,

    /// When the thawed copy will be removed from primary storage
    #[serde(default)]
    pub estimated_deletion_from_primary: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
}

/// In-flight state for the cold-tier restore stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ColdRestoreState {
    pub work_summary: WorkSummary,

    #[serde(default)]
    pub object_identifier: String,

    /// Set when the work item targets a single file
    #[serde(default)]
    pub generic_file_identifier: String,

    /// The object, fetched from the registry on first need
    #[serde(default)]
    pub object: Option<IntellectualObject>,

    /// One request record per target file
    #[serde(default)]
    pub requests: Vec<ColdRestoreRequest>,
}

impl ColdRestoreState {
    pub fn find_request(&self, file_identifier: &str) -> Option<&ColdRestoreRequest> {
        self.requests
            .iter()
            .find(|r| r.generic_file_identifier == file_identifier)
    }

    pub fn find_request_mut(&mut self, file_identifier: &str) -> Option<&mut ColdRestoreRequest> {
        self.requests
            .iter_mut()
            .find(|r| r.generic_file_identifier == file_identifier)
    }

    /// Whether every target file is readable from primary storage.
    pub fn all_available(&self) -> bool {
        !self.requests.is_empty() && self.requests.iter().all(|r| r.is_available_in_primary)
    }

    /// Whether any file still needs a thaw request issued.
    pub fn any_unrequested(&self) -> bool {
        self.requests.iter().any(|r| !r.request_accepted)
    }
}

/// In-flight state for the restore stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RestoreState {
    pub work_summary: WorkSummary,

    #[serde(default)]
    pub object_identifier: String,

    /// Staging directory the bag is rebuilt in
    #[serde(default)]
    pub staging_path: String,

    /// Path of the rebuilt tar, once packaged
    #[serde(default)]
    pub tar_path: String,

    /// URL of the restored bag in the institution's restore bucket
    #[serde(default)]
    pub restore_url: String,

    #[serde(default)]
    pub packaged_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// In-flight state for the delete stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeleteState {
    pub work_summary: WorkSummary,

    #[serde(default)]
    pub generic_file_identifier: String,

    /// Who asked for the deletion, for the PREMIS record
    #[serde(default)]
    pub requested_by: String,

    #[serde(default)]
    pub primary_deleted_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub replica_deleted_at: Option<DateTime<Utc>>,
}

/// In-flight state for the peer replication pipeline
/// (package, copy, store, record).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PeerReplicationState {
    pub package: WorkSummary,
    pub copy: WorkSummary,
    pub store: WorkSummary,
    pub record: WorkSummary,

    #[serde(default)]
    pub object_identifier: String,

    /// Identifier of the bag on the peer network
    #[serde(default)]
    pub peer_bag_identifier: String,

    /// Local path of the packaged or copied bag
    #[serde(default)]
    pub bag_path: String,

    /// sha256 of the packaged bag's tag manifest, the peer fixity value
    #[serde(default)]
    pub fixity_sha256: String,

    /// Where the bag landed in peer preservation storage
    #[serde(default)]
    pub storage_url: String,

    #[serde(default)]
    pub stored_at: Option<DateTime<Utc>>,
}
