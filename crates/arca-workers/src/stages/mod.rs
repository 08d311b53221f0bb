//! The pipeline stages.
//!
//! Ingest runs fetch → store → record; the branch pipelines (cold-tier
//! restore, restore, delete, peer replication) are built on the same
//! framework. Each stage only enqueues the next on success, so stages
//! execute strictly in order within one work item.

pub mod delete;
pub mod dpn;
pub mod fetch;
pub mod glacier;
pub mod record;
pub mod restore;
pub mod store;

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use arca_common::constants::Action;
use arca_common::models::{WorkItem, WorkItemState};

use crate::context::Context;
use crate::error::{Result, WorkerError};
use crate::worker::{backoff_delay, Outcome};

/// Topic names, one per stage.
pub mod topics {
    pub const FETCH: &str = "ingest_fetch";
    pub const STORE: &str = "ingest_store";
    pub const RECORD: &str = "ingest_record";
    pub const COLD_RESTORE: &str = "cold_restore";
    pub const RESTORE: &str = "restore";
    pub const DELETE: &str = "delete";
    pub const PEER_PACKAGE: &str = "peer_package";
    pub const PEER_COPY: &str = "peer_copy";
    pub const PEER_STORE: &str = "peer_store";
    pub const PEER_RECORD: &str = "peer_record";
}

/// Load the work item's state blob, decoded into the stage's typed
/// state; both are fresh when nothing has been saved yet.
pub(crate) async fn load_state<T>(
    ctx: &Context,
    item: &WorkItem,
    action: Action,
) -> Result<(WorkItemState, T)>
where
    T: DeserializeOwned + Default,
{
    match ctx.registry.get_work_item_state(item.id).await? {
        Some(record) => {
            let state = record.decode::<T>()?.unwrap_or_default();
            Ok((record, state))
        }
        None => Ok((WorkItemState::new(item.id, action), T::default())),
    }
}

/// Serialize the typed state into the record and write it through.
pub(crate) async fn persist_state<T: Serialize>(
    ctx: &Context,
    record: &mut WorkItemState,
    state: &T,
) -> Result<()> {
    record.set_state(state)?;
    let saved = ctx.registry.save_work_item_state(record).await?;
    record.id = saved.id;
    Ok(())
}

/// Map an error onto the outcome alphabet: transient failures requeue
/// with exponential backoff, everything else is fatal.
pub(crate) fn outcome_for_error(item: &mut WorkItem, attempt: u32, error: &WorkerError) -> Outcome {
    if error.is_transient() {
        item.note = format!("Will retry: {}", error);
        Outcome::Requeue(backoff_delay(attempt))
    } else {
        item.note = error.to_string();
        Outcome::FailFatal
    }
}

/// The institution portion of an object identifier.
pub(crate) fn institution_of(object_identifier: &str) -> &str {
    object_identifier.split('/').next().unwrap_or_default()
}

/// Bag name from a scratch tar path: base name minus `.tar`.
pub(crate) fn bag_name_of(tar_path: &Path) -> String {
    let name = tar_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(".tar").unwrap_or(&name).to_string()
}
