//! Cold-tier restore initiation.
//!
//! Asks the cold tier to thaw a whole object or a single file, then
//! polls until every target file is readable from primary storage.
//! Requeues with a one-minute delay while thaw requests remain to be
//! made, and with a two-hour delay while accepted requests are still
//! thawing. When everything is available, creates the downstream
//! restore work item and finishes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use arca_common::constants::{Action, Stage as ItemStage, Status};
use arca_common::models::{ColdRestoreRequest, ColdRestoreState, GenericFile, WorkItem};

use crate::context::Context;
use crate::error::{Result, WorkerError};
use crate::s3::{RestoreOutcome, RestoreStatus};
use crate::stages::{self, topics};
use crate::worker::{Outcome, Stage};

/// Delay while more thaw requests remain to be made.
const MORE_REQUESTS_DELAY: Duration = Duration::from_secs(60);

/// Delay while waiting on the cold tier's asynchronous thaw.
const THAW_WAIT_DELAY: Duration = Duration::from_secs(2 * 60 * 60);

pub struct ColdRestoreStage;

#[async_trait::async_trait]
impl Stage for ColdRestoreStage {
    fn topic(&self) -> &'static str {
        topics::COLD_RESTORE
    }

    async fn handle(&self, ctx: Arc<Context>, item: &mut WorkItem) -> Outcome {
        let (mut record, mut state) =
            match stages::load_state::<ColdRestoreState>(&ctx, item, Action::ColdRestore).await {
                Ok(loaded) => loaded,
                Err(e) => return stages::outcome_for_error(item, 1, &e),
            };
        state.work_summary.start();
        state.object_identifier = item.object_identifier.clone();
        state.generic_file_identifier = item.generic_file_identifier.clone();

        let files = match self.target_files(&ctx, item, &mut state).await {
            Ok(files) => files,
            Err(e) => return stages::outcome_for_error(item, state.work_summary.attempt_number, &e),
        };

        for gf in &files {
            if let Err(e) = self.process_file(&ctx, &mut state, gf).await {
                if !e.is_transient() {
                    item.note = e.to_string();
                    let _ = stages::persist_state(&ctx, &mut record, &state).await;
                    return Outcome::FailFatal;
                }
                // Transient per-file failures leave the request record
                // unset; the post-scan requeue picks them up.
                warn!(file = %gf.identifier, error = %e, "Cold-tier request failed, will retry");
                state.work_summary.add_error(e.to_string());
            }
        }

        state.work_summary.finish();
        if let Err(e) = stages::persist_state(&ctx, &mut record, &state).await {
            return stages::outcome_for_error(item, state.work_summary.attempt_number, &e);
        }

        if state.all_available() {
            match self.create_restore_item(&ctx, item).await {
                Ok(()) => {
                    info!(
                        work_item_id = item.id,
                        files = state.requests.len(),
                        "All files thawed, restore work item created"
                    );
                    item.note = "All files are available in primary storage".to_string();
                    Outcome::Finish
                }
                Err(e) => {
                    stages::outcome_for_error(item, state.work_summary.attempt_number, &e)
                }
            }
        } else if state.any_unrequested() {
            item.note = "Requeued to make additional cold-tier restore requests.".to_string();
            Outcome::Requeue(MORE_REQUESTS_DELAY)
        } else {
            item.note = "Requeued to check on status of cold-tier restore requests.".to_string();
            Outcome::Requeue(THAW_WAIT_DELAY)
        }
    }
}

impl ColdRestoreStage {
    /// The files this work item asks to thaw: one, or every file of
    /// the object.
    async fn target_files(
        &self,
        ctx: &Context,
        item: &WorkItem,
        state: &mut ColdRestoreState,
    ) -> Result<Vec<GenericFile>> {
        if !item.generic_file_identifier.is_empty() {
            let gf = ctx
                .registry
                .get_file(&item.generic_file_identifier)
                .await?
                .ok_or_else(|| {
                    WorkerError::invariant(format!(
                        "file '{}' does not exist in the registry",
                        item.generic_file_identifier
                    ))
                })?;
            return Ok(vec![gf]);
        }

        if state.object.is_none() {
            state.object = ctx.registry.get_object(&item.object_identifier).await?;
            if state.object.is_none() {
                return Err(WorkerError::invariant(format!(
                    "object '{}' does not exist in the registry",
                    item.object_identifier
                )));
            }
        }
        ctx.registry.get_object_files(&item.object_identifier).await
    }

    /// One pass over one file: issue the thaw request if we have not
    /// been accepted yet, otherwise check on its progress.
    async fn process_file(
        &self,
        ctx: &Context,
        state: &mut ColdRestoreState,
        gf: &GenericFile,
    ) -> Result<()> {
        let key = gf.preservation_storage_key()?.to_string();
        let (region, bucket) = ctx.config.cold_target(gf.storage_option)?;

        if state.find_request(&gf.identifier).is_none() {
            state.requests.push(ColdRestoreRequest {
                generic_file_identifier: gf.identifier.clone(),
                bucket: bucket.clone(),
                key: key.clone(),
                ..Default::default()
            });
        }
        // Just pushed above when absent.
        let Some(request) = state.find_request_mut(&gf.identifier) else {
            return Err(WorkerError::invariant("request record vanished"));
        };

        let now = Utc::now();
        if !request.request_accepted {
            match ctx
                .store
                .restore_cold_tier(&region, &bucket, &key, ctx.config.restore_retention_hours)
                .await?
            {
                RestoreOutcome::Accepted => {
                    request.request_accepted = true;
                    request.requested_at = Some(now);
                }
                RestoreOutcome::AlreadyInProgress => {
                    request.request_accepted = true;
                    request.someone_else_requested = true;
                    request.requested_at = Some(now);
                    request.last_checked = Some(now);
                }
                RestoreOutcome::AlreadyRestored => {
                    request.request_accepted = true;
                    request.is_available_in_primary = true;
                    request.requested_at = Some(now);
                    request.last_checked = Some(now);
                }
            }
        } else {
            match ctx.store.head(&region, &bucket, &key).await? {
                Some(info) => match info.restore {
                    Some(RestoreStatus::Completed { available_until }) => {
                        request.is_available_in_primary = true;
                        request.estimated_deletion_from_primary = available_until;
                        request.last_checked = Some(now);
                    }
                    Some(RestoreStatus::InProgress) | None => {
                        request.last_checked = Some(now);
                    }
                },
                // Absent or AccessDenied: indistinguishable from "not
                // yet restored" upstream; keep waiting.
                None => {
                    request.last_checked = Some(now);
                }
            }
        }
        Ok(())
    }

    /// Hand off to the restore pipeline.
    async fn create_restore_item(&self, ctx: &Context, item: &WorkItem) -> Result<()> {
        let mut restore_item = WorkItem::new(&item.object_identifier, Action::Restore);
        restore_item.generic_file_identifier = item.generic_file_identifier.clone();
        restore_item.name = item.name.clone();
        restore_item.bucket = item.bucket.clone();
        restore_item.etag = item.etag.clone();
        restore_item.size = item.size;
        restore_item.bag_date = item.bag_date;
        restore_item.institution_id = item.institution_id;
        restore_item.user = item.user.clone();
        restore_item.stage = ItemStage::Requested;
        restore_item.status = Status::Pending;
        restore_item.retry = true;
        let created = ctx.registry.create_work_item(&restore_item).await?;
        ctx.queue.publish(topics::RESTORE, created.id).await?;
        Ok(())
    }
}
