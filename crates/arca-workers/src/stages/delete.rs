//! Delete: remove a preserved file's copies at the depositor's
//! request.
//!
//! Both the primary copy and the cold-tier replica are deleted, and a
//! deletion PREMIS event carrying the requesting user is recorded. The
//! registry's file row is kept as the audit anchor; only the stored
//! bytes go away.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use arca_common::constants::{Action, StorageOption};
use arca_common::models::{DeleteState, PremisEvent, WorkItem};

use crate::context::Context;
use crate::error::{Result, WorkerError};
use crate::stages::{self, topics};
use crate::worker::{Outcome, Stage};

pub struct DeleteStage;

#[async_trait::async_trait]
impl Stage for DeleteStage {
    fn topic(&self) -> &'static str {
        topics::DELETE
    }

    async fn handle(&self, ctx: Arc<Context>, item: &mut WorkItem) -> Outcome {
        if item.generic_file_identifier.is_empty() {
            let e = WorkerError::invariant(format!(
                "delete work item {} names no file",
                item.id
            ));
            return stages::outcome_for_error(item, 1, &e);
        }

        let (mut record, mut state) =
            match stages::load_state::<DeleteState>(&ctx, item, Action::Delete).await {
                Ok(loaded) => loaded,
                Err(e) => return stages::outcome_for_error(item, 1, &e),
            };
        state.work_summary.start();
        state.generic_file_identifier = item.generic_file_identifier.clone();
        state.requested_by = item.user.clone();

        match self.delete_file(&ctx, item, &mut state).await {
            Ok(()) => {
                state.work_summary.finish();
                let _ = stages::persist_state(&ctx, &mut record, &state).await;
                info!(
                    work_item_id = item.id,
                    file = %item.generic_file_identifier,
                    "File deleted from preservation storage"
                );
                item.note = format!("Deleted {}", item.generic_file_identifier);
                Outcome::Finish
            }
            Err(e) => {
                state.work_summary.add_error(e.to_string());
                let _ = stages::persist_state(&ctx, &mut record, &state).await;
                stages::outcome_for_error(item, state.work_summary.attempt_number, &e)
            }
        }
    }
}

impl DeleteStage {
    async fn delete_file(
        &self,
        ctx: &Context,
        item: &WorkItem,
        state: &mut DeleteState,
    ) -> Result<()> {
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
        let key = gf.preservation_storage_key()?.to_string();

        if state.primary_deleted_at.is_none() {
            let (region, bucket) = ctx.config.primary_target(gf.storage_option)?;
            ctx.store.delete(&region, &bucket, &key).await?;
            state.primary_deleted_at = Some(Utc::now());
        }

        if gf.storage_option == StorageOption::Standard && state.replica_deleted_at.is_none() {
            let (region, bucket) = ctx.config.cold_target(StorageOption::Standard)?;
            ctx.store.delete(&region, &bucket, &key).await?;
            state.replica_deleted_at = Some(Utc::now());
        }

        let requested_by = if item.user.is_empty() {
            "an institutional administrator"
        } else {
            &item.user
        };
        let event = PremisEvent::file_deletion(Utc::now(), requested_by)
            .for_file(&gf.identifier, &gf.intellectual_object_identifier);
        ctx.registry.create_event(&event).await?;
        Ok(())
    }
}
