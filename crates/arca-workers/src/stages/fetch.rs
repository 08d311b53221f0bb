//! Ingest stage 1: download the deposited tar and validate it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use arca_bag::validation::{BagValidationConfig, Validator};
use arca_common::constants::{Action, Stage as ItemStage, Status};
use arca_common::models::{IngestState, WorkItem};

use crate::context::Context;
use crate::error::WorkerError;
use crate::stages::{self, topics};
use crate::volume;
use crate::worker::{Outcome, Stage};

/// Scratch the download needs beyond the tar itself: the side-index
/// plus the unpacked copy the store stage makes.
const SCRATCH_FACTOR: u64 = 3;

/// Downloads a bag from its receiving bucket into scratch and runs the
/// validator with extended attributes preserved. Valid bags move on to
/// the store topic; invalid bags fail fatally with the full error list
/// in the work-item note.
pub struct FetchStage;

impl FetchStage {
    fn tar_path(ctx: &Context, item: &WorkItem) -> PathBuf {
        ctx.config.scratch_dir.join(item.id.to_string()).join(&item.name)
    }
}

#[async_trait::async_trait]
impl Stage for FetchStage {
    fn topic(&self) -> &'static str {
        topics::FETCH
    }

    async fn handle(&self, ctx: Arc<Context>, item: &mut WorkItem) -> Outcome {
        let (mut record, mut state) =
            match stages::load_state::<IngestState>(&ctx, item, Action::Ingest).await {
                Ok(loaded) => loaded,
                Err(e) => return stages::outcome_for_error(item, 1, &e),
            };
        state.fetch.start();

        // Scratch admission gate: shared disk, checked before download.
        let needed = (item.size.max(0) as u64).saturating_mul(SCRATCH_FACTOR);
        if let Err(e) = volume::require_space(&ctx.config.scratch_dir, needed) {
            warn!(work_item_id = item.id, error = %e, "Deferring fetch until scratch frees up");
            item.note = format!("Waiting for scratch space: {}", e);
            return Outcome::Requeue(Duration::from_secs(10 * 60));
        }

        let tar_path = Self::tar_path(&ctx, item);
        if let Err(e) = ctx
            .store
            .download_to_file(&ctx.config.primary_region, &item.bucket, &item.name, &tar_path)
            .await
        {
            state.fetch.add_error(e.to_string());
            let _ = stages::persist_state(&ctx, &mut record, &state).await;
            return stages::outcome_for_error(item, state.fetch.attempt_number, &e);
        }

        let validation_config = match BagValidationConfig::load(&ctx.config.validation_config) {
            Ok(config) => config,
            Err(e) => {
                let e = WorkerError::from(e);
                return stages::outcome_for_error(item, state.fetch.attempt_number, &e);
            }
        };

        let bag_path = tar_path.clone();
        let validated = tokio::task::spawn_blocking(move || {
            let validator = Validator::new(&bag_path, validation_config, true)?;
            let db_path = validator.db_path();
            let summary = validator.validate()?;
            Ok::<_, arca_bag::BagError>((summary, db_path))
        })
        .await;

        let (summary, db_path) = match validated {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                let e = WorkerError::from(e);
                state.fetch.add_error(e.to_string());
                let _ = stages::persist_state(&ctx, &mut record, &state).await;
                return stages::outcome_for_error(item, state.fetch.attempt_number, &e);
            }
            Err(join_error) => {
                let e = WorkerError::invariant(format!("validator task failed: {}", join_error));
                return stages::outcome_for_error(item, state.fetch.attempt_number, &e);
            }
        };

        if summary.has_errors() {
            // Malformed bag: fatal for the work item, every error in
            // the operator-visible note.
            for error in &summary.errors {
                state.fetch.add_error(error.clone());
            }
            state.fetch.finish();
            let _ = stages::persist_state(&ctx, &mut record, &state).await;
            item.note = summary.all_errors_as_string();
            return Outcome::FailFatal;
        }

        state.tar_path = tar_path.to_string_lossy().into_owned();
        state.valdb_path = db_path.to_string_lossy().into_owned();
        state.fetch.finish();
        if let Err(e) = stages::persist_state(&ctx, &mut record, &state).await {
            return stages::outcome_for_error(item, state.fetch.attempt_number, &e);
        }

        info!(work_item_id = item.id, bag = %item.name, "Bag validated, forwarding to store");
        item.stage = ItemStage::Store;
        item.status = Status::Pending;
        item.note = "Bag validated, awaiting storage".to_string();
        item.release();
        if let Err(e) = ctx.queue.publish(topics::STORE, item.id).await {
            return stages::outcome_for_error(item, state.fetch.attempt_number, &e);
        }
        Outcome::Finish
    }
}
