//! Ingest stage 2: copy each file into long-term storage.
//!
//! Every file the validator marked `needs_save` is streamed into the
//! primary bucket under its UUID, then into the cold-tier replication
//! bucket. Progress is written through to the side-index after each
//! copy, so a crashed worker resumes exactly where the last one
//! stopped, and a repeated attempt that finds a matching object at the
//! target key succeeds without re-uploading.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use arca_bag::valdb::ValDb;
use arca_common::constants::{Action, Stage as ItemStage, Status, StorageOption};
use arca_common::models::{GenericFile, IngestState, WorkItem};

use crate::context::Context;
use crate::error::{Result, WorkerError};
use crate::s3::standard_metadata;
use crate::stages::{self, topics};
use crate::worker::{Outcome, Stage};

pub struct StoreStage;

#[async_trait::async_trait]
impl Stage for StoreStage {
    fn topic(&self) -> &'static str {
        topics::STORE
    }

    async fn handle(&self, ctx: Arc<Context>, item: &mut WorkItem) -> Outcome {
        let (mut record, mut state) =
            match stages::load_state::<IngestState>(&ctx, item, Action::Ingest).await {
                Ok(loaded) => loaded,
                Err(e) => return stages::outcome_for_error(item, 1, &e),
            };
        if state.valdb_path.is_empty() {
            let e = WorkerError::invariant(format!(
                "work item {} reached the store stage with no side-index",
                item.id
            ));
            return stages::outcome_for_error(item, 1, &e);
        }
        state.store.start();

        match self.store_files(&ctx, item, &state).await {
            Ok(copied) => {
                state.store.finish();
                if let Err(e) = stages::persist_state(&ctx, &mut record, &state).await {
                    return stages::outcome_for_error(item, state.store.attempt_number, &e);
                }
                info!(
                    work_item_id = item.id,
                    files_copied = copied,
                    "All files stored, forwarding to record"
                );
                item.stage = ItemStage::Record;
                item.status = Status::Pending;
                item.note = format!("{} files copied to long-term storage", copied);
                item.release();
                if let Err(e) = ctx.queue.publish(topics::RECORD, item.id).await {
                    return stages::outcome_for_error(item, state.store.attempt_number, &e);
                }
                Outcome::Finish
            }
            Err(e) => {
                state.store.add_error(e.to_string());
                let _ = stages::persist_state(&ctx, &mut record, &state).await;
                stages::outcome_for_error(item, state.store.attempt_number, &e)
            }
        }
    }
}

impl StoreStage {
    async fn store_files(
        &self,
        ctx: &Context,
        item: &WorkItem,
        state: &IngestState,
    ) -> Result<usize> {
        let tar_path = PathBuf::from(&state.tar_path);
        let bag_name = stages::bag_name_of(&tar_path);
        let db = ValDb::open(&state.valdb_path)?;

        let unpack_root = self.ensure_unpacked(&tar_path).await?;

        let institution = stages::institution_of(&item.object_identifier);
        let mut copied = 0;
        for key in db.keys_with_prefix(&format!("{}/", bag_name))? {
            let Some(mut gf) = db.get_file(&key)? else {
                continue;
            };
            if !gf.ingest.needs_save {
                continue;
            }
            let rel_path = key
                .strip_prefix(&format!("{}/", bag_name))
                .unwrap_or(&key)
                .to_string();

            if gf.ingest.uuid.is_empty() {
                // Not assigned during validation (or a pre-UUID record
                // from an earlier release); assign once, reuse forever.
                gf.ingest.uuid = uuid::Uuid::new_v4().to_string();
                gf.ingest.uuid_generated_at = Some(Utc::now());
                db.save_file(&gf)?;
            }

            let local = self.local_path(&gf, &unpack_root, &bag_name, &rel_path)?;
            let metadata = standard_metadata(
                institution,
                &item.object_identifier,
                &rel_path,
                &gf.ingest.md5,
                &gf.ingest.sha256,
            );

            if gf.ingest.stored_at.is_none() {
                let (region, bucket) = ctx.config.primary_target(gf.storage_option)?;
                let url = self
                    .put_unless_present(ctx, &region, &bucket, &gf, &local, &metadata)
                    .await?;
                gf.ingest.storage_url = url.clone();
                gf.uri = url;
                gf.ingest.stored_at = Some(Utc::now());
                db.save_file(&gf)?;
            } else {
                debug!(identifier = %gf.identifier, "Already stored, skipping upload");
            }

            if gf.storage_option == StorageOption::Standard && gf.ingest.replicated_at.is_none() {
                let (region, bucket) = ctx.config.cold_target(StorageOption::Standard)?;
                let url = self
                    .put_unless_present(ctx, &region, &bucket, &gf, &local, &metadata)
                    .await?;
                gf.ingest.replication_url = url;
                gf.ingest.replicated_at = Some(Utc::now());
                db.save_file(&gf)?;
            }

            copied += 1;
        }

        Ok(copied)
    }

    /// Upload the file unless an object with the same md5 already sits
    /// at the target key.
    async fn put_unless_present(
        &self,
        ctx: &Context,
        region: &str,
        bucket: &str,
        gf: &GenericFile,
        local: &Path,
        metadata: &std::collections::HashMap<String, String>,
    ) -> Result<String> {
        if let Some(info) = ctx.store.head(region, bucket, &gf.ingest.uuid).await? {
            if info.metadata.get("md5").map(String::as_str) == Some(gf.ingest.md5.as_str()) {
                debug!(
                    identifier = %gf.identifier,
                    bucket,
                    "Matching object already at target key, skipping upload"
                );
                return Ok(ctx.store.url_for(region, bucket, &gf.ingest.uuid));
            }
        }
        let content_type = if gf.file_format.is_empty() {
            None
        } else {
            Some(gf.file_format.as_str())
        };
        ctx.store
            .put_file(region, bucket, &gf.ingest.uuid, local, content_type, metadata)
            .await
    }

    /// Unpack the tar next to itself, once. Directory bags and already
    /// unpacked tars are reused as-is.
    async fn ensure_unpacked(&self, tar_path: &Path) -> Result<PathBuf> {
        let root = tar_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let bag_dir = root.join(stages::bag_name_of(tar_path));
        if bag_dir.is_dir() {
            return Ok(root);
        }
        if !tar_path.is_file() {
            return Err(WorkerError::invariant(format!(
                "neither tar {} nor unpacked bag {} exists",
                tar_path.display(),
                bag_dir.display()
            )));
        }
        let tar_path = tar_path.to_path_buf();
        let unpack_to = root.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let file = std::fs::File::open(&tar_path)?;
            let mut archive = tar::Archive::new(file);
            archive.unpack(&unpack_to)?;
            Ok(())
        })
        .await
        .map_err(|e| WorkerError::invariant(format!("unpack task failed: {}", e)))??;
        Ok(root)
    }

    /// Where the file's bytes live on local disk.
    fn local_path(
        &self,
        gf: &GenericFile,
        unpack_root: &Path,
        bag_name: &str,
        rel_path: &str,
    ) -> Result<PathBuf> {
        if !gf.ingest.local_path.is_empty() {
            let path = PathBuf::from(&gf.ingest.local_path);
            if path.is_file() {
                return Ok(path);
            }
        }
        let wrapped = unpack_root.join(bag_name).join(rel_path);
        if wrapped.is_file() {
            return Ok(wrapped);
        }
        let bare = unpack_root.join(rel_path);
        if bare.is_file() {
            return Ok(bare);
        }
        Err(WorkerError::invariant(format!(
            "file '{}' is missing from the unpacked bag",
            rel_path
        )))
    }
}
