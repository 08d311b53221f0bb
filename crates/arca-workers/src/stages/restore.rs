//! Restore: rebuild a bag from preserved files and deliver it to the
//! institution's restore bucket.
//!
//! Files are copied from primary storage into a staging tree under
//! their original bag paths, payload manifests are rebuilt from the
//! registry's checksums, the tree is tarred, and the tar is uploaded.
//! Each step records its completion in the work-item state, so a retry
//! resumes after the last completed step.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use arca_common::constants::{Action, DigestAlgorithm};
use arca_common::models::{GenericFile, RestoreState, WorkItem};

use crate::context::Context;
use crate::error::{Result, WorkerError};
use crate::stages::{self, topics};
use crate::worker::{Outcome, Stage};

pub struct RestoreStage;

#[async_trait::async_trait]
impl Stage for RestoreStage {
    fn topic(&self) -> &'static str {
        topics::RESTORE
    }

    async fn handle(&self, ctx: Arc<Context>, item: &mut WorkItem) -> Outcome {
        let (mut record, mut state) =
            match stages::load_state::<RestoreState>(&ctx, item, Action::Restore).await {
                Ok(loaded) => loaded,
                Err(e) => return stages::outcome_for_error(item, 1, &e),
            };
        state.work_summary.start();
        state.object_identifier = item.object_identifier.clone();

        match self.restore_object(&ctx, item, &mut state).await {
            Ok(()) => {
                state.work_summary.finish();
                let _ = stages::persist_state(&ctx, &mut record, &state).await;
                info!(
                    work_item_id = item.id,
                    url = %state.restore_url,
                    "Bag restored"
                );
                item.note = format!("Bag restored to {}", state.restore_url);
                Outcome::Finish
            }
            Err(e) => {
                state.work_summary.add_error(e.to_string());
                let _ = stages::persist_state(&ctx, &mut record, &state).await;
                stages::outcome_for_error(item, state.work_summary.attempt_number, &e)
            }
        }
    }

    async fn cleanup(&self, ctx: Arc<Context>, item: &WorkItem, outcome: &Outcome) {
        if *outcome != Outcome::Finish {
            return;
        }
        if let Ok(Some(record)) = ctx.registry.get_work_item_state(item.id).await {
            if let Ok(Some(state)) = record.decode::<RestoreState>() {
                for path in [&state.staging_path, &state.tar_path] {
                    if path.is_empty() {
                        continue;
                    }
                    let path = Path::new(path);
                    let _ = if path.is_dir() {
                        std::fs::remove_dir_all(path)
                    } else {
                        std::fs::remove_file(path)
                    };
                }
            }
        }
    }
}

impl RestoreStage {
    async fn restore_object(
        &self,
        ctx: &Context,
        item: &WorkItem,
        state: &mut RestoreState,
    ) -> Result<()> {
        let object = ctx
            .registry
            .get_object(&item.object_identifier)
            .await?
            .ok_or_else(|| {
                WorkerError::invariant(format!(
                    "object '{}' does not exist in the registry",
                    item.object_identifier
                ))
            })?;
        let files = ctx
            .registry
            .get_object_files(&item.object_identifier)
            .await?;
        if files.is_empty() {
            return Err(WorkerError::invariant(format!(
                "object '{}' has no files to restore",
                item.object_identifier
            )));
        }

        let bag_name = object.bag_name()?.to_string();
        let staging = ctx
            .config
            .restore_dir
            .join(item.id.to_string())
            .join(&bag_name);
        state.staging_path = staging.to_string_lossy().into_owned();

        if state.packaged_at.is_none() {
            for gf in &files {
                self.fetch_file(ctx, gf, &staging).await?;
            }
            self.write_manifests(&files, &staging).await?;
            let tar_path = self.package(&staging, &bag_name).await?;
            state.tar_path = tar_path.to_string_lossy().into_owned();
            state.packaged_at = Some(Utc::now());
        }

        if state.uploaded_at.is_none() {
            let restore_bucket = self.restore_bucket(ctx, item).await?;
            let url = ctx
                .store
                .put_file(
                    &ctx.config.primary_region,
                    &restore_bucket,
                    &format!("{}.tar", bag_name),
                    Path::new(&state.tar_path),
                    Some("application/x-tar"),
                    &HashMap::new(),
                )
                .await?;
            state.restore_url = url;
            state.uploaded_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Copy one preserved file into the staging tree under its
    /// original bag path. Already-staged files are kept.
    async fn fetch_file(&self, ctx: &Context, gf: &GenericFile, staging: &Path) -> Result<()> {
        let rel_path = gf.original_path()?;
        let target = staging.join(rel_path);
        if target.is_file() {
            debug!(identifier = %gf.identifier, "Already staged, skipping download");
            return Ok(());
        }
        let key = gf.preservation_storage_key()?;
        let (region, bucket) = ctx.config.primary_target(gf.storage_option)?;
        ctx.store
            .download_to_file(&region, &bucket, key, &target)
            .await
    }

    /// Rebuild payload manifests from the registry's checksums.
    async fn write_manifests(&self, files: &[GenericFile], staging: &Path) -> Result<()> {
        for algorithm in [DigestAlgorithm::Md5, DigestAlgorithm::Sha256] {
            let mut lines = String::new();
            for gf in files {
                let rel_path = gf.original_path()?;
                if !rel_path.starts_with("data/") {
                    continue;
                }
                if let Some(checksum) = gf.checksum(algorithm) {
                    lines.push_str(&format!("{}  {}\n", checksum.digest, rel_path));
                }
            }
            if !lines.is_empty() {
                let path = staging.join(format!("manifest-{}.txt", algorithm));
                tokio::fs::write(path, lines).await?;
            }
        }
        Ok(())
    }

    /// Tar the staging tree, wrapped in the bag's folder.
    async fn package(&self, staging: &Path, bag_name: &str) -> Result<PathBuf> {
        let tar_path = staging
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{}.tar", bag_name));
        let staging = staging.to_path_buf();
        let bag_name = bag_name.to_string();
        let result_path = tar_path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let file = std::fs::File::create(&tar_path)?;
            let mut builder = tar::Builder::new(file);
            builder.append_dir_all(&bag_name, &staging)?;
            builder.finish()?;
            Ok(())
        })
        .await
        .map_err(|e| WorkerError::invariant(format!("packaging task failed: {}", e)))??;
        Ok(result_path)
    }

    /// The institution's restore bucket, from the registry.
    async fn restore_bucket(&self, ctx: &Context, item: &WorkItem) -> Result<String> {
        let institutions = ctx.registry.list_institutions().await?;
        institutions
            .into_iter()
            .find(|inst| inst.id == item.institution_id)
            .map(|inst| inst.restore_bucket)
            .filter(|bucket| !bucket.is_empty())
            .ok_or_else(|| {
                WorkerError::invariant(format!(
                    "no restore bucket configured for institution {}",
                    item.institution_id
                ))
            })
    }
}
