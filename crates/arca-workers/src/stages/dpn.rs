//! Peer replication network stages.
//!
//! Outbound: `package` rebuilds an ingested object as a bag in the
//! peer staging tree, where a peer node picks it up.
//!
//! Inbound: `copy` fetches a bag deposited by a peer and validates it
//! against the peer validation config, `store` uploads the validated
//! bag to peer preservation storage, and `record` writes the
//! replication receipt to the peer registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use arca_bag::validation::{BagValidationConfig, Validator};
use arca_common::constants::{Action, DigestAlgorithm, Stage as ItemStage, Status};
use arca_common::digest::compute_file_digests;
use arca_common::models::{PeerReplicationState, WorkItem};

use crate::context::Context;
use crate::error::{Result, WorkerError};
use crate::registry::{RegistryClient, ReplicationReceipt};
use crate::stages::{self, topics};
use crate::worker::{Outcome, Stage};

// ----------------------------------------------------------------------
// Outbound: package an ingested object for the peer network.
// ----------------------------------------------------------------------

pub struct PackageStage;

#[async_trait::async_trait]
impl Stage for PackageStage {
    fn topic(&self) -> &'static str {
        topics::PEER_PACKAGE
    }

    async fn handle(&self, ctx: Arc<Context>, item: &mut WorkItem) -> Outcome {
        let (mut record, mut state) =
            match stages::load_state::<PeerReplicationState>(&ctx, item, Action::PeerReplicate)
                .await
            {
                Ok(loaded) => loaded,
                Err(e) => return stages::outcome_for_error(item, 1, &e),
            };
        state.package.start();
        state.object_identifier = item.object_identifier.clone();

        match self.package_object(&ctx, item, &mut state).await {
            Ok(()) => {
                state.package.finish();
                let _ = stages::persist_state(&ctx, &mut record, &state).await;
                info!(
                    work_item_id = item.id,
                    peer_bag = %state.peer_bag_identifier,
                    path = %state.bag_path,
                    "Object packaged for peer replication"
                );
                item.note = format!(
                    "Packaged as peer bag {} awaiting transfer",
                    state.peer_bag_identifier
                );
                Outcome::Finish
            }
            Err(e) => {
                state.package.add_error(e.to_string());
                let _ = stages::persist_state(&ctx, &mut record, &state).await;
                stages::outcome_for_error(item, state.package.attempt_number, &e)
            }
        }
    }
}

impl PackageStage {
    async fn package_object(
        &self,
        ctx: &Context,
        item: &WorkItem,
        state: &mut PeerReplicationState,
    ) -> Result<()> {
        if state.peer_bag_identifier.is_empty() {
            state.peer_bag_identifier = Uuid::new_v4().to_string();
        }
        let files = ctx
            .registry
            .get_object_files(&item.object_identifier)
            .await?;
        if files.is_empty() {
            return Err(WorkerError::invariant(format!(
                "object '{}' has no files to package",
                item.object_identifier
            )));
        }

        let staging = ctx
            .config
            .peer_staging_dir
            .join("outbound")
            .join(&state.peer_bag_identifier);
        let bag_dir = staging.join(&state.peer_bag_identifier);

        let mut manifest = String::new();
        for gf in &files {
            let rel_path = gf.original_path()?;
            if !rel_path.starts_with("data/") {
                continue;
            }
            let target = bag_dir.join(rel_path);
            if !target.is_file() {
                let key = gf.preservation_storage_key()?;
                let (region, bucket) = ctx.config.primary_target(gf.storage_option)?;
                ctx.store
                    .download_to_file(&region, &bucket, key, &target)
                    .await?;
            }
            if let Some(checksum) = gf.checksum(DigestAlgorithm::Sha256) {
                manifest.push_str(&format!("{}  {}\n", checksum.digest, rel_path));
            }
        }
        tokio::fs::create_dir_all(&bag_dir).await?;
        tokio::fs::write(
            bag_dir.join("bagit.txt"),
            "BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\n",
        )
        .await?;
        tokio::fs::write(bag_dir.join("manifest-sha256.txt"), &manifest).await?;
        tokio::fs::write(
            bag_dir.join("bag-info.txt"),
            format!(
                "Source-Organization: {}\nInternal-Sender-Identifier: {}\n",
                stages::institution_of(&item.object_identifier),
                item.object_identifier
            ),
        )
        .await?;

        // Tag manifest over everything outside data/; its digest is
        // the bag's fixity value on the peer network.
        let tagmanifest_path = bag_dir.join("tagmanifest-sha256.txt");
        let mut tagmanifest = String::new();
        for name in ["bagit.txt", "manifest-sha256.txt", "bag-info.txt"] {
            let digests =
                compute_file_digests(bag_dir.join(name), &[DigestAlgorithm::Sha256])?;
            if let Some(sha256) = digests.sha256 {
                tagmanifest.push_str(&format!("{}  {}\n", sha256, name));
            }
        }
        tokio::fs::write(&tagmanifest_path, &tagmanifest).await?;
        let fixity = compute_file_digests(&tagmanifest_path, &[DigestAlgorithm::Sha256])?;
        state.fixity_sha256 = fixity.sha256.unwrap_or_default();

        let tar_path = staging.join(format!("{}.tar", state.peer_bag_identifier));
        let bag_name = state.peer_bag_identifier.clone();
        let bag_dir_owned = bag_dir.clone();
        let tar_path_owned = tar_path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let file = std::fs::File::create(&tar_path_owned)?;
            let mut builder = tar::Builder::new(file);
            builder.append_dir_all(&bag_name, &bag_dir_owned)?;
            builder.finish()?;
            Ok(())
        })
        .await
        .map_err(|e| WorkerError::invariant(format!("packaging task failed: {}", e)))??;

        state.bag_path = tar_path.to_string_lossy().into_owned();
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Inbound: copy, store, and record a bag arriving from a peer node.
// ----------------------------------------------------------------------

pub struct CopyStage;

#[async_trait::async_trait]
impl Stage for CopyStage {
    fn topic(&self) -> &'static str {
        topics::PEER_COPY
    }

    async fn handle(&self, ctx: Arc<Context>, item: &mut WorkItem) -> Outcome {
        let (mut record, mut state) =
            match stages::load_state::<PeerReplicationState>(&ctx, item, Action::PeerIngest).await {
                Ok(loaded) => loaded,
                Err(e) => return stages::outcome_for_error(item, 1, &e),
            };
        state.copy.start();
        state.peer_bag_identifier = stages::bag_name_of(Path::new(&item.name));

        let tar_path = ctx
            .config
            .peer_staging_dir
            .join("inbound")
            .join(item.id.to_string())
            .join(&item.name);
        if let Err(e) = ctx
            .store
            .download_to_file(
                &ctx.config.primary_region,
                &item.bucket,
                &item.name,
                &tar_path,
            )
            .await
        {
            state.copy.add_error(e.to_string());
            let _ = stages::persist_state(&ctx, &mut record, &state).await;
            return stages::outcome_for_error(item, state.copy.attempt_number, &e);
        }

        let validation_config =
            match BagValidationConfig::load(&ctx.config.peer_validation_config) {
                Ok(config) => config,
                Err(e) => {
                    let e = WorkerError::from(e);
                    return stages::outcome_for_error(item, state.copy.attempt_number, &e);
                }
            };
        let bag_path = tar_path.clone();
        let validated = tokio::task::spawn_blocking(move || {
            Validator::new(&bag_path, validation_config, false)?.validate()
        })
        .await;

        let summary = match validated {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => {
                let e = WorkerError::from(e);
                state.copy.add_error(e.to_string());
                let _ = stages::persist_state(&ctx, &mut record, &state).await;
                return stages::outcome_for_error(item, state.copy.attempt_number, &e);
            }
            Err(join_error) => {
                let e = WorkerError::invariant(format!("validator task failed: {}", join_error));
                return stages::outcome_for_error(item, state.copy.attempt_number, &e);
            }
        };
        if summary.has_errors() {
            for error in &summary.errors {
                state.copy.add_error(error.clone());
            }
            let _ = stages::persist_state(&ctx, &mut record, &state).await;
            item.note = summary.all_errors_as_string();
            return Outcome::FailFatal;
        }

        // Fixity over the tag manifest travels with the receipt.
        match compute_file_digests(&tar_path, &[DigestAlgorithm::Sha256]) {
            Ok(digests) => state.fixity_sha256 = digests.sha256.unwrap_or_default(),
            Err(e) => {
                let e = WorkerError::from(e);
                return stages::outcome_for_error(item, state.copy.attempt_number, &e);
            }
        }

        state.bag_path = tar_path.to_string_lossy().into_owned();
        state.copy.finish();
        if let Err(e) = stages::persist_state(&ctx, &mut record, &state).await {
            return stages::outcome_for_error(item, state.copy.attempt_number, &e);
        }

        item.stage = ItemStage::Store;
        item.status = Status::Pending;
        item.note = "Peer bag copied and validated".to_string();
        item.release();
        if let Err(e) = ctx.queue.publish(topics::PEER_STORE, item.id).await {
            return stages::outcome_for_error(item, state.copy.attempt_number, &e);
        }
        Outcome::Finish
    }
}

pub struct PeerStoreStage;

#[async_trait::async_trait]
impl Stage for PeerStoreStage {
    fn topic(&self) -> &'static str {
        topics::PEER_STORE
    }

    async fn handle(&self, ctx: Arc<Context>, item: &mut WorkItem) -> Outcome {
        let (mut record, mut state) =
            match stages::load_state::<PeerReplicationState>(&ctx, item, Action::PeerIngest).await {
                Ok(loaded) => loaded,
                Err(e) => return stages::outcome_for_error(item, 1, &e),
            };
        if state.bag_path.is_empty() {
            let e = WorkerError::invariant(format!(
                "work item {} reached peer store with no copied bag",
                item.id
            ));
            return stages::outcome_for_error(item, 1, &e);
        }
        state.store.start();

        if state.stored_at.is_none() {
            let bucket = ctx.config.peer_preservation_bucket.clone();
            if bucket.is_empty() {
                let e = WorkerError::config("no peer preservation bucket configured");
                return stages::outcome_for_error(item, state.store.attempt_number, &e);
            }
            let key = format!("{}.tar", state.peer_bag_identifier);
            match ctx
                .store
                .put_file(
                    &ctx.config.primary_region,
                    &bucket,
                    &key,
                    Path::new(&state.bag_path),
                    Some("application/x-tar"),
                    &HashMap::from([(
                        "sha256".to_string(),
                        state.fixity_sha256.clone(),
                    )]),
                )
                .await
            {
                Ok(url) => {
                    state.storage_url = url;
                    state.stored_at = Some(Utc::now());
                }
                Err(e) => {
                    state.store.add_error(e.to_string());
                    let _ = stages::persist_state(&ctx, &mut record, &state).await;
                    return stages::outcome_for_error(item, state.store.attempt_number, &e);
                }
            }
        }

        state.store.finish();
        if let Err(e) = stages::persist_state(&ctx, &mut record, &state).await {
            return stages::outcome_for_error(item, state.store.attempt_number, &e);
        }

        item.stage = ItemStage::Record;
        item.status = Status::Pending;
        item.note = "Peer bag stored, awaiting receipt".to_string();
        item.release();
        if let Err(e) = ctx.queue.publish(topics::PEER_RECORD, item.id).await {
            return stages::outcome_for_error(item, state.store.attempt_number, &e);
        }
        Outcome::Finish
    }
}

pub struct PeerRecordStage;

#[async_trait::async_trait]
impl Stage for PeerRecordStage {
    fn topic(&self) -> &'static str {
        topics::PEER_RECORD
    }

    async fn handle(&self, ctx: Arc<Context>, item: &mut WorkItem) -> Outcome {
        let (mut record, mut state) =
            match stages::load_state::<PeerReplicationState>(&ctx, item, Action::PeerIngest).await {
                Ok(loaded) => loaded,
                Err(e) => return stages::outcome_for_error(item, 1, &e),
            };
        if state.stored_at.is_none() {
            let e = WorkerError::invariant(format!(
                "work item {} reached peer record before storage",
                item.id
            ));
            return stages::outcome_for_error(item, 1, &e);
        }
        state.record.start();

        let peer_registry = match self.peer_registry(&ctx) {
            Ok(client) => client,
            Err(e) => return stages::outcome_for_error(item, state.record.attempt_number, &e),
        };
        let receipt = ReplicationReceipt {
            peer_bag_identifier: state.peer_bag_identifier.clone(),
            fixity_sha256: state.fixity_sha256.clone(),
            storage_url: state.storage_url.clone(),
            stored_at: state.stored_at,
        };
        if let Err(e) = peer_registry.create_replication_receipt(&receipt).await {
            state.record.add_error(e.to_string());
            let _ = stages::persist_state(&ctx, &mut record, &state).await;
            return stages::outcome_for_error(item, state.record.attempt_number, &e);
        }

        state.record.finish();
        let _ = stages::persist_state(&ctx, &mut record, &state).await;
        info!(
            work_item_id = item.id,
            peer_bag = %state.peer_bag_identifier,
            "Replication receipt recorded with peer registry"
        );
        item.note = format!(
            "Peer bag {} replicated and receipted",
            state.peer_bag_identifier
        );
        Outcome::Finish
    }

    async fn cleanup(&self, ctx: Arc<Context>, item: &WorkItem, outcome: &Outcome) {
        if *outcome != Outcome::Finish {
            return;
        }
        if let Ok(Some(record)) = ctx.registry.get_work_item_state(item.id).await {
            if let Ok(Some(state)) = record.decode::<PeerReplicationState>() {
                remove_bag(&state.bag_path);
            }
        }
    }
}

impl PeerRecordStage {
    fn peer_registry(&self, ctx: &Context) -> Result<RegistryClient> {
        if ctx.config.peer_registry_url.is_empty() {
            return Err(WorkerError::config("no peer registry URL configured"));
        }
        RegistryClient::new(
            &ctx.config.peer_registry_url,
            &ctx.config.registry_user,
            &ctx.config.registry_key,
        )
    }
}

/// Staged bag artifacts are removed once the receipt is recorded.
fn remove_bag(path: &str) {
    if path.is_empty() {
        return;
    }
    let path = PathBuf::from(path);
    let _ = std::fs::remove_file(&path);
    if let Some(parent) = path.parent() {
        let _ = std::fs::remove_dir_all(parent);
    }
}
