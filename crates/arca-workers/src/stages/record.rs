//! Ingest stage 3: write the object, its files, and their PREMIS
//! events into the registry.
//!
//! Every write is idempotent by identifier: a crash mid-batch is
//! resolved on retry by re-reading which records already exist.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use arca_bag::valdb::ValDb;
use arca_common::constants::{Action, DigestAlgorithm};
use arca_common::models::{
    Checksum, GenericFile, IngestState, IntellectualObject, PremisEvent, WorkItem,
};

use crate::context::Context;
use crate::error::{Result, WorkerError};
use crate::stages::{self, topics};
use crate::worker::{Outcome, Stage};

pub struct RecordStage;

#[async_trait::async_trait]
impl Stage for RecordStage {
    fn topic(&self) -> &'static str {
        topics::RECORD
    }

    async fn handle(&self, ctx: Arc<Context>, item: &mut WorkItem) -> Outcome {
        let (mut record, mut state) =
            match stages::load_state::<IngestState>(&ctx, item, Action::Ingest).await {
                Ok(loaded) => loaded,
                Err(e) => return stages::outcome_for_error(item, 1, &e),
            };
        if state.valdb_path.is_empty() {
            let e = WorkerError::invariant(format!(
                "work item {} reached the record stage with no side-index",
                item.id
            ));
            return stages::outcome_for_error(item, 1, &e);
        }
        state.record.start();

        match self.record_all(&ctx, item, &state).await {
            Ok(file_count) => {
                state.record.finish();
                let _ = stages::persist_state(&ctx, &mut record, &state).await;
                info!(
                    work_item_id = item.id,
                    files = file_count,
                    "Ingest recorded in registry"
                );
                item.note = format!("Ingest complete: {} files preserved", file_count);
                Outcome::Finish
            }
            Err(e) => {
                state.record.add_error(e.to_string());
                let _ = stages::persist_state(&ctx, &mut record, &state).await;
                stages::outcome_for_error(item, state.record.attempt_number, &e)
            }
        }
    }

    /// On success, the pipeline's scratch artifacts are done for.
    async fn cleanup(&self, ctx: Arc<Context>, item: &WorkItem, outcome: &Outcome) {
        if *outcome != Outcome::Finish {
            return;
        }
        if let Ok(Some(record)) = ctx.registry.get_work_item_state(item.id).await {
            if let Ok(Some(state)) = record.decode::<IngestState>() {
                remove_scratch(&state);
            }
        }
    }
}

impl RecordStage {
    async fn record_all(&self, ctx: &Context, item: &WorkItem, state: &IngestState) -> Result<usize> {
        let tar_path = PathBuf::from(&state.tar_path);
        let bag_name = stages::bag_name_of(&tar_path);
        let db = ValDb::open(&state.valdb_path)?;

        let obj = db
            .get_object(&bag_name)?
            .ok_or_else(|| WorkerError::invariant("object record missing from side-index"))?;
        let file_keys = db.keys_with_prefix(&format!("{}/", bag_name))?;

        self.record_object(ctx, item, &obj, file_keys.len()).await?;

        let mut recorded = 0;
        for key in &file_keys {
            let Some(gf) = db.get_file(key)? else {
                continue;
            };
            let rel_path = key
                .strip_prefix(&format!("{}/", bag_name))
                .unwrap_or(key)
                .to_string();
            self.record_file(ctx, item, gf, &rel_path).await?;
            recorded += 1;
        }
        Ok(recorded)
    }

    async fn record_object(
        &self,
        ctx: &Context,
        item: &WorkItem,
        obj: &IntellectualObject,
        file_count: usize,
    ) -> Result<()> {
        if ctx
            .registry
            .get_object(&item.object_identifier)
            .await?
            .is_some()
        {
            debug!(identifier = %item.object_identifier, "Object already recorded");
            return Ok(());
        }

        let mut registry_obj = obj.clone();
        registry_obj.identifier = item.object_identifier.clone();
        registry_obj.institution_id = item.institution_id;
        if registry_obj.institution.is_empty() {
            registry_obj.institution = stages::institution_of(&item.object_identifier).to_string();
        }
        registry_obj.ingest_tar_path = String::new();
        registry_obj.ingest_untarred_path = String::new();
        ctx.registry.create_object(&registry_obj).await?;

        for event in [
            PremisEvent::object_creation(),
            PremisEvent::object_identifier_assignment(&item.object_identifier),
            PremisEvent::object_access_assignment(registry_obj.access.as_str()),
            PremisEvent::object_ingestion(file_count),
        ] {
            ctx.registry
                .create_event(&event.for_object(&item.object_identifier))
                .await?;
        }
        Ok(())
    }

    async fn record_file(
        &self,
        ctx: &Context,
        item: &WorkItem,
        gf: GenericFile,
        rel_path: &str,
    ) -> Result<()> {
        let identifier = format!("{}/{}", item.object_identifier, rel_path);
        if ctx.registry.get_file(&identifier).await?.is_some() {
            debug!(identifier = %identifier, "File already recorded");
            return Ok(());
        }

        let now = Utc::now();
        let mut registry_file = gf.clone();
        registry_file.identifier = identifier.clone();
        registry_file.intellectual_object_identifier = item.object_identifier.clone();
        registry_file.checksums = checksums_of(&gf);
        ctx.registry.create_file(&registry_file).await?;

        let mut events = vec![
            PremisEvent::file_ingestion(
                gf.ingest.stored_at.unwrap_or(now),
                &gf.ingest.md5,
                &gf.ingest.uuid,
            ),
            PremisEvent::file_identifier_assignment(
                gf.ingest.uuid_generated_at.unwrap_or(now),
                &gf.ingest.uuid,
            ),
        ];
        if let Some(generated_at) = gf.ingest.md5_generated_at {
            events.push(PremisEvent::file_digest_calculation(
                generated_at,
                DigestAlgorithm::Md5,
                &gf.ingest.md5,
            ));
        }
        if let Some(generated_at) = gf.ingest.sha256_generated_at {
            events.push(PremisEvent::file_digest_calculation(
                generated_at,
                DigestAlgorithm::Sha256,
                &gf.ingest.sha256,
            ));
        }
        if let Some(verified_at) = gf.ingest.sha256_verified_at {
            events.push(PremisEvent::file_fixity_check(
                verified_at,
                DigestAlgorithm::Sha256,
                &gf.ingest.sha256,
                true,
            ));
        } else if let Some(verified_at) = gf.ingest.md5_verified_at {
            events.push(PremisEvent::file_fixity_check(
                verified_at,
                DigestAlgorithm::Md5,
                &gf.ingest.md5,
                true,
            ));
        }
        if let Some(replicated_at) = gf.ingest.replicated_at {
            events.push(PremisEvent::file_replication(
                replicated_at,
                &gf.ingest.replication_url,
            ));
        }

        for event in events {
            ctx.registry
                .create_event(&event.for_file(&identifier, &item.object_identifier))
                .await?;
        }
        Ok(())
    }
}

/// Registered checksums from the ingest bookkeeping.
fn checksums_of(gf: &GenericFile) -> Vec<Checksum> {
    let mut checksums = Vec::new();
    if !gf.ingest.md5.is_empty() {
        checksums.push(Checksum {
            algorithm: DigestAlgorithm::Md5,
            date_time: gf.ingest.md5_generated_at.unwrap_or_else(Utc::now),
            digest: gf.ingest.md5.clone(),
        });
    }
    if !gf.ingest.sha256.is_empty() {
        checksums.push(Checksum {
            algorithm: DigestAlgorithm::Sha256,
            date_time: gf.ingest.sha256_generated_at.unwrap_or_else(Utc::now),
            digest: gf.ingest.sha256.clone(),
        });
    }
    checksums
}

/// Remove the tar, the unpacked tree, and the side-index.
fn remove_scratch(state: &IngestState) {
    for path in [&state.tar_path, &state.valdb_path] {
        if path.is_empty() {
            continue;
        }
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path, error = %e, "Could not remove scratch file");
            }
        }
    }
    if !state.tar_path.is_empty() {
        let tar_path = Path::new(&state.tar_path);
        let unpacked = tar_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(stages::bag_name_of(tar_path));
        if unpacked.is_dir() {
            if let Err(e) = std::fs::remove_dir_all(&unpacked) {
                warn!(path = %unpacked.display(), error = %e, "Could not remove unpacked bag");
            }
        }
    }
}
