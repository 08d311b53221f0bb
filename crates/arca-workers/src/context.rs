//! Shared process-wide collaborators for all stages.

use std::sync::Arc;

use tracing::error;

use arca_common::models::{WorkItem, WorkItemState};

use crate::config::Config;
use crate::error::Result;
use crate::queue::Queue;
use crate::registry::RegistryClient;
use crate::s3::ObjectStore;

/// Everything a stage handler needs: configuration, the registry
/// client, the object-store client, the queue, and this worker's
/// claimant identity.
pub struct Context {
    pub config: Config,
    pub registry: RegistryClient,
    pub store: ObjectStore,
    pub queue: Arc<dyn Queue>,

    /// Hostname stamped on work-item claims
    pub node: String,

    /// Pid stamped on work-item claims
    pub pid: u32,
}

impl Context {
    pub fn new(config: Config, queue: Arc<dyn Queue>) -> Result<Arc<Self>> {
        let registry = RegistryClient::new(
            &config.registry_url,
            &config.registry_user,
            &config.registry_key,
        )?;
        let store = ObjectStore::new(&config);
        let node = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(Arc::new(Self {
            config,
            registry,
            store,
            queue,
            node,
            pid: std::process::id(),
        }))
    }

    /// Write the item through to the registry, logging failures.
    ///
    /// Returns whether the write succeeded; stages treat a failed
    /// write-through as transient.
    pub async fn save_work_item(&self, item: &WorkItem) -> bool {
        match self.registry.update_work_item(item).await {
            Ok(_) => true,
            Err(e) => {
                error!(work_item_id = item.id, error = %e, "Failed to update work item");
                false
            }
        }
    }

    /// Write a state blob through to the registry, logging failures.
    pub async fn save_state(&self, state: &WorkItemState) -> bool {
        match self.registry.save_work_item_state(state).await {
            Ok(_) => true,
            Err(e) => {
                error!(
                    work_item_id = state.work_item_id,
                    error = %e,
                    "Failed to save work item state"
                );
                false
            }
        }
    }
}
