//! HTTP client for the work-item registry.
//!
//! All calls are versioned under `/v2/`, authenticated with user and
//! key headers, and speak JSON from the typed model structs, so 64-bit
//! sizes never pass through floating point.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use arca_common::models::{
    GenericFile, Institution, IntellectualObject, PremisEvent, WorkItem, WorkItemState,
};

use crate::error::{Result, WorkerError};

/// Default timeout for registry requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const API_USER_HEADER: &str = "X-Arca-API-User";
const API_KEY_HEADER: &str = "X-Arca-API-Key";

/// Client for the external work-item registry.
///
/// Holds a pooled [`reqwest::Client`]; construct one per process and
/// share it.
#[derive(Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
    api_user: String,
    api_key: String,
}

impl RegistryClient {
    pub fn new(
        base_url: impl Into<String>,
        api_user: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let timeout_secs = std::env::var("ARCA_REGISTRY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_user: api_user.into(),
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(API_USER_HEADER, &self.api_user)
            .header(API_KEY_HEADER, &self.api_key)
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(WorkerError::registry(status.as_u16(), message));
        }
        Ok(response.json().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.request(Method::GET, path).send().await?;
        self.decode(response).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.request(method, path).json(body).send().await?;
        self.decode(response).await
    }

    // ------------------------------------------------------------------
    // Work items and their state blobs
    // ------------------------------------------------------------------

    pub async fn get_work_item(&self, id: i64) -> Result<WorkItem> {
        self.get_json(&format!("items/{}", id)).await
    }

    pub async fn update_work_item(&self, item: &WorkItem) -> Result<WorkItem> {
        self.send_json(Method::PUT, &format!("items/{}", item.id), item)
            .await
    }

    pub async fn create_work_item(&self, item: &WorkItem) -> Result<WorkItem> {
        self.send_json(Method::POST, "items", item).await
    }

    /// The state blob attached to a work item; `None` when none has
    /// been saved yet.
    pub async fn get_work_item_state(&self, work_item_id: i64) -> Result<Option<WorkItemState>> {
        let response = self
            .request(Method::GET, &format!("item_state/{}", work_item_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(self.decode(response).await?))
    }

    pub async fn save_work_item_state(&self, state: &WorkItemState) -> Result<WorkItemState> {
        self.send_json(
            Method::PUT,
            &format!("item_state/{}", state.work_item_id),
            state,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Objects, files, events
    // ------------------------------------------------------------------

    pub async fn get_object(&self, identifier: &str) -> Result<Option<IntellectualObject>> {
        let response = self
            .request(Method::GET, &format!("objects/{}", escape(identifier)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(self.decode(response).await?))
    }

    /// Member files of an object.
    pub async fn get_object_files(&self, identifier: &str) -> Result<Vec<GenericFile>> {
        self.get_json(&format!("objects/{}/files", escape(identifier)))
            .await
    }

    pub async fn create_object(&self, object: &IntellectualObject) -> Result<IntellectualObject> {
        self.send_json(Method::POST, "objects", object).await
    }

    pub async fn get_file(&self, identifier: &str) -> Result<Option<GenericFile>> {
        let response = self
            .request(Method::GET, &format!("files/{}", escape(identifier)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(self.decode(response).await?))
    }

    pub async fn create_file(&self, file: &GenericFile) -> Result<GenericFile> {
        self.send_json(Method::POST, "files", &file.registry_payload())
            .await
    }

    pub async fn create_event(&self, event: &PremisEvent) -> Result<PremisEvent> {
        self.send_json(Method::POST, "events", event).await
    }

    pub async fn list_institutions(&self) -> Result<Vec<Institution>> {
        self.get_json("institutions").await
    }

    /// Record a completed peer replication with the (peer) registry
    /// this client points at.
    pub async fn create_replication_receipt(
        &self,
        receipt: &ReplicationReceipt,
    ) -> Result<ReplicationReceipt> {
        self.send_json(Method::POST, "replications", receipt).await
    }
}

/// Receipt written to a peer registry after its bag has been copied,
/// validated, and stored here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplicationReceipt {
    /// The bag's identifier on the peer network
    pub peer_bag_identifier: String,

    /// sha256 of the bag's tag manifest
    pub fixity_sha256: String,

    /// Where the stored bag lives on this node
    pub storage_url: String,

    pub stored_at: Option<DateTime<Utc>>,
}

/// Identifiers contain slashes; the registry takes them URL-escaped.
fn escape(identifier: &str) -> String {
    identifier.replace('/', "%2F")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_versioned_and_escaped() {
        let client =
            RegistryClient::new("https://registry.example.org/", "user", "key").unwrap();
        assert_eq!(client.base_url(), "https://registry.example.org");
        assert_eq!(
            client.url(&format!("objects/{}", escape("example.edu/bag"))),
            "https://registry.example.org/v2/objects/example.edu%2Fbag"
        );
    }
}
