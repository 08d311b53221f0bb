//! Shared fixtures for worker integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use arca_common::constants::{Action, Stage as ItemStage, Status, StorageOption};
use arca_common::models::{GenericFile, IntellectualObject, WorkItem};
use arca_workers::config::Config;
use arca_workers::context::Context;
use arca_workers::queue::LocalQueue;

pub const TEST_ITEM_ID: i64 = 1000;

/// A context wired to mock registry and object-store servers.
pub fn make_context(registry_url: &str, s3_url: Option<&str>, scratch: &Path) -> Arc<Context> {
    let mut config = Config::for_testing(scratch);
    config.registry_url = registry_url.to_string();
    config.s3_endpoint = s3_url.map(str::to_string);
    let queue = LocalQueue::new(16);
    Context::new(config, queue).unwrap()
}

pub fn make_object_work_item(id: i64, object_identifier: &str) -> WorkItem {
    let mut item = WorkItem::new(object_identifier, Action::ColdRestore);
    item.id = id;
    item.name = "glacier_bag.tar".to_string();
    item.bucket = "arca-receiving-example.edu".to_string();
    item.etag = "0000000000000000".to_string();
    item.institution_id = 33;
    item.user = "admin@example.edu".to_string();
    item.stage = ItemStage::Requested;
    item.status = Status::Pending;
    item
}

pub fn make_generic_file(object_identifier: &str, index: usize) -> GenericFile {
    let mut gf = GenericFile::new(format!("{}/data/file_{}.pdf", object_identifier, index));
    gf.intellectual_object_identifier = object_identifier.to_string();
    gf.storage_option = StorageOption::ColdOh;
    gf.size = 1024;
    gf.uri = format!(
        "https://arca-cold-oh.s3.us-east-2.amazonaws.com/uuid-{}",
        index
    );
    gf
}

pub fn make_intellectual_object(identifier: &str) -> IntellectualObject {
    let mut obj = IntellectualObject::new(identifier);
    obj.id = 12;
    obj.institution = identifier.split('/').next().unwrap_or_default().to_string();
    obj.institution_id = 33;
    obj.storage_option = StorageOption::ColdOh;
    obj
}

/// Mock a missing work-item state (fresh work item).
pub async fn mock_no_state(server: &MockServer, work_item_id: i64) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/item_state/{}", work_item_id)))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

/// Mock an existing work-item state carrying the given stage state.
pub async fn mock_state<T: serde::Serialize>(
    server: &MockServer,
    work_item_id: i64,
    action: Action,
    state: &T,
) {
    let record = serde_json::json!({
        "id": 5,
        "work_item_id": work_item_id,
        "action": action,
        "state": serde_json::to_string(state).unwrap(),
    });
    Mock::given(method("GET"))
        .and(path(format!("/v2/item_state/{}", work_item_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(record))
        .mount(server)
        .await;
}

/// Accept state writes, echoing a fixed valid record.
pub async fn mock_state_put(server: &MockServer, work_item_id: i64, action: Action) {
    let record = serde_json::json!({
        "id": 5,
        "work_item_id": work_item_id,
        "action": action,
        "state": "",
    });
    Mock::given(method("PUT"))
        .and(path(format!("/v2/item_state/{}", work_item_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(record))
        .mount(server)
        .await;
}

/// The body of the most recent request matching a method and path
/// predicate, decoded as JSON.
pub async fn last_body_matching(
    server: &MockServer,
    http_method: &str,
    path_contains: &str,
) -> Option<serde_json::Value> {
    let requests = server.received_requests().await?;
    requests
        .iter()
        .rev()
        .find(|r| {
            r.method.to_string() == http_method && r.url.path().contains(path_contains)
        })
        .and_then(|r| serde_json::from_slice(&r.body).ok())
}
