//! Registry client against a mock server.

mod common;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use arca_common::constants::{Action, Status};
use arca_common::models::{Institution, PremisEvent, WorkItemState};
use arca_workers::registry::RegistryClient;
use arca_workers::WorkerError;

use common::*;

fn client(server: &MockServer) -> RegistryClient {
    RegistryClient::new(server.uri(), "system@example.org", "secret-key").unwrap()
}

#[tokio::test]
async fn get_work_item_sends_auth_headers() {
    let server = MockServer::start().await;
    let item = make_object_work_item(TEST_ITEM_ID, "example.edu/bag");

    Mock::given(method("GET"))
        .and(path(format!("/v2/items/{}", TEST_ITEM_ID)))
        .and(header("X-Arca-API-User", "system@example.org"))
        .and(header("X-Arca-API-Key", "secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&item))
        .mount(&server)
        .await;

    let fetched = client(&server).get_work_item(TEST_ITEM_ID).await.unwrap();
    assert_eq!(fetched, item);
}

#[tokio::test]
async fn update_work_item_round_trips() {
    let server = MockServer::start().await;
    let mut item = make_object_work_item(TEST_ITEM_ID, "example.edu/bag");
    item.status = Status::Success;
    item.note = "Ingest complete".to_string();

    Mock::given(method("PUT"))
        .and(path(format!("/v2/items/{}", TEST_ITEM_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(&item))
        .mount(&server)
        .await;

    let updated = client(&server).update_work_item(&item).await.unwrap();
    assert_eq!(updated.note, "Ingest complete");

    let body = last_body_matching(&server, "PUT", "/v2/items/")
        .await
        .unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["note"], "Ingest complete");
}

#[tokio::test]
async fn missing_state_is_none_not_an_error() {
    let server = MockServer::start().await;
    mock_no_state(&server, TEST_ITEM_ID).await;

    let state = client(&server)
        .get_work_item_state(TEST_ITEM_ID)
        .await
        .unwrap();
    assert!(state.is_none());
}

#[tokio::test]
async fn save_state_puts_to_the_item_state_path() {
    let server = MockServer::start().await;
    mock_state_put(&server, TEST_ITEM_ID, Action::Ingest).await;

    let mut state = WorkItemState::new(TEST_ITEM_ID, Action::Ingest);
    state.state = r#"{"hello":"world"}"#.to_string();
    client(&server).save_work_item_state(&state).await.unwrap();

    let body = last_body_matching(&server, "PUT", "/v2/item_state/")
        .await
        .unwrap();
    assert_eq!(body["work_item_id"], TEST_ITEM_ID);
    assert_eq!(body["state"], r#"{"hello":"world"}"#);
}

#[tokio::test]
async fn create_file_sends_trimmed_payload_with_exact_size() {
    let server = MockServer::start().await;
    let mut gf = make_generic_file("example.edu/bag", 1);
    gf.size = 9_007_199_254_740_993; // beyond f64 precision
    gf.ingest.uuid = "should-not-appear".to_string();

    Mock::given(method("POST"))
        .and(path("/v2/files"))
        .respond_with(ResponseTemplate::new(201).set_body_json(&gf))
        .mount(&server)
        .await;

    client(&server).create_file(&gf).await.unwrap();

    let body = last_body_matching(&server, "POST", "/v2/files")
        .await
        .unwrap();
    assert_eq!(body["size"].as_i64().unwrap(), 9_007_199_254_740_993);
    assert!(body.get("ingest").is_none());
}

#[tokio::test]
async fn create_event_posts_the_event() {
    let server = MockServer::start().await;
    let event = PremisEvent::object_ingestion(12).for_object("example.edu/bag");

    Mock::given(method("POST"))
        .and(path("/v2/events"))
        .respond_with(ResponseTemplate::new(201).set_body_json(&event))
        .mount(&server)
        .await;

    client(&server).create_event(&event).await.unwrap();

    let body = last_body_matching(&server, "POST", "/v2/events")
        .await
        .unwrap();
    assert_eq!(body["event_type"], "ingestion");
    assert_eq!(body["intellectual_object_identifier"], "example.edu/bag");
}

#[tokio::test]
async fn list_institutions_decodes_the_list() {
    let server = MockServer::start().await;
    let institutions = vec![Institution {
        id: 33,
        identifier: "example.edu".to_string(),
        name: "Example University".to_string(),
        receiving_bucket: "arca-receiving-example.edu".to_string(),
        restore_bucket: "arca-restore-example.edu".to_string(),
    }];

    Mock::given(method("GET"))
        .and(path("/v2/institutions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&institutions))
        .mount(&server)
        .await;

    let listed = client(&server).list_institutions().await.unwrap();
    assert_eq!(listed, institutions);
}

#[tokio::test]
async fn server_errors_carry_their_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/items/{}", TEST_ITEM_ID)))
        .respond_with(ResponseTemplate::new(503).set_body_string("registry is down"))
        .mount(&server)
        .await;

    let err = client(&server).get_work_item(TEST_ITEM_ID).await.unwrap_err();
    match err {
        WorkerError::Registry { status, .. } => {
            assert_eq!(status, 503);
            assert!(err.is_transient());
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
