//! Record stage: registry writes are idempotent by identifier.

mod common;

use chrono::Utc;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use arca_bag::valdb::ValDb;
use arca_common::constants::{Action, FileType, Stage as ItemStage};
use arca_common::models::{GenericFile, IngestState, IntellectualObject};
use arca_workers::stages::record::RecordStage;
use arca_workers::worker::{Outcome, Stage};

use common::*;

const BAG: &str = "photos_2019";
const OBJ: &str = "example.edu/photos_2019";
const FILE_COUNT: usize = 3;

fn build_stored_scene(scratch: &std::path::Path) -> IngestState {
    let work_dir = scratch.join("scratch").join(TEST_ITEM_ID.to_string());
    std::fs::create_dir_all(&work_dir).unwrap();
    let valdb_path = work_dir.join(format!("{}.valdb", BAG));
    let db = ValDb::open(&valdb_path).unwrap();

    let mut obj = IntellectualObject::new(BAG);
    obj.title = "Test Photos".to_string();
    obj.institution = "example.edu".to_string();
    db.save_object(&obj).unwrap();

    for i in 0..FILE_COUNT {
        let rel_path = format!("data/file_{}.pdf", i);
        let mut gf = GenericFile::new(format!("{}/{}", BAG, rel_path));
        gf.intellectual_object_identifier = BAG.to_string();
        gf.size = 2048;
        gf.file_format = "application/pdf".to_string();
        gf.ingest.file_type = Some(FileType::Payload);
        gf.ingest.uuid = format!("00000000-0000-4000-8000-{:012}", i);
        gf.ingest.uuid_generated_at = Some(Utc::now());
        gf.ingest.md5 = format!("md5-{}", i);
        gf.ingest.md5_generated_at = Some(Utc::now());
        gf.ingest.sha256 = format!("sha-{}", i);
        gf.ingest.sha256_generated_at = Some(Utc::now());
        gf.ingest.sha256_verified_at = Some(Utc::now());
        gf.ingest.stored_at = Some(Utc::now());
        gf.uri = format!("https://primary/{}", gf.ingest.uuid);
        gf.ingest.storage_url = gf.uri.clone();
        gf.ingest.replicated_at = Some(Utc::now());
        gf.ingest.replication_url = format!("https://replica/{}", gf.ingest.uuid);
        db.save_file(&gf).unwrap();
    }
    db.close(true).unwrap();

    IngestState {
        tar_path: work_dir
            .join(format!("{}.tar", BAG))
            .to_string_lossy()
            .into_owned(),
        valdb_path: valdb_path.to_string_lossy().into_owned(),
        ..Default::default()
    }
}

fn count_posts(requests: &[wiremock::Request], path_suffix: &str) -> usize {
    requests
        .iter()
        .filter(|r| r.method.to_string() == "POST" && r.url.path().ends_with(path_suffix))
        .count()
}

#[tokio::test]
async fn first_run_creates_object_files_and_events() {
    let registry = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    let state = build_stored_scene(tmp.path());
    mock_state(&registry, TEST_ITEM_ID, Action::Ingest, &state).await;
    mock_state_put(&registry, TEST_ITEM_ID, Action::Ingest).await;

    // Nothing recorded yet.
    Mock::given(method("GET"))
        .and(path_regex("^/v2/objects/.*"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&registry)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/v2/files/.*"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&registry)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/objects"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(make_intellectual_object(OBJ)),
        )
        .mount(&registry)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/files"))
        .respond_with(ResponseTemplate::new(201).set_body_json(make_generic_file(OBJ, 0)))
        .mount(&registry)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/events"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "identifier": "e5c34a8c-4c70-4140-8442-594f4fcaf4b9",
            "event_type": "ingestion",
            "date_time": Utc::now(),
            "detail": "",
            "outcome": "success",
            "outcome_detail": "",
            "object": "",
            "agent": ""
        })))
        .mount(&registry)
        .await;

    let ctx = make_context(&registry.uri(), None, tmp.path());
    let mut item = make_object_work_item(TEST_ITEM_ID, OBJ);
    item.action = Action::Ingest;
    item.stage = ItemStage::Record;

    let outcome = RecordStage.handle(ctx, &mut item).await;
    assert_eq!(outcome, Outcome::Finish);
    assert!(item.note.contains("3 files preserved"));

    let requests = registry.received_requests().await.unwrap();
    assert_eq!(count_posts(&requests, "/objects"), 1);
    assert_eq!(count_posts(&requests, "/files"), FILE_COUNT);
    // 4 object events plus per-file: ingestion, identifier
    // assignment, 2 digest calculations, fixity check, replication.
    assert_eq!(count_posts(&requests, "/events"), 4 + FILE_COUNT * 6);
}

#[tokio::test]
async fn second_run_creates_no_duplicate_rows() {
    let registry = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    let state = build_stored_scene(tmp.path());
    mock_state(&registry, TEST_ITEM_ID, Action::Ingest, &state).await;
    mock_state_put(&registry, TEST_ITEM_ID, Action::Ingest).await;

    // Everything already exists from the crashed first run.
    Mock::given(method("GET"))
        .and(path_regex("^/v2/objects/.*"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(make_intellectual_object(OBJ)),
        )
        .mount(&registry)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/v2/files/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(make_generic_file(OBJ, 0)))
        .mount(&registry)
        .await;

    let ctx = make_context(&registry.uri(), None, tmp.path());
    let mut item = make_object_work_item(TEST_ITEM_ID, OBJ);
    item.action = Action::Ingest;
    item.stage = ItemStage::Record;

    let outcome = RecordStage.handle(ctx, &mut item).await;
    assert_eq!(outcome, Outcome::Finish);

    let requests = registry.received_requests().await.unwrap();
    assert_eq!(count_posts(&requests, "/objects"), 0);
    assert_eq!(count_posts(&requests, "/files"), 0);
    assert_eq!(count_posts(&requests, "/events"), 0);
}
