//! Store stage: idempotent resume after a crash mid-store.

mod common;

use chrono::Utc;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use arca_bag::valdb::ValDb;
use arca_common::constants::{Action, FileType, Stage as ItemStage, Status};
use arca_common::models::{GenericFile, IngestState, IntellectualObject};
use arca_workers::stages::store::StoreStage;
use arca_workers::worker::{Outcome, Stage};

use common::*;

const BAG: &str = "photos_2019";
const OBJ: &str = "example.edu/photos_2019";
const FILE_COUNT: usize = 12;
const ALREADY_STORED: usize = 5;

/// Build the on-disk world a crashed store stage leaves behind: an
/// unpacked bag, a side-index with five files already stored, and the
/// ingest state pointing at both.
fn build_crashed_store_scene(scratch: &std::path::Path) -> IngestState {
    let work_dir = scratch.join("scratch").join(TEST_ITEM_ID.to_string());
    let bag_dir = work_dir.join(BAG);
    std::fs::create_dir_all(bag_dir.join("data")).unwrap();

    let valdb_path = work_dir.join(format!("{}.valdb", BAG));
    let db = ValDb::open(&valdb_path).unwrap();
    db.save_object(&IntellectualObject::new(BAG)).unwrap();

    for i in 0..FILE_COUNT {
        let rel_path = format!("data/file_{:02}.bin", i);
        std::fs::write(bag_dir.join(&rel_path), format!("payload {}", i)).unwrap();

        let mut gf = GenericFile::new(format!("{}/{}", BAG, rel_path));
        gf.intellectual_object_identifier = BAG.to_string();
        gf.size = 10;
        gf.ingest.file_type = Some(FileType::Payload);
        gf.ingest.uuid = format!("00000000-0000-4000-8000-{:012}", i);
        gf.ingest.uuid_generated_at = Some(Utc::now());
        gf.ingest.md5 = format!("md5-{}", i);
        gf.ingest.sha256 = format!("sha-{}", i);
        if i < ALREADY_STORED {
            gf.ingest.stored_at = Some(Utc::now());
            gf.ingest.storage_url = format!("https://primary/{}", gf.ingest.uuid);
            gf.uri = gf.ingest.storage_url.clone();
            gf.ingest.replicated_at = Some(Utc::now());
            gf.ingest.replication_url = format!("https://replica/{}", gf.ingest.uuid);
        }
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

#[tokio::test]
async fn rerun_uploads_only_files_without_stored_timestamps() {
    let registry = MockServer::start().await;
    let s3 = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    let state = build_crashed_store_scene(tmp.path());
    mock_state(&registry, TEST_ITEM_ID, Action::Ingest, &state).await;
    mock_state_put(&registry, TEST_ITEM_ID, Action::Ingest).await;

    // No object sits at any target key yet.
    Mock::given(method("HEAD"))
        .and(path_regex("^/arca-.*"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&s3)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex("^/arca-preservation/.*"))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"ok\""))
        .mount(&s3)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex("^/arca-replication/.*"))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"ok\""))
        .mount(&s3)
        .await;

    let ctx = make_context(&registry.uri(), Some(&s3.uri()), tmp.path());
    let mut item = make_object_work_item(TEST_ITEM_ID, OBJ);
    item.action = Action::Ingest;
    item.stage = ItemStage::Store;
    item.status = Status::Started;

    let outcome = StoreStage.handle(ctx, &mut item).await;
    assert_eq!(outcome, Outcome::Finish);
    assert_eq!(item.stage, ItemStage::Record);
    assert_eq!(item.status, Status::Pending);

    // Exactly the seven unfinished files were uploaded, to each tier.
    let requests = s3.received_requests().await.unwrap();
    let primary_puts = requests
        .iter()
        .filter(|r| r.method.to_string() == "PUT" && r.url.path().starts_with("/arca-preservation/"))
        .count();
    let replica_puts = requests
        .iter()
        .filter(|r| r.method.to_string() == "PUT" && r.url.path().starts_with("/arca-replication/"))
        .count();
    assert_eq!(primary_puts, FILE_COUNT - ALREADY_STORED);
    assert_eq!(replica_puts, FILE_COUNT - ALREADY_STORED);

    // And every record in the side-index now carries both timestamps.
    let db = ValDb::open(tmp.path().join("scratch").join(TEST_ITEM_ID.to_string()).join(format!("{}.valdb", BAG))).unwrap();
    for key in db.keys_with_prefix(&format!("{}/", BAG)).unwrap() {
        let gf = db.get_file(&key).unwrap().unwrap();
        assert!(gf.ingest.stored_at.is_some(), "{} not stored", key);
        assert!(gf.ingest.replicated_at.is_some(), "{} not replicated", key);
        assert!(!gf.uri.is_empty());
    }
}

#[tokio::test]
async fn matching_object_at_target_key_is_not_reuploaded() {
    let registry = MockServer::start().await;
    let s3 = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    let state = build_crashed_store_scene(tmp.path());
    mock_state(&registry, TEST_ITEM_ID, Action::Ingest, &state).await;
    mock_state_put(&registry, TEST_ITEM_ID, Action::Ingest).await;

    // Every target key already holds an object whose md5 metadata
    // matches the side-index record.
    for i in ALREADY_STORED..FILE_COUNT {
        Mock::given(method("HEAD"))
            .and(path_regex(format!(
                "^/arca-[a-z]+/00000000-0000-4000-8000-{:012}$",
                i
            )))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"ok\"")
                    .insert_header("Content-Length", "10")
                    .insert_header("x-amz-meta-md5", format!("md5-{}", i).as_str()),
            )
            .mount(&s3)
            .await;
    }

    let ctx = make_context(&registry.uri(), Some(&s3.uri()), tmp.path());
    let mut item = make_object_work_item(TEST_ITEM_ID, OBJ);
    item.action = Action::Ingest;
    item.stage = ItemStage::Store;

    let outcome = StoreStage.handle(ctx, &mut item).await;
    assert_eq!(outcome, Outcome::Finish);

    // HEAD found a matching copy everywhere, so nothing was PUT.
    let requests = s3.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.method.to_string() != "PUT"));
}
