//! End-to-end validation tests against generated bags.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use arca_bag::valdb::ValDb;
use arca_bag::validation::{BagValidationConfig, FileSpec, TagSpec, Validator};
use arca_common::constants::DigestAlgorithm;
use arca_common::digest::{compute_digests, EMPTY_SHA256};

const BOTH: &[DigestAlgorithm] = &[DigestAlgorithm::Md5, DigestAlgorithm::Sha256];

/// In-memory description of a bag to generate on disk.
struct BagBuilder {
    name: String,
    payload: Vec<(String, Vec<u8>)>,
    tag_files: Vec<(String, String)>,
    manifest_algorithms: Vec<DigestAlgorithm>,
    tag_manifest_algorithms: Vec<DigestAlgorithm>,
    /// digest overrides keyed by (manifest rel path, file rel path)
    digest_overrides: HashMap<(String, String), String>,
}

impl BagBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            payload: Vec::new(),
            tag_files: vec![(
                "bagit.txt".to_string(),
                "BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\n".to_string(),
            )],
            manifest_algorithms: vec![DigestAlgorithm::Md5, DigestAlgorithm::Sha256],
            tag_manifest_algorithms: Vec::new(),
            digest_overrides: HashMap::new(),
        }
    }

    fn payload_file(mut self, rel_path: &str, body: &[u8]) -> Self {
        self.payload.push((rel_path.to_string(), body.to_vec()));
        self
    }

    fn tag_file(mut self, rel_path: &str, body: &str) -> Self {
        self.tag_files.push((rel_path.to_string(), body.to_string()));
        self
    }

    fn manifests(mut self, algorithms: &[DigestAlgorithm]) -> Self {
        self.manifest_algorithms = algorithms.to_vec();
        self
    }

    fn tag_manifests(mut self, algorithms: &[DigestAlgorithm]) -> Self {
        self.tag_manifest_algorithms = algorithms.to_vec();
        self
    }

    fn override_digest(mut self, manifest: &str, rel_path: &str, digest: &str) -> Self {
        self.digest_overrides
            .insert((manifest.to_string(), rel_path.to_string()), digest.to_string());
        self
    }

    /// Write the bag as a directory under `parent` and return its path.
    fn build_dir(&self, parent: &Path) -> PathBuf {
        let root = parent.join(&self.name);
        fs::create_dir_all(root.join("data")).unwrap();

        for (rel_path, body) in &self.payload {
            let path = root.join(rel_path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        for (rel_path, body) in &self.tag_files {
            fs::write(root.join(rel_path), body).unwrap();
        }

        let mut manifest_names = Vec::new();
        for algorithm in &self.manifest_algorithms {
            let manifest_name = format!("manifest-{}.txt", algorithm);
            let mut lines = String::new();
            for (rel_path, body) in &self.payload {
                let digest = self.digest_for(&manifest_name, rel_path, body, *algorithm);
                lines.push_str(&format!("{}  {}\n", digest, rel_path));
            }
            fs::write(root.join(&manifest_name), lines).unwrap();
            manifest_names.push(manifest_name);
        }

        for algorithm in &self.tag_manifest_algorithms {
            let manifest_name = format!("tagmanifest-{}.txt", algorithm);
            let mut lines = String::new();
            for (rel_path, body) in &self.tag_files {
                let digest = self.digest_for(&manifest_name, rel_path, body.as_bytes(), *algorithm);
                lines.push_str(&format!("{}  {}\n", digest, rel_path));
            }
            for manifest in &manifest_names {
                let body = fs::read(root.join(manifest)).unwrap();
                let digest = self.digest_for(&manifest_name, manifest, &body, *algorithm);
                lines.push_str(&format!("{}  {}\n", digest, manifest));
            }
            fs::write(root.join(&manifest_name), lines).unwrap();
        }

        root
    }

    /// Write the bag as a wrapped tar under `parent` and return its path.
    fn build_tar(&self, parent: &Path) -> PathBuf {
        let dir = self.build_dir(&parent.join("untarred"));
        let tar_path = parent.join(format!("{}.tar", self.name));
        let file = fs::File::create(&tar_path).unwrap();
        let mut builder = tar::Builder::new(file);
        builder.append_dir_all(&self.name, &dir).unwrap();
        builder.finish().unwrap();
        tar_path
    }

    fn digest_for(
        &self,
        manifest: &str,
        rel_path: &str,
        body: &[u8],
        algorithm: DigestAlgorithm,
    ) -> String {
        if let Some(digest) = self
            .digest_overrides
            .get(&(manifest.to_string(), rel_path.to_string()))
        {
            return digest.clone();
        }
        let digests = compute_digests(&mut Cursor::new(body), &[algorithm]).unwrap();
        digests.get(algorithm).unwrap().to_string()
    }
}

fn standard_tags() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "aptrust-info.txt",
            "Title: Test Photos\nAccess: Institution\n",
        ),
        (
            "bag-info.txt",
            "Source-Organization: example.edu\nInternal-Sender-Description: Test bag\n",
        ),
    ]
}

fn standard_config() -> BagValidationConfig {
    let mut config = BagValidationConfig {
        fixity_algorithms: BOTH.to_vec(),
        ..Default::default()
    };
    config.file_specs.insert(
        "bagit.txt".to_string(),
        FileSpec {
            required: true,
            ..Default::default()
        },
    );
    config.file_specs.insert(
        "aptrust-info.txt".to_string(),
        FileSpec {
            required: true,
            parse_as_tag_file: true,
            ..Default::default()
        },
    );
    config.file_specs.insert(
        "bag-info.txt".to_string(),
        FileSpec {
            required: true,
            parse_as_tag_file: true,
            ..Default::default()
        },
    );
    config.tag_specs.insert(
        "Title".to_string(),
        TagSpec {
            source_file: "aptrust-info.txt".to_string(),
            required: true,
            allowed_values: Vec::new(),
        },
    );
    config.tag_specs.insert(
        "Access".to_string(),
        TagSpec {
            source_file: "aptrust-info.txt".to_string(),
            required: true,
            allowed_values: vec![
                "Consortia".to_string(),
                "Institution".to_string(),
                "Restricted".to_string(),
            ],
        },
    );
    config
}

fn good_bag(name: &str) -> BagBuilder {
    let mut builder = BagBuilder::new(name)
        .payload_file("data/a.pdf", b"not really a pdf")
        .payload_file("data/sub/b.txt", b"some text content");
    for (path, body) in standard_tags() {
        builder = builder.tag_file(path, body);
    }
    builder
}

#[test]
fn good_tar_bag_validates() {
    let tmp = tempfile::tempdir().unwrap();
    let tar_path = good_bag("good_bag").build_tar(tmp.path());

    let validator = Validator::new(&tar_path, standard_config(), false).unwrap();
    assert_eq!(validator.object_identifier(), "good_bag");
    let db_path = validator.db_path();
    let summary = validator.validate().unwrap();

    assert!(summary.attempted);
    assert!(
        summary.errors.is_empty(),
        "unexpected errors: {:?}",
        summary.errors
    );
    assert!(summary.succeeded());
    // side-index deleted when extended attributes were not requested
    assert!(!db_path.exists());
}

#[test]
fn good_dir_bag_validates() {
    let tmp = tempfile::tempdir().unwrap();
    let dir_path = good_bag("good_bag").build_dir(tmp.path());

    let validator = Validator::new(&dir_path, standard_config(), false).unwrap();
    let summary = validator.validate().unwrap();
    assert!(
        summary.errors.is_empty(),
        "unexpected errors: {:?}",
        summary.errors
    );
}

#[test]
fn preserved_side_index_carries_ingest_attributes() {
    let tmp = tempfile::tempdir().unwrap();
    let tar_path = good_bag("keeper_bag").build_tar(tmp.path());

    let validator = Validator::new(&tar_path, standard_config(), true).unwrap();
    let db_path = validator.db_path();
    let summary = validator.validate().unwrap();
    assert!(summary.succeeded(), "errors: {:?}", summary.errors);
    assert!(db_path.exists());

    let db = ValDb::open(&db_path).unwrap();
    let gf = db.get_file("keeper_bag/data/a.pdf").unwrap().unwrap();
    assert_eq!(gf.ingest.uuid.len(), 36);
    assert!(gf.ingest.uuid_generated_at.is_some());
    assert!(gf.ingest.needs_save);
    assert_eq!(gf.file_format, "application/pdf");
    assert!(!gf.ingest.md5.is_empty());
    assert!(!gf.ingest.sha256.is_empty());
    assert_eq!(gf.ingest.manifest_md5, gf.ingest.md5);
    assert_eq!(gf.ingest.manifest_sha256, gf.ingest.sha256);
    assert!(gf.ingest.md5_verified_at.is_some());
    assert!(gf.ingest.sha256_verified_at.is_some());

    let obj = db.get_object("keeper_bag").unwrap().unwrap();
    assert_eq!(obj.title, "Test Photos");
    assert_eq!(obj.institution, "example.edu");
    assert_eq!(obj.description, "Test bag");

    db.close(false).unwrap();
}

#[test]
fn empty_payload_file_is_legal() {
    let tmp = tempfile::tempdir().unwrap();
    let tar_path = good_bag("empty_file_bag")
        .payload_file("data/empty.txt", b"")
        .build_tar(tmp.path());

    let validator = Validator::new(&tar_path, standard_config(), true).unwrap();
    let db_path = validator.db_path();
    let summary = validator.validate().unwrap();
    assert!(summary.succeeded(), "errors: {:?}", summary.errors);

    let db = ValDb::open(&db_path).unwrap();
    let gf = db
        .get_file("empty_file_bag/data/empty.txt")
        .unwrap()
        .unwrap();
    assert_eq!(gf.file_format, "text/empty");
    assert_eq!(gf.ingest.sha256, EMPTY_SHA256);
    assert_eq!(gf.ingest.manifest_sha256, EMPTY_SHA256);
    db.close(false).unwrap();
}

#[test]
fn bad_checksum_yields_exactly_one_error() {
    let tmp = tempfile::tempdir().unwrap();
    let tar_path = good_bag("bad_checksum_bag")
        .manifests(&[DigestAlgorithm::Md5])
        .override_digest(
            "manifest-md5.txt",
            "data/a.pdf",
            "00000000000000000000000000000000",
        )
        .build_tar(tmp.path());

    let validator = Validator::new(&tar_path, standard_config(), false).unwrap();
    let summary = validator.validate().unwrap();

    assert_eq!(summary.errors.len(), 1, "errors: {:?}", summary.errors);
    assert!(summary.errors[0].contains("data/a.pdf"));
    assert!(summary.errors[0].contains("md5"));
}

#[test]
fn missing_required_tag_yields_exactly_one_error() {
    let tmp = tempfile::tempdir().unwrap();
    let mut builder = BagBuilder::new("untitled_bag").payload_file("data/a.pdf", b"pdf bytes");
    builder = builder
        .tag_file("aptrust-info.txt", "Access: Institution\n")
        .tag_file(
            "bag-info.txt",
            "Source-Organization: example.edu\n",
        );
    let tar_path = builder.build_tar(tmp.path());

    let validator = Validator::new(&tar_path, standard_config(), false).unwrap();
    let summary = validator.validate().unwrap();

    assert_eq!(summary.errors.len(), 1, "errors: {:?}", summary.errors);
    assert!(summary.errors[0].contains("Title"));
}

#[test]
fn illegal_tag_value_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let mut builder = BagBuilder::new("open_access_bag").payload_file("data/a.pdf", b"pdf bytes");
    builder = builder
        .tag_file("aptrust-info.txt", "Title: Photos\nAccess: Everyone\n")
        .tag_file("bag-info.txt", "Source-Organization: example.edu\n");
    let tar_path = builder.build_tar(tmp.path());

    let validator = Validator::new(&tar_path, standard_config(), false).unwrap();
    let summary = validator.validate().unwrap();

    assert_eq!(summary.errors.len(), 1, "errors: {:?}", summary.errors);
    assert!(summary.errors[0].contains("Access"));
    assert!(summary.errors[0].contains("Everyone"));
}

#[test]
fn file_missing_from_payload_manifest_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    // The sha256 manifest is written from the same payload list, so
    // sabotage coverage by listing an extra file only on disk.
    let dir_path = good_bag("uncovered_bag").build_dir(tmp.path());
    fs::write(dir_path.join("data/stowaway.txt"), b"not in any manifest").unwrap();

    let validator = Validator::new(&dir_path, standard_config(), false).unwrap();
    let summary = validator.validate().unwrap();

    // one error per payload manifest that misses the file
    assert_eq!(summary.errors.len(), 2, "errors: {:?}", summary.errors);
    for error in &summary.errors {
        assert!(error.contains("data/stowaway.txt"));
        assert!(error.contains("not listed"));
    }
}

#[test]
fn file_in_manifest_but_missing_from_bag_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let dir_path = good_bag("ghost_bag").build_dir(tmp.path());
    // Append a phantom entry to the md5 manifest only.
    let manifest = dir_path.join("manifest-md5.txt");
    let mut body = fs::read_to_string(&manifest).unwrap();
    body.push_str("11111111111111111111111111111111  data/ghost.pdf\n");
    fs::write(&manifest, body).unwrap();

    let validator = Validator::new(&dir_path, standard_config(), false).unwrap();
    let summary = validator.validate().unwrap();

    assert_eq!(summary.errors.len(), 1, "errors: {:?}", summary.errors);
    assert!(summary.errors[0].contains("data/ghost.pdf"));
    assert!(summary.errors[0].contains("missing from bag"));
}

#[test]
fn tag_manifests_cover_tag_files_and_manifests() {
    let tmp = tempfile::tempdir().unwrap();
    let tar_path = good_bag("tagmanifest_bag")
        .tag_manifests(&[DigestAlgorithm::Sha256])
        .build_tar(tmp.path());

    let validator = Validator::new(&tar_path, standard_config(), false).unwrap();
    let summary = validator.validate().unwrap();
    assert!(
        summary.errors.is_empty(),
        "unexpected errors: {:?}",
        summary.errors
    );
}

#[test]
fn unsupported_manifest_algorithm_is_nonfatal() {
    let tmp = tempfile::tempdir().unwrap();
    let dir_path = good_bag("sha512_bag").build_dir(tmp.path());
    fs::write(
        dir_path.join("manifest-sha512.txt"),
        "deadbeef  data/a.pdf\n",
    )
    .unwrap();

    let validator = Validator::new(&dir_path, standard_config(), false).unwrap();
    let summary = validator.validate().unwrap();
    assert!(
        summary.errors.is_empty(),
        "unexpected errors: {:?}",
        summary.errors
    );
}

#[test]
fn tag_continuation_lines_join_with_single_spaces() {
    let tmp = tempfile::tempdir().unwrap();
    let mut builder = BagBuilder::new("folded_tag_bag").payload_file("data/a.pdf", b"pdf bytes");
    builder = builder
        .tag_file(
            "aptrust-info.txt",
            "Title: A Very\n  Long\n\tTitle\nAccess: Consortia\n",
        )
        .tag_file("bag-info.txt", "Source-Organization: example.edu\n");
    let tar_path = builder.build_tar(tmp.path());

    let validator = Validator::new(&tar_path, standard_config(), true).unwrap();
    let db_path = validator.db_path();
    let summary = validator.validate().unwrap();
    assert!(summary.succeeded(), "errors: {:?}", summary.errors);

    let db = ValDb::open(&db_path).unwrap();
    let obj = db.get_object("folded_tag_bag").unwrap().unwrap();
    assert_eq!(obj.title, "A Very Long Title");
    let title_tag = obj.find_tag("Title").unwrap();
    assert_eq!(title_tag.value, "A Very Long Title");
    db.close(false).unwrap();
}

#[test]
fn blank_lines_are_tag_boundaries() {
    let tmp = tempfile::tempdir().unwrap();
    let mut builder = BagBuilder::new("blank_line_bag").payload_file("data/a.pdf", b"pdf bytes");
    builder = builder
        .tag_file(
            "aptrust-info.txt",
            "Title: Short Title\n\nAccess: Consortia\n",
        )
        .tag_file("bag-info.txt", "Source-Organization: example.edu\n");
    let tar_path = builder.build_tar(tmp.path());

    let validator = Validator::new(&tar_path, standard_config(), true).unwrap();
    let db_path = validator.db_path();
    let summary = validator.validate().unwrap();
    assert!(summary.succeeded(), "errors: {:?}", summary.errors);

    let db = ValDb::open(&db_path).unwrap();
    let obj = db.get_object("blank_line_bag").unwrap().unwrap();
    assert_eq!(obj.title, "Short Title");
    assert_eq!(obj.tags.len(), 3, "tags: {:?}", obj.tags);
    db.close(false).unwrap();
}

#[test]
fn illegal_path_patterns_are_enforced() {
    let tmp = tempfile::tempdir().unwrap();
    let dir_path = good_bag("dotfile_bag").build_dir(tmp.path());
    fs::write(dir_path.join("data/.DS_Store"), b"junk").unwrap();

    let mut config = standard_config();
    config.illegal_path_patterns = vec![r"(^|/)\.DS_Store$".to_string()];
    let validator = Validator::new(&dir_path, config, false).unwrap();
    let summary = validator.validate().unwrap();

    assert!(summary
        .errors
        .iter()
        .any(|e| e.contains(".DS_Store") && e.contains("not allowed")));
}
