//! The bag validator.
//!
//! Validation makes two passes over the bag plus a verification sweep
//! over the side-index:
//!
//! 1. record every file with its computed digests,
//! 2. parse manifests and tag files against those records,
//! 3. cross-check digests, manifest coverage, file specs, and tag specs.
//!
//! Errors accumulate on the [`WorkSummary`]; a single bad file never
//! aborts the run, so operators see every problem in one pass.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use arca_common::constants::{
    AccessLevel, DigestAlgorithm, FileType, EMPTY_FILE_FORMAT, VALIDATION_DB_SUFFIX,
};
use arca_common::digest::compute_digests;
use arca_common::models::{GenericFile, IntellectualObject, Tag, WorkSummary};

use crate::error::{BagError, Result};
use crate::iter::{BagSource, FileSummary};
use crate::valdb::ValDb;
use crate::validation::config::{BagValidationConfig, CompiledPatterns};

/// Validates one bag against a [`BagValidationConfig`].
///
/// With `preserve_extended` set, the validator keeps the ingest
/// bookkeeping the pipeline needs (UUIDs, mime types, timestamps) and
/// leaves the `.valdb` side-index in place for the store stage.
/// Without it, only what plain validation needs is kept and the index
/// is deleted when validation finishes.
pub struct Validator {
    bag_path: PathBuf,
    config: BagValidationConfig,
    preserve_extended: bool,
    summary: WorkSummary,
    obj_identifier: String,
    tag_files_to_parse: Vec<String>,
    payload_manifests: Vec<String>,
    tag_manifests: Vec<String>,
    top_level_names: BTreeSet<String>,
    patterns: CompiledPatterns,
    db: ValDb,
}

impl Validator {
    /// Create a validator for the bag at `bag_path`, which may be a
    /// `.tar` file or a directory.
    pub fn new(
        bag_path: impl AsRef<Path>,
        config: BagValidationConfig,
        preserve_extended: bool,
    ) -> Result<Self> {
        let bag_path = bag_path.as_ref().to_path_buf();
        if !bag_path.exists() {
            return Err(BagError::BagNotFound(bag_path.display().to_string()));
        }
        let problems = config.validate_config();
        if !problems.is_empty() {
            return Err(BagError::invalid_config(problems.join("; ")));
        }
        let patterns = config.compile_patterns()?;
        let obj_identifier = clean_bag_name(&bag_path);
        let tag_files_to_parse = config.tag_files_to_parse();
        let db = ValDb::open(side_index_path(&bag_path))?;

        Ok(Self {
            bag_path,
            config,
            preserve_extended,
            summary: WorkSummary::new(),
            obj_identifier,
            tag_files_to_parse,
            payload_manifests: Vec::new(),
            tag_manifests: Vec::new(),
            top_level_names: BTreeSet::new(),
            patterns,
            db,
        })
    }

    /// The object identifier derived from the bag name.
    pub fn object_identifier(&self) -> &str {
        &self.obj_identifier
    }

    /// Where this bag's side-index lives.
    pub fn db_path(&self) -> PathBuf {
        side_index_path(&self.bag_path)
    }

    /// Read and validate the bag. Succeeds iff the returned summary
    /// accumulated no errors.
    pub fn validate(mut self) -> Result<WorkSummary> {
        self.summary.start();
        self.read_bag();
        if !self.summary.has_errors() {
            self.verify();
        }
        self.summary.finish();

        // The index survives for the ingest pipeline (which owns its
        // cleanup) only when extended attributes were requested.
        self.db.close(self.preserve_extended)?;

        Ok(self.summary)
    }

    fn read_bag(&mut self) {
        if let Err(e) = self.get_or_init_object() {
            self.summary
                .add_error(format!("Could not init object record: {}", e));
            return;
        }
        self.add_files();
        if self.summary.has_errors() {
            return;
        }
        self.parse_manifests_and_tags();
    }

    fn db(&self) -> &ValDb {
        &self.db
    }

    fn get_or_init_object(&mut self) -> Result<IntellectualObject> {
        if let Some(obj) = self.db().get_object(&self.obj_identifier)? {
            return Ok(obj);
        }
        let mut obj = IntellectualObject::new(&self.obj_identifier);
        if self.bag_path.extension().is_some_and(|e| e == "tar") {
            obj.ingest_tar_path = self.bag_path.to_string_lossy().into_owned();
        } else {
            obj.ingest_untarred_path = self.bag_path.to_string_lossy().into_owned();
        }
        self.db().save_object(&obj)?;
        Ok(obj)
    }

    // ------------------------------------------------------------------
    // Pass 1: record every file with its computed digests.
    // ------------------------------------------------------------------

    fn add_files(&mut self) {
        let source = match BagSource::open(&self.bag_path) {
            Ok(source) => source,
            Err(e) => {
                self.summary.add_error(format!("Error opening bag: {}", e));
                return;
            }
        };

        let mut errors = Vec::new();
        let mut payload_manifests = Vec::new();
        let mut tag_manifests = Vec::new();
        let mut top_level_names = BTreeSet::new();

        let result = source.visit_entries(&mut |reader, entry| {
            top_level_names.insert(top_level_name(&entry.rel_path));
            if !entry.is_regular {
                return Ok(());
            }
            match self.add_file(reader, entry) {
                Ok(FileType::PayloadManifest) => payload_manifests.push(entry.rel_path.clone()),
                Ok(FileType::TagManifest) => tag_manifests.push(entry.rel_path.clone()),
                Ok(_) => {}
                Err(e) => errors.push(e.to_string()),
            }
            Ok(())
        });
        if let Err(e) = result {
            errors.push(format!("Error reading bag: {}", e));
        }

        payload_manifests.sort();
        tag_manifests.sort();
        self.payload_manifests = payload_manifests;
        self.tag_manifests = tag_manifests;
        self.top_level_names = top_level_names;
        for error in errors {
            self.summary.add_error(error);
        }
    }

    fn add_file(&self, mut reader: &mut dyn Read, entry: &FileSummary) -> Result<FileType> {
        let file_type = classify(&entry.rel_path);

        let mut gf = GenericFile::new(format!("{}/{}", self.obj_identifier, entry.rel_path));
        gf.intellectual_object_identifier = self.obj_identifier.clone();
        gf.size = entry.size;
        gf.file_modified = entry.mod_time;
        gf.ingest.file_type = Some(file_type);
        gf.ingest.local_path = entry.abs_path.clone();

        if self.preserve_extended {
            gf.ingest.uuid = Uuid::new_v4().to_string();
            gf.ingest.uuid_generated_at = Some(Utc::now());
            gf.ingest.uid = entry.uid;
            gf.ingest.gid = entry.gid;
        }

        gf.file_format = match file_type {
            FileType::PayloadManifest | FileType::TagManifest => "text/plain".to_string(),
            _ if self.preserve_extended => guess_file_format(&entry.rel_path, entry.size),
            _ => String::new(),
        };

        // Digests are computed in every context: checksum verification
        // is the point of basic validation, and reading the entry also
        // advances a tar stream.
        let digests = compute_digests(&mut reader, &self.config.fixity_algorithms)?;
        let now = Utc::now();
        if let Some(md5) = digests.md5 {
            gf.ingest.md5 = md5;
            gf.ingest.md5_generated_at = Some(now);
        }
        if let Some(sha256) = digests.sha256 {
            gf.ingest.sha256 = sha256;
            gf.ingest.sha256_generated_at = Some(now);
        }

        self.db().save_file(&gf)?;
        Ok(file_type)
    }

    // ------------------------------------------------------------------
    // Pass 2: parse manifests and tag files.
    // ------------------------------------------------------------------

    fn parse_manifests_and_tags(&mut self) {
        let source = match BagSource::open(&self.bag_path) {
            Ok(source) => source,
            Err(e) => {
                self.summary.add_error(format!("Error opening bag: {}", e));
                return;
            }
        };

        let mut errors = Vec::new();
        let result = source.visit_entries(&mut |reader, entry| {
            if !entry.is_regular {
                return Ok(());
            }
            let is_tag_file = self.tag_files_to_parse.contains(&entry.rel_path);
            let is_manifest = self.payload_manifests.contains(&entry.rel_path)
                || self.tag_manifests.contains(&entry.rel_path);
            if !is_tag_file && !is_manifest {
                return Ok(());
            }
            let mut text = String::new();
            if let Err(e) = reader.read_to_string(&mut text) {
                errors.push(format!("Error reading '{}': {}", entry.rel_path, e));
                return Ok(());
            }
            if is_tag_file {
                self.parse_tags(&text, &entry.rel_path, &mut errors);
            } else {
                self.parse_manifest(&text, &entry.rel_path, &mut errors);
            }
            Ok(())
        });
        if let Err(e) = result {
            errors.push(format!("Error reading bag: {}", e));
        }
        for error in errors {
            self.summary.add_error(error);
        }
    }

    /// Parse a `label: value` tag file.
    ///
    /// A line `label:<space>value` starts a tag; a line beginning with
    /// whitespace continues the previous tag's value with a single-space
    /// join; blank lines are tag boundaries, never continuations.
    fn parse_tags(&self, text: &str, rel_path: &str, errors: &mut Vec<String>) {
        let mut obj = match self.db().get_object(&self.obj_identifier) {
            Ok(Some(obj)) => obj,
            Ok(None) => {
                errors.push(format!(
                    "Object record '{}' is missing from the side-index",
                    self.obj_identifier
                ));
                return;
            }
            Err(e) => {
                errors.push(format!("Error loading object record: {}", e));
                return;
            }
        };
        // A re-validation re-parses this file; drop its old tags.
        obj.tags.retain(|t| t.source_file != rel_path);

        let mut open_tag: Option<Tag> = None;
        for raw_line in text.lines() {
            let line = raw_line.trim_end();
            if line.trim().is_empty() {
                if let Some(tag) = open_tag.take() {
                    apply_tag(&mut obj, &tag);
                    obj.tags.push(tag);
                }
                continue;
            }
            if line.starts_with(char::is_whitespace) {
                match open_tag.as_mut() {
                    Some(tag) => {
                        if !tag.value.is_empty() {
                            tag.value.push(' ');
                        }
                        tag.value.push_str(line.trim());
                    }
                    None => errors.push(format!(
                        "Unable to parse tag data from line: '{}'",
                        raw_line
                    )),
                }
                continue;
            }
            match line.split_once(':') {
                Some((label, value)) if !label.is_empty() && !label.contains(char::is_whitespace) => {
                    if let Some(tag) = open_tag.take() {
                        apply_tag(&mut obj, &tag);
                        obj.tags.push(tag);
                    }
                    let value = value.strip_prefix(' ').unwrap_or(value);
                    open_tag = Some(Tag::new(rel_path, label, value));
                }
                _ => errors.push(format!(
                    "Unable to parse tag data from line: '{}'",
                    raw_line
                )),
            }
        }
        if let Some(tag) = open_tag.take() {
            apply_tag(&mut obj, &tag);
            obj.tags.push(tag);
        }

        if let Err(e) = self.db().save_object(&obj) {
            errors.push(format!("Could not save object after parsing tags: {}", e));
        }
    }

    /// Parse `digest<whitespace>path` lines from a manifest.
    fn parse_manifest(&self, text: &str, rel_path: &str, errors: &mut Vec<String>) {
        let algorithm = match manifest_algorithm(rel_path) {
            Some(algorithm) => algorithm,
            None => {
                // Unsupported algorithm: any md5/sha256 manifests
                // present are still verified.
                warn!(manifest = rel_path, "Not verifying checksums in manifest: unsupported algorithm");
                return;
            }
        };

        for (line_num, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            let parsed = line
                .split_once(char::is_whitespace)
                .map(|(digest, path)| (digest, path.trim_start()))
                .filter(|(digest, path)| !digest.is_empty() && !path.is_empty());
            let (digest, file_path) = match parsed {
                Some(parts) => parts,
                None => {
                    errors.push(format!(
                        "Unable to parse data from line {} of manifest {}: {}",
                        line_num + 1,
                        rel_path,
                        raw_line
                    ));
                    continue;
                }
            };

            let identifier = format!("{}/{}", self.obj_identifier, file_path);
            let mut gf = match self.db().get_file(&identifier) {
                Ok(Some(gf)) => gf,
                Ok(None) => {
                    errors.push(format!(
                        "File '{}' in manifest '{}' is missing from bag",
                        file_path, rel_path
                    ));
                    continue;
                }
                Err(e) => {
                    errors.push(format!(
                        "Error finding '{}' in the side-index: {}",
                        identifier, e
                    ));
                    continue;
                }
            };

            match algorithm {
                DigestAlgorithm::Md5 => gf.ingest.manifest_md5 = digest.to_string(),
                DigestAlgorithm::Sha256 => gf.ingest.manifest_sha256 = digest.to_string(),
            }
            if let Err(e) = self.db().save_file(&gf) {
                errors.push(format!("Error saving '{}' to the side-index: {}", identifier, e));
            }
        }
    }

    // ------------------------------------------------------------------
    // Verification sweep over the side-index.
    // ------------------------------------------------------------------

    fn verify(&mut self) {
        let mut errors = Vec::new();

        self.verify_top_level_names(&mut errors);
        self.verify_files(&mut errors);
        self.verify_file_specs(&mut errors);
        self.verify_tag_specs(&mut errors);

        for error in errors {
            self.summary.add_error(error);
        }
    }

    fn verify_top_level_names(&self, errors: &mut Vec<String>) {
        if let Some(ref allowed) = self.patterns.allowed_top_level {
            for name in &self.top_level_names {
                if !allowed.is_match(name) {
                    errors.push(format!("Top-level name '{}' is not allowed", name));
                }
            }
        }
    }

    fn verify_files(&self, errors: &mut Vec<String>) {
        let prefix = format!("{}/", self.obj_identifier);
        let keys = match self.db().keys_with_prefix(&prefix) {
            Ok(keys) => keys,
            Err(e) => {
                errors.push(format!("Error reading the side-index: {}", e));
                return;
            }
        };

        for key in keys {
            let mut gf = match self.db().get_file(&key) {
                Ok(Some(gf)) => gf,
                Ok(None) => {
                    errors.push(format!("Record '{}' vanished from the side-index", key));
                    continue;
                }
                Err(e) => {
                    errors.push(format!("Error reading '{}': {}", key, e));
                    continue;
                }
            };
            let rel_path = key.strip_prefix(&prefix).unwrap_or(&key).to_string();

            for pattern in &self.patterns.illegal_paths {
                if pattern.is_match(&rel_path) {
                    errors.push(format!("Path '{}' is not allowed in a bag", rel_path));
                }
            }

            let mut updated = false;
            for algorithm in [DigestAlgorithm::Md5, DigestAlgorithm::Sha256] {
                let manifest_digest = gf.manifest_digest(algorithm);
                let computed = gf.computed_digest(algorithm);
                if manifest_digest.is_empty() || computed.is_empty() {
                    continue;
                }
                if manifest_digest != computed {
                    errors.push(format!(
                        "Bad checksum for '{}': manifest {} digest is {}, computed {}",
                        rel_path, algorithm, manifest_digest, computed
                    ));
                } else if self.preserve_extended {
                    let now = Some(Utc::now());
                    match algorithm {
                        DigestAlgorithm::Md5 => gf.ingest.md5_verified_at = now,
                        DigestAlgorithm::Sha256 => gf.ingest.sha256_verified_at = now,
                    }
                    updated = true;
                }
            }
            if updated {
                if let Err(e) = self.db().save_file(&gf) {
                    errors.push(format!("Error saving '{}': {}", gf.identifier, e));
                }
            }

            self.verify_manifest_coverage(&gf, &rel_path, errors);
        }
    }

    /// Every payload file must be listed in every payload manifest;
    /// every tag file and payload manifest must be listed in every tag
    /// manifest.
    fn verify_manifest_coverage(&self, gf: &GenericFile, rel_path: &str, errors: &mut Vec<String>) {
        let covering_manifests: &[String] = match gf.ingest.file_type {
            Some(FileType::Payload) => &self.payload_manifests,
            Some(FileType::TagFile) | Some(FileType::PayloadManifest) => &self.tag_manifests,
            _ => return,
        };
        for manifest in covering_manifests {
            let Some(algorithm) = manifest_algorithm(manifest) else {
                continue;
            };
            if gf.manifest_digest(algorithm).is_empty() {
                errors.push(format!(
                    "File '{}' is not listed in manifest '{}'",
                    rel_path, manifest
                ));
            }
        }
    }

    fn verify_file_specs(&self, errors: &mut Vec<String>) {
        let mut paths: Vec<&String> = self.config.file_specs.keys().collect();
        paths.sort();
        for path in paths {
            let spec = &self.config.file_specs[path];
            let identifier = format!("{}/{}", self.obj_identifier, path);
            let gf = match self.db().get_file(&identifier) {
                Ok(gf) => gf,
                Err(e) => {
                    errors.push(format!("Error reading '{}': {}", identifier, e));
                    continue;
                }
            };
            match gf {
                None if spec.required => {
                    errors.push(format!("Required file '{}' is missing", path));
                }
                Some(gf) if !spec.allowed_mime.is_empty() && !gf.file_format.is_empty() => {
                    if !spec
                        .allowed_mime
                        .iter()
                        .any(|m| m.eq_ignore_ascii_case(&gf.file_format))
                    {
                        errors.push(format!(
                            "File '{}' has disallowed format '{}'",
                            path, gf.file_format
                        ));
                    }
                }
                _ => {}
            }
        }
    }

    fn verify_tag_specs(&self, errors: &mut Vec<String>) {
        let obj = match self.db().get_object(&self.obj_identifier) {
            Ok(Some(obj)) => obj,
            Ok(None) => {
                errors.push(format!(
                    "Object record '{}' is missing from the side-index",
                    self.obj_identifier
                ));
                return;
            }
            Err(e) => {
                errors.push(format!("Error loading object record: {}", e));
                return;
            }
        };

        let mut labels: Vec<&String> = self.config.tag_specs.keys().collect();
        labels.sort();
        for label in labels {
            let spec = &self.config.tag_specs[label];
            let tag = obj.tags.iter().find(|t| {
                t.label.eq_ignore_ascii_case(label)
                    && (spec.source_file.is_empty() || t.source_file == spec.source_file)
            });
            match tag {
                None if spec.required => {
                    errors.push(format!(
                        "Required tag '{}' is missing from {}",
                        label, spec.source_file
                    ));
                }
                Some(tag) if !spec.allowed_values.is_empty() => {
                    if !spec
                        .allowed_values
                        .iter()
                        .any(|v| v.eq_ignore_ascii_case(&tag.value))
                    {
                        errors.push(format!(
                            "Tag '{}' has illegal value '{}'",
                            label, tag.value
                        ));
                    }
                }
                _ => {}
            }
        }
    }
}

/// Classify an entry by its path within the bag.
fn classify(rel_path: &str) -> FileType {
    if rel_path.starts_with("tagmanifest-") {
        FileType::TagManifest
    } else if rel_path.starts_with("manifest-") {
        FileType::PayloadManifest
    } else if rel_path.starts_with("data/") {
        FileType::Payload
    } else {
        FileType::TagFile
    }
}

/// Side-index path: the bag path minus any trailing separator and
/// `.tar` suffix, plus `.valdb`.
fn side_index_path(bag_path: &Path) -> PathBuf {
    let mut base = bag_path.to_string_lossy().into_owned();
    while base.ends_with(std::path::MAIN_SEPARATOR) {
        base.pop();
    }
    if let Some(stripped) = base.strip_suffix(".tar") {
        base = stripped.to_string();
    }
    PathBuf::from(format!("{}{}", base, VALIDATION_DB_SUFFIX))
}

/// Bag name from a path: the base name minus any trailing separator
/// and `.tar` suffix.
fn clean_bag_name(path: &Path) -> String {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    while name.ends_with(std::path::MAIN_SEPARATOR) {
        name.pop();
    }
    name.strip_suffix(".tar").unwrap_or(&name).to_string()
}

/// Algorithm a manifest covers, from its file name.
fn manifest_algorithm(rel_path: &str) -> Option<DigestAlgorithm> {
    let name = rel_path
        .strip_prefix("tagmanifest-")
        .or_else(|| rel_path.strip_prefix("manifest-"))?;
    name.strip_suffix(".txt")?.parse().ok()
}

/// First path component of a bag entry.
fn top_level_name(rel_path: &str) -> String {
    rel_path
        .split('/')
        .next()
        .unwrap_or(rel_path)
        .to_string()
}

/// Extension-based mime guess for reporting and storage.
///
/// Zero-byte files are legal (placeholder files like `.keep` or
/// `__init__.py`) and get their own marker type.
fn guess_file_format(rel_path: &str, size: i64) -> String {
    if size == 0 {
        return EMPTY_FILE_FORMAT.to_string();
    }
    let ext = rel_path
        .rsplit('.')
        .next()
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let format = match ext.as_str() {
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "xml" => "application/xml",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "gz" => "application/gzip",
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "wav" => "audio/wav",
        _ => "application/binary",
    };
    format.to_string()
}

/// Copy promoted tag values onto object attributes.
fn apply_tag(obj: &mut IntellectualObject, tag: &Tag) {
    if tag.source_file == "aptrust-info.txt" {
        match tag.label.to_ascii_lowercase().as_str() {
            "title" => obj.title = tag.value.clone(),
            "access" => {
                if let Ok(access) = tag.value.parse::<AccessLevel>() {
                    obj.access = access;
                }
            }
            _ => {}
        }
    } else if tag.source_file == "bag-info.txt" {
        match tag.label.to_ascii_lowercase().as_str() {
            "source-organization" => obj.institution = tag.value.clone(),
            "internal-sender-description" => obj.description = tag.value.clone(),
            "internal-sender-identifier" => obj.alt_identifier = tag.value.clone(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_path() {
        assert_eq!(classify("data/a.pdf"), FileType::Payload);
        assert_eq!(classify("manifest-md5.txt"), FileType::PayloadManifest);
        assert_eq!(classify("tagmanifest-sha256.txt"), FileType::TagManifest);
        assert_eq!(classify("bag-info.txt"), FileType::TagFile);
        // a manifest-named file under data/ is payload, not manifest
        assert_eq!(classify("data/manifest-md5.txt"), FileType::Payload);
    }

    #[test]
    fn clean_bag_name_strips_tar_and_separator() {
        assert_eq!(clean_bag_name(Path::new("/tmp/photos_2019.tar")), "photos_2019");
        assert_eq!(clean_bag_name(Path::new("/tmp/photos_2019")), "photos_2019");
    }

    #[test]
    fn manifest_algorithm_from_name() {
        assert_eq!(
            manifest_algorithm("manifest-md5.txt"),
            Some(DigestAlgorithm::Md5)
        );
        assert_eq!(
            manifest_algorithm("tagmanifest-sha256.txt"),
            Some(DigestAlgorithm::Sha256)
        );
        assert_eq!(manifest_algorithm("manifest-sha512.txt"), None);
        assert_eq!(manifest_algorithm("bagit.txt"), None);
    }

    #[test]
    fn guess_format_handles_empty_and_unknown() {
        assert_eq!(guess_file_format("data/empty.txt", 0), "text/empty");
        assert_eq!(guess_file_format("data/a.pdf", 10), "application/pdf");
        assert_eq!(guess_file_format("data/blob.xyz", 10), "application/binary");
    }

    #[test]
    fn apply_tag_promotes_known_labels() {
        let mut obj = IntellectualObject::new("example.edu/bag");
        apply_tag(&mut obj, &Tag::new("aptrust-info.txt", "Title", "My Photos"));
        apply_tag(&mut obj, &Tag::new("aptrust-info.txt", "Access", "Restricted"));
        apply_tag(&mut obj, &Tag::new("bag-info.txt", "Source-Organization", "Example U"));
        apply_tag(&mut obj, &Tag::new("bag-info.txt", "Internal-Sender-Identifier", "X-123"));

        assert_eq!(obj.title, "My Photos");
        assert_eq!(obj.access, AccessLevel::Restricted);
        assert_eq!(obj.institution, "Example U");
        assert_eq!(obj.alt_identifier, "X-123");
    }
}
