//! Member files of a preserved object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DigestAlgorithm, FileType, StorageOption};
use crate::error::CommonError;

/// A digest recorded for a file, as sent to the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checksum {
    pub algorithm: DigestAlgorithm,
    pub date_time: DateTime<Utc>,
    pub digest: String,
}

/// Ingest bookkeeping carried with a GenericFile through the pipeline.
///
/// This section lives in the side-index and in work-item state blobs but
/// is stripped from registry payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestData {
    /// Role of the file inside the bag
    pub file_type: Option<FileType>,

    /// Absolute path on local disk; empty when reading from a tar stream
    #[serde(default)]
    pub local_path: String,

    /// md5 reported by the bag's md5 manifest, if listed there
    #[serde(default)]
    pub manifest_md5: String,

    /// md5 computed from the file bytes
    #[serde(default)]
    pub md5: String,

    #[serde(default)]
    pub md5_generated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub md5_verified_at: Option<DateTime<Utc>>,

    /// sha256 reported by the bag's sha256 manifest, if listed there
    #[serde(default)]
    pub manifest_sha256: String,

    /// sha256 computed from the file bytes
    #[serde(default)]
    pub sha256: String,

    #[serde(default)]
    pub sha256_generated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub sha256_verified_at: Option<DateTime<Utc>>,

    /// The UUID that becomes the file's object-store key
    #[serde(default)]
    pub uuid: String,

    #[serde(default)]
    pub uuid_generated_at: Option<DateTime<Utc>>,

    /// URL of the copy in the primary bucket
    #[serde(default)]
    pub storage_url: String,

    #[serde(default)]
    pub stored_at: Option<DateTime<Utc>>,

    /// URL of the replicated copy in the cold tier
    #[serde(default)]
    pub replication_url: String,

    #[serde(default)]
    pub replicated_at: Option<DateTime<Utc>>,

    /// Whether an earlier version of this file already exists in storage
    #[serde(default)]
    pub previous_version_exists: bool,

    /// Whether this file still needs to be written to storage
    #[serde(default = "default_true")]
    pub needs_save: bool,

    /// Error from the most recent ingest attempt, empty when none
    #[serde(default)]
    pub error_message: String,

    /// Owner id from the tar header or file metadata (best effort)
    #[serde(default)]
    pub uid: u32,

    /// Group id from the tar header or file metadata (best effort)
    #[serde(default)]
    pub gid: u32,
}

fn default_true() -> bool {
    true
}

/// One file within a preserved object.
///
/// The identifier is `<object-identifier>/<relative-path>`, e.g.
/// "example.edu/photos_2019/data/img_001.tif".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenericFile {
    /// Registry row id; zero until the record stage creates the row
    #[serde(default)]
    pub id: i64,

    /// `<object-identifier>/<relative-path>`
    pub identifier: String,

    /// Identifier of the owning object
    #[serde(default)]
    pub intellectual_object_identifier: String,

    /// Mime type, e.g. "application/xml"
    #[serde(default)]
    pub file_format: String,

    /// Location of the file in primary long-term storage
    #[serde(default)]
    pub uri: String,

    /// Size in bytes
    #[serde(default)]
    pub size: i64,

    /// Storage tier, inherited from the object
    #[serde(default = "default_storage_option")]
    pub storage_option: StorageOption,

    /// Modification time from the bag
    #[serde(default)]
    pub file_modified: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Digests registered for this file
    #[serde(default)]
    pub checksums: Vec<Checksum>,

    /// Pipeline bookkeeping, never sent to the registry
    #[serde(default)]
    pub ingest: IngestData,
}

fn default_storage_option() -> StorageOption {
    StorageOption::Standard
}

impl GenericFile {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            id: 0,
            identifier: identifier.into(),
            intellectual_object_identifier: String::new(),
            file_format: String::new(),
            uri: String::new(),
            size: 0,
            storage_option: StorageOption::Standard,
            file_modified: None,
            created_at: None,
            updated_at: None,
            checksums: Vec::new(),
            ingest: IngestData::default(),
        }
    }

    /// Path of the file within its bag: the identifier minus the
    /// institution and bag name.
    pub fn original_path(&self) -> Result<&str, CommonError> {
        let mut parts = self.identifier.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(_), Some(rest)) if !rest.is_empty() => Ok(rest),
            _ => Err(CommonError::invalid_identifier(
                &self.identifier,
                "expected <institution>/<bag>/<path>",
            )),
        }
    }

    /// The institution that owns this file.
    pub fn institution_identifier(&self) -> Result<&str, CommonError> {
        self.identifier.split('/').next().filter(|s| !s.is_empty()).ok_or_else(|| {
            CommonError::invalid_identifier(&self.identifier, "expected <institution>/...")
        })
    }

    /// The file's key in preservation storage: the last segment of its
    /// storage URL, which should be a UUID.
    pub fn preservation_storage_key(&self) -> Result<&str, CommonError> {
        match self.uri.rsplit('/').next() {
            Some(key) if !key.is_empty() && self.uri.contains('/') => Ok(key),
            _ => Err(CommonError::invalid_identifier(
                &self.uri,
                "storage URI has no key segment",
            )),
        }
    }

    /// Digest recorded for the given algorithm, if any.
    pub fn checksum(&self, algorithm: DigestAlgorithm) -> Option<&Checksum> {
        self.checksums.iter().find(|c| c.algorithm == algorithm)
    }

    /// The digest computed at validation time for the given algorithm.
    pub fn computed_digest(&self, algorithm: DigestAlgorithm) -> &str {
        match algorithm {
            DigestAlgorithm::Md5 => &self.ingest.md5,
            DigestAlgorithm::Sha256 => &self.ingest.sha256,
        }
    }

    /// The manifest-reported digest for the given algorithm; empty when
    /// the file was not listed in that manifest.
    pub fn manifest_digest(&self, algorithm: DigestAlgorithm) -> &str {
        match algorithm {
            DigestAlgorithm::Md5 => &self.ingest.manifest_md5,
            DigestAlgorithm::Sha256 => &self.ingest.manifest_sha256,
        }
    }

    /// The trimmed payload the registry accepts for file creation.
    ///
    /// Ingest bookkeeping stays out; the size field is a typed i64 so
    /// 64-bit values never pass through floating point.
    pub fn registry_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "identifier": self.identifier,
            "intellectual_object_identifier": self.intellectual_object_identifier,
            "file_format": self.file_format,
            "uri": self.uri,
            "size": self.size,
            "storage_option": self.storage_option,
            "file_modified": self.file_modified,
            "checksums": self.checksums,
        })
    }
}
