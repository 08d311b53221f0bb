//! Canonical enumerations shared by the validator, the work stages,
//! and the registry client.
//!
//! Every enum here crosses a process boundary (registry JSON, work-item
//! state blobs, side-index records), so each one carries a stable string
//! form via `as_str` and serde.

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// Suffix for the per-bag validation side-index file.
pub const VALIDATION_DB_SUFFIX: &str = ".valdb";

/// Mime type recorded for zero-byte payload files.
pub const EMPTY_FILE_FORMAT: &str = "text/empty";

/// The action a work item asks the system to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Ingest,
    Restore,
    Delete,
    ColdRestore,
    PeerIngest,
    PeerReplicate,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Ingest => "ingest",
            Action::Restore => "restore",
            Action::Delete => "delete",
            Action::ColdRestore => "cold-restore",
            Action::PeerIngest => "peer-ingest",
            Action::PeerReplicate => "peer-replicate",
        }
    }
}

impl std::str::FromStr for Action {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ingest" => Ok(Action::Ingest),
            "restore" => Ok(Action::Restore),
            "delete" => Ok(Action::Delete),
            "cold-restore" => Ok(Action::ColdRestore),
            "peer-ingest" => Ok(Action::PeerIngest),
            "peer-replicate" => Ok(Action::PeerReplicate),
            _ => Err(CommonError::unknown_value("action", s)),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The stage a work item has reached within its action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Requested,
    Fetch,
    Validate,
    Store,
    Record,
    Cleanup,
    Package,
    Copy,
    Resolve,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Requested => "requested",
            Stage::Fetch => "fetch",
            Stage::Validate => "validate",
            Stage::Store => "store",
            Stage::Record => "record",
            Stage::Cleanup => "cleanup",
            Stage::Package => "package",
            Stage::Copy => "copy",
            Stage::Resolve => "resolve",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Processing status of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Started,
    Success,
    Failed,
    Cancelled,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Started => "started",
            Status::Success => "success",
            Status::Failed => "failed",
            Status::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who may view a preserved object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Consortia,
    Institution,
    Restricted,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Consortia => "consortia",
            AccessLevel::Institution => "institution",
            AccessLevel::Restricted => "restricted",
        }
    }
}

impl std::str::FromStr for AccessLevel {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "consortia" => Ok(AccessLevel::Consortia),
            "institution" => Ok(AccessLevel::Institution),
            "restricted" => Ok(AccessLevel::Restricted),
            _ => Err(CommonError::unknown_value("access level", s)),
        }
    }
}

/// Which long-term storage tier an object's files land in.
///
/// Standard means primary S3 plus one cold replica; the cold-* options
/// put the only copy in the named cold-tier region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageOption {
    Standard,
    ColdOh,
    ColdOr,
    ColdVa,
}

impl StorageOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOption::Standard => "standard",
            StorageOption::ColdOh => "cold-oh",
            StorageOption::ColdOr => "cold-or",
            StorageOption::ColdVa => "cold-va",
        }
    }
}

impl std::str::FromStr for StorageOption {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(StorageOption::Standard),
            "cold-oh" => Ok(StorageOption::ColdOh),
            "cold-or" => Ok(StorageOption::ColdOr),
            "cold-va" => Ok(StorageOption::ColdVa),
            _ => Err(CommonError::unknown_value("storage option", s)),
        }
    }
}

impl std::fmt::Display for StorageOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role a file plays inside a bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    Payload,
    PayloadManifest,
    TagManifest,
    TagFile,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Payload => "payload",
            FileType::PayloadManifest => "payload-manifest",
            FileType::TagManifest => "tag-manifest",
            FileType::TagFile => "tag-file",
        }
    }
}

/// PREMIS event types recorded against objects and files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    Creation,
    Ingestion,
    IdentifierAssignment,
    AccessAssignment,
    FixityCheck,
    DigestCalculation,
    Replication,
    Deletion,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Creation => "creation",
            EventType::Ingestion => "ingestion",
            EventType::IdentifierAssignment => "identifier-assignment",
            EventType::AccessAssignment => "access-assignment",
            EventType::FixityCheck => "fixity-check",
            EventType::DigestCalculation => "digest-calculation",
            EventType::Replication => "replication",
            EventType::Deletion => "deletion",
        }
    }
}

/// Outcome recorded on a PREMIS event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    Success,
    Failure,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Success => "success",
            EventOutcome::Failure => "failure",
        }
    }
}

/// Digest algorithms the system computes and verifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

impl std::str::FromStr for DigestAlgorithm {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "sha256" => Ok(DigestAlgorithm::Sha256),
            _ => Err(CommonError::unknown_value("digest algorithm", s)),
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trips_through_strings() {
        for action in [
            Action::Ingest,
            Action::Restore,
            Action::Delete,
            Action::ColdRestore,
            Action::PeerIngest,
            Action::PeerReplicate,
        ] {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
        assert!("defenestrate".parse::<Action>().is_err());
    }

    #[test]
    fn enums_serialize_as_their_string_form() {
        assert_eq!(
            serde_json::to_string(&Status::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&StorageOption::ColdOh).unwrap(),
            "\"cold-oh\""
        );
        assert_eq!(
            serde_json::to_string(&EventType::IdentifierAssignment).unwrap(),
            "\"identifier-assignment\""
        );
    }

    #[test]
    fn storage_option_rejects_unknown_values() {
        assert!("thumb-drive".parse::<StorageOption>().is_err());
    }
}
