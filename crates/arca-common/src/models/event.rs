//! PREMIS audit events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DigestAlgorithm, EventOutcome, EventType};

/// One entry in the preservation audit trail.
///
/// Events belong to either an object or a file, referenced by
/// identifier. The constructors below produce the standard events each
/// pipeline stage records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PremisEvent {
    /// Registry row id; zero until recorded
    #[serde(default)]
    pub id: i64,

    /// UUID identifying this event
    pub identifier: String,

    pub event_type: EventType,

    pub date_time: DateTime<Utc>,

    /// What was done
    pub detail: String,

    pub outcome: EventOutcome,

    /// Machine-readable outcome data, e.g. "md5:<digest>"
    pub outcome_detail: String,

    /// Further human-readable outcome information
    #[serde(default)]
    pub outcome_information: String,

    /// The thing that performed the action
    pub object: String,

    /// URL or name identifying the acting software
    pub agent: String,

    /// Identifier of the object this event describes
    #[serde(default)]
    pub intellectual_object_identifier: String,

    /// Identifier of the file this event describes, empty for
    /// object-level events
    #[serde(default)]
    pub generic_file_identifier: String,
}

impl PremisEvent {
    fn base(event_type: EventType, detail: impl Into<String>) -> Self {
        Self {
            id: 0,
            identifier: Uuid::new_v4().to_string(),
            event_type,
            date_time: Utc::now(),
            detail: detail.into(),
            outcome: EventOutcome::Success,
            outcome_detail: String::new(),
            outcome_information: String::new(),
            object: "Arca preservation services".to_string(),
            agent: "https://github.com/arca-archive/arca".to_string(),
            intellectual_object_identifier: String::new(),
            generic_file_identifier: String::new(),
        }
    }

    /// Object creation, recorded when the registry row is written.
    pub fn object_creation() -> Self {
        let mut event = Self::base(EventType::Creation, "Object created");
        event.outcome_detail = "Intellectual object created".to_string();
        event
    }

    /// Object-level ingestion, recorded after all files are stored.
    pub fn object_ingestion(file_count: usize) -> Self {
        let mut event = Self::base(
            EventType::Ingestion,
            "Copied all files to preservation storage",
        );
        event.outcome_detail = format!("{} files copied", file_count);
        event.object = "S3 object-store client".to_string();
        event
    }

    /// Assignment of the object identifier.
    pub fn object_identifier_assignment(identifier: &str) -> Self {
        let mut event = Self::base(EventType::IdentifierAssignment, "Assigned bag identifier");
        event.outcome_detail = identifier.to_string();
        event.outcome_information = "Institution domain + bag name".to_string();
        event
    }

    /// Assignment of the object's access level.
    pub fn object_access_assignment(access: &str) -> Self {
        let mut event = Self::base(EventType::AccessAssignment, "Assigned bag access rights");
        event.outcome_detail = access.to_string();
        event
    }

    /// File copied into the primary preservation bucket.
    pub fn file_ingestion(stored_at: DateTime<Utc>, md5: &str, uuid: &str) -> Self {
        let mut event = Self::base(
            EventType::Ingestion,
            format!("Completed copy to preservation storage ({})", uuid),
        );
        event.date_time = stored_at;
        event.outcome_detail = format!("md5:{}", md5);
        event.object = "S3 object-store client".to_string();
        event.outcome_information = "Put using md5 checksum".to_string();
        event
    }

    /// Assignment of the file's storage UUID.
    pub fn file_identifier_assignment(generated_at: DateTime<Utc>, uuid: &str) -> Self {
        let mut event = Self::base(
            EventType::IdentifierAssignment,
            format!("Assigned storage key {}", uuid),
        );
        event.date_time = generated_at;
        event.outcome_detail = uuid.to_string();
        event
    }

    /// Digest computed during validation.
    pub fn file_digest_calculation(
        generated_at: DateTime<Utc>,
        algorithm: DigestAlgorithm,
        digest: &str,
    ) -> Self {
        let mut event = Self::base(EventType::DigestCalculation, "Calculated fixity value");
        event.date_time = generated_at;
        event.outcome_detail = format!("{}:{}", algorithm.as_str(), digest);
        event.object = "Rust md5/sha2 digest engine".to_string();
        event
    }

    /// Computed digest compared against the manifest-reported one.
    pub fn file_fixity_check(
        checked_at: DateTime<Utc>,
        algorithm: DigestAlgorithm,
        digest: &str,
        fixity_matched: bool,
    ) -> Self {
        let mut event = Self::base(EventType::FixityCheck, "Fixity check against manifest");
        event.date_time = checked_at;
        event.outcome_detail = format!("{}:{}", algorithm.as_str(), digest);
        event.object = "Rust md5/sha2 digest engine".to_string();
        if fixity_matched {
            event.outcome_information = "Fixity matches".to_string();
        } else {
            event.outcome = EventOutcome::Failure;
            event.outcome_information = "Fixity did not match".to_string();
        }
        event
    }

    /// File replicated to the cold tier.
    pub fn file_replication(replicated_at: DateTime<Utc>, replication_url: &str) -> Self {
        let mut event = Self::base(
            EventType::Replication,
            "Copied to replication storage and assigned replication URL",
        );
        event.date_time = replicated_at;
        event.outcome_detail = replication_url.to_string();
        event.object = "S3 object-store client".to_string();
        event
    }

    /// File removed from preservation storage at the depositor's request.
    pub fn file_deletion(deleted_at: DateTime<Utc>, requested_by: &str) -> Self {
        let mut event = Self::base(EventType::Deletion, "File deleted at depositor's request");
        event.date_time = deleted_at;
        event.outcome_detail = format!("Requested by {}", requested_by);
        event
    }

    /// Attach this event to a file (and its owning object).
    pub fn for_file(mut self, file_identifier: &str, object_identifier: &str) -> Self {
        self.generic_file_identifier = file_identifier.to_string();
        self.intellectual_object_identifier = object_identifier.to_string();
        self
    }

    /// Attach this event to an object.
    pub fn for_object(mut self, object_identifier: &str) -> Self {
        self.intellectual_object_identifier = object_identifier.to_string();
        self
    }
}
