//! Registry records for asynchronous units of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{Action, Stage, Status};

/// A depositor institution, as returned by the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Institution {
    pub id: i64,

    /// Domain-style identifier, e.g. "example.edu"
    pub identifier: String,

    pub name: String,

    /// Bucket the institution deposits bags into
    #[serde(default)]
    pub receiving_bucket: String,

    /// Bucket restored bags are delivered to
    #[serde(default)]
    pub restore_bucket: String,
}

/// One asynchronous unit of work, owned by the registry and mutated
/// only through its client.
///
/// A work item is leased by exactly one worker at a time: the claimant
/// is `{node, pid}`, and the registry rejects writes whose claim does
/// not match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkItem {
    pub id: i64,

    /// Identifier of the object this work concerns
    #[serde(default)]
    pub object_identifier: String,

    /// Identifier of a single file, for file-scoped work
    #[serde(default)]
    pub generic_file_identifier: String,

    /// Name of the deposited bag, e.g. "photos_2019.tar"
    #[serde(default)]
    pub name: String,

    /// Receiving bucket the bag arrived in
    #[serde(default)]
    pub bucket: String,

    /// ETag of the deposited tar in the receiving bucket
    #[serde(default)]
    pub etag: String,

    /// Size of the deposited tar in bytes
    #[serde(default)]
    pub size: i64,

    /// When the bag landed in the receiving bucket
    #[serde(default)]
    pub bag_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub institution_id: i64,

    /// Email of the user who initiated the work, if any
    #[serde(default)]
    pub user: String,

    pub action: Action,
    pub stage: Stage,
    pub status: Status,

    /// Operator-visible note; carries the error list on failure
    #[serde(default)]
    pub note: String,

    /// Whether an external sweep may re-enqueue this item
    #[serde(default)]
    pub retry: bool,

    /// Set on fatal failures so the operator UI surfaces the item
    #[serde(default)]
    pub needs_admin_review: bool,

    /// Hostname of the worker holding the lease, empty when unclaimed
    #[serde(default)]
    pub node: String,

    /// Pid of the worker holding the lease, zero when unclaimed
    #[serde(default)]
    pub pid: u32,

    /// Registry id of the attached state blob, if any
    #[serde(default)]
    pub work_item_state_id: Option<i64>,

    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl WorkItem {
    /// A pending item for the given action, ready to be created in the
    /// registry.
    pub fn new(object_identifier: impl Into<String>, action: Action) -> Self {
        Self {
            id: 0,
            object_identifier: object_identifier.into(),
            generic_file_identifier: String::new(),
            name: String::new(),
            bucket: String::new(),
            etag: String::new(),
            size: 0,
            bag_date: None,
            institution_id: 0,
            user: String::new(),
            action,
            stage: Stage::Requested,
            status: Status::Pending,
            note: String::new(),
            retry: true,
            needs_admin_review: false,
            node: String::new(),
            pid: 0,
            work_item_state_id: None,
            date: Some(Utc::now()),
        }
    }

    /// Whether another worker currently holds the lease.
    pub fn claimed_by_other(&self, node: &str, pid: u32) -> bool {
        let unclaimed = self.node.is_empty() && self.pid == 0;
        !unclaimed && !(self.node == node && self.pid == pid)
    }

    /// Whether the item is in a state a worker may pick up.
    pub fn processable(&self) -> bool {
        matches!(self.status, Status::Pending | Status::Started)
    }

    /// Stamp this worker's claim and mark the item started.
    pub fn claim(&mut self, node: &str, pid: u32) {
        self.node = node.to_string();
        self.pid = pid;
        self.status = Status::Started;
    }

    /// Clear the claim without touching status.
    pub fn release(&mut self) {
        self.node = String::new();
        self.pid = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_checks() {
        let mut item = WorkItem::new("example.edu/bag", Action::Ingest);
        assert!(!item.claimed_by_other("host-a", 100));
        assert!(item.processable());

        item.claim("host-a", 100);
        assert_eq!(item.status, Status::Started);
        assert!(!item.claimed_by_other("host-a", 100));
        assert!(item.claimed_by_other("host-b", 100));
        assert!(item.claimed_by_other("host-a", 200));

        item.release();
        assert!(!item.claimed_by_other("host-b", 7));
    }

    #[test]
    fn terminal_statuses_are_not_processable() {
        let mut item = WorkItem::new("example.edu/bag", Action::Restore);
        for status in [Status::Success, Status::Failed, Status::Cancelled] {
            item.status = status;
            assert!(!item.processable());
        }
    }

    #[test]
    fn json_round_trip_preserves_scalars() {
        let mut item = WorkItem::new("example.edu/bag", Action::ColdRestore);
        item.id = 42;
        item.size = 9_007_199_254_740_993;
        item.etag = "0000000000000000".to_string();
        let json = serde_json::to_string(&item).unwrap();
        let decoded: WorkItem = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, item);
        assert_eq!(decoded.size, 9_007_199_254_740_993);
    }
}
