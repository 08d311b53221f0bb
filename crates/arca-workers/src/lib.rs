//! Arca work stages
//!
//! The ingest pipeline and its branch pipelines: durable, idempotent,
//! resumable stages connected by a work queue and the external
//! work-item registry.
//!
//! - [`worker`]: the stage framework with its lease, outcome alphabet,
//!   and bounded request/cleanup queues
//! - [`registry`]: REST client for the work-item registry
//! - [`queue`]: the message-broker interface (ack, requeue, touch)
//! - [`s3`]: typed object-store operations over primary and cold-tier
//!   storage
//! - [`stages`]: fetch, store, record, plus the restore, delete, and
//!   peer-replication branches

pub mod config;
pub mod context;
pub mod error;
pub mod queue;
pub mod registry;
pub mod s3;
pub mod stages;
pub mod volume;
pub mod worker;

pub use error::{Result, WorkerError};
