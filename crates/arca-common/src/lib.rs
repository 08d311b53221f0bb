//! Arca Common Library
//!
//! Shared types, constants, and utilities for the Arca preservation
//! back end.
//!
//! # Overview
//!
//! This crate provides functionality used across all Arca workspace
//! members:
//!
//! - **Constants**: work-item actions, stages, statuses, storage options
//! - **Models**: the preserved-object graph (IntellectualObject,
//!   GenericFile, PremisEvent) and the work-item records that track it
//! - **Digests**: single-pass multi-algorithm hashing
//! - **Logging**: tracing setup shared by workers and CLI tools
//! - **Error Handling**: the shared error and result types

pub mod constants;
pub mod digest;
pub mod error;
pub mod logging;
pub mod models;

// Re-export commonly used types
pub use error::{CommonError, Result};
