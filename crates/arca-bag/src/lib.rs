//! Arca bag reading and validation
//!
//! A bag is a tar file or directory holding payload files under `data/`,
//! payload and tag manifests, and plain-text tag files. This crate reads
//! bags as content-addressed containers and validates them against a
//! [`validation::BagValidationConfig`]:
//!
//! - [`iter`]: uniform forward-only iteration over tar or directory bags
//! - [`valdb`]: the per-bag `.valdb` side-index, so bags far larger than
//!   memory validate in streaming passes
//! - [`validation`]: the validator itself, covering digests, manifests,
//!   tags, file specs, and tag specs, with every error accumulated

pub mod error;
pub mod iter;
pub mod valdb;
pub mod validation;

pub use error::{BagError, Result};
