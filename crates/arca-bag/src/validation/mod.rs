//! Structural, manifest, checksum, and tag validation of bags.

mod config;
mod validator;

pub use config::{BagValidationConfig, FileSpec, TagSpec};
pub use validator::Validator;
