//! Error types for bag reading and validation

use thiserror::Error;

/// Result type alias for bag operations
pub type Result<T> = std::result::Result<T, BagError>;

/// Error type for bag reading and validation
#[derive(Error, Debug)]
pub enum BagError {
    /// Bag path does not exist or is not readable
    #[error("Bag does not exist at {0}")]
    BagNotFound(String),

    /// Validation configuration is unusable
    #[error("Invalid validation config: {0}")]
    InvalidConfig(String),

    /// Side-index operations failed
    #[error("Side-index error: {0}")]
    SideIndex(#[from] rusqlite::Error),

    /// A record expected in the side-index is missing
    #[error("Record '{0}' is missing from the side-index")]
    MissingRecord(String),

    /// I/O errors reading the bag
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of side-index records failed
    #[error("Failed to process JSON data: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Pattern in the validation config failed to compile
    #[error("Invalid pattern in validation config: {0}")]
    Pattern(#[from] regex::Error),

    /// Shared model errors
    #[error(transparent)]
    Common(#[from] arca_common::CommonError),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BagError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
