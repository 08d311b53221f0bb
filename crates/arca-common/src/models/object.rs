//! The archival object and its descriptive tags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{AccessLevel, StorageOption};
use crate::error::CommonError;

/// One `label: value` entry parsed from a bag's tag files.
///
/// Order of appearance is preserved on [`IntellectualObject::tags`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    /// Relative path of the tag file this came from, e.g. "bag-info.txt"
    pub source_file: String,

    /// Tag label as written (comparison is case-insensitive)
    pub label: String,

    /// Tag value, continuation lines joined with single spaces
    pub value: String,
}

impl Tag {
    pub fn new(
        source_file: impl Into<String>,
        label: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            source_file: source_file.into(),
            label: label.into(),
            value: value.into(),
        }
    }
}

/// An archival object: one deposited bag, preserved as a set of files.
///
/// The identifier is `<institution>/<bag-name>` and is globally unique
/// within the archive. Member files and events reference the object by
/// identifier, never by pointer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntellectualObject {
    /// Registry row id; zero until the record stage creates the row
    #[serde(default)]
    pub id: i64,

    /// `<institution>/<bag-name>`
    pub identifier: String,

    /// Title promoted from the bag's descriptive tags
    #[serde(default)]
    pub title: String,

    /// Depositor-supplied description
    #[serde(default)]
    pub description: String,

    /// Alternate identifier supplied by the depositor
    #[serde(default)]
    pub alt_identifier: String,

    /// Access level for the object
    pub access: AccessLevel,

    /// Identifier of the owning institution, e.g. "example.edu"
    #[serde(default)]
    pub institution: String,

    /// Registry id of the owning institution
    #[serde(default)]
    pub institution_id: i64,

    /// Storage tier the object's files are written to
    pub storage_option: StorageOption,

    /// Identifiers of the object's member files
    #[serde(default)]
    pub file_identifiers: Vec<String>,

    /// Tags parsed from the bag, in order of appearance
    #[serde(default)]
    pub tags: Vec<Tag>,

    /// Absolute path to the tarred bag being ingested, if any
    #[serde(default)]
    pub ingest_tar_path: String,

    /// Absolute path to the untarred bag being ingested, if any
    #[serde(default)]
    pub ingest_untarred_path: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl IntellectualObject {
    /// A barebones object for the given identifier, defaulting to
    /// standard storage and institution-level access.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            id: 0,
            identifier: identifier.into(),
            title: String::new(),
            description: String::new(),
            alt_identifier: String::new(),
            access: AccessLevel::Institution,
            institution: String::new(),
            institution_id: 0,
            storage_option: StorageOption::Standard,
            file_identifiers: Vec::new(),
            tags: Vec::new(),
            ingest_tar_path: String::new(),
            ingest_untarred_path: String::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// The institution portion of the identifier.
    pub fn institution_identifier(&self) -> Result<&str, CommonError> {
        self.identifier.split('/').next().filter(|s| !s.is_empty()).ok_or_else(|| {
            CommonError::invalid_identifier(&self.identifier, "expected <institution>/<bag>")
        })
    }

    /// The bag-name portion of the identifier.
    pub fn bag_name(&self) -> Result<&str, CommonError> {
        match self.identifier.split_once('/') {
            Some((_, bag)) if !bag.is_empty() => Ok(bag),
            _ => Err(CommonError::invalid_identifier(
                &self.identifier,
                "expected <institution>/<bag>",
            )),
        }
    }

    /// First tag with the given label (case-insensitive), if present.
    pub fn find_tag(&self, label: &str) -> Option<&Tag> {
        self.tags
            .iter()
            .find(|t| t.label.eq_ignore_ascii_case(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_parts() {
        let obj = IntellectualObject::new("example.edu/photos_2019");
        assert_eq!(obj.institution_identifier().unwrap(), "example.edu");
        assert_eq!(obj.bag_name().unwrap(), "photos_2019");

        let bad = IntellectualObject::new("no-slash");
        assert!(bad.bag_name().is_err());
    }

    #[test]
    fn find_tag_is_case_insensitive() {
        let mut obj = IntellectualObject::new("example.edu/bag");
        obj.tags.push(Tag::new("bag-info.txt", "Source-Organization", "Example University"));
        assert_eq!(
            obj.find_tag("source-organization").unwrap().value,
            "Example University"
        );
        assert!(obj.find_tag("contact-name").is_none());
    }

    #[test]
    fn serializes_without_optional_noise() {
        let obj = IntellectualObject::new("example.edu/bag");
        let json = serde_json::to_value(&obj).unwrap();
        assert_eq!(json["identifier"], "example.edu/bag");
        assert_eq!(json["access"], "institution");
        assert_eq!(json["storage_option"], "standard");
    }
}
