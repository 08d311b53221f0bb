//! What a bag must contain to be accepted.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use arca_common::constants::DigestAlgorithm;

use crate::error::{BagError, Result};

/// Per-path constraints on a file the bag may or must contain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileSpec {
    /// The bag is invalid without this file
    #[serde(default)]
    pub required: bool,

    /// Mime types this file may have; empty means unconstrained
    #[serde(default)]
    pub allowed_mime: Vec<String>,

    /// Parse this file's contents as `label: value` tags
    #[serde(default)]
    pub parse_as_tag_file: bool,
}

/// Per-tag constraints on the bag's descriptive metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TagSpec {
    /// Tag file the tag must appear in, e.g. "aptrust-info.txt"
    #[serde(default)]
    pub source_file: String,

    /// The bag is invalid without this tag
    #[serde(default)]
    pub required: bool,

    /// Values the tag may take; empty means any value
    #[serde(default)]
    pub allowed_values: Vec<String>,
}

/// Everything the validator needs beyond the manifests themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BagValidationConfig {
    /// Constraints keyed by relative path within the bag
    #[serde(default)]
    pub file_specs: HashMap<String, FileSpec>,

    /// Constraints keyed by tag label (matched case-insensitively)
    #[serde(default)]
    pub tag_specs: HashMap<String, TagSpec>,

    /// Digest algorithms to compute while reading the bag
    #[serde(default)]
    pub fixity_algorithms: Vec<DigestAlgorithm>,

    /// Regex every top-level name in the bag must match, if set
    #[serde(default)]
    pub allowed_top_level_names: Option<String>,

    /// Regexes no path in the bag may match
    #[serde(default)]
    pub illegal_path_patterns: Vec<String>,
}

/// The config's patterns, compiled once per validation run.
#[derive(Debug)]
pub struct CompiledPatterns {
    pub allowed_top_level: Option<Regex>,
    pub illegal_paths: Vec<Regex>,
}

impl BagValidationConfig {
    /// Load a validation config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            BagError::invalid_config(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| BagError::invalid_config(format!("cannot parse config: {}", e)))?;
        Ok(config)
    }

    /// Problems that make this config unusable, empty when none.
    pub fn validate_config(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.fixity_algorithms.is_empty() {
            problems.push("config enables no fixity algorithms".to_string());
        }
        for (label, spec) in &self.tag_specs {
            if spec.source_file.is_empty() {
                problems.push(format!("tag spec '{}' names no source file", label));
            }
        }
        for (path, spec) in &self.file_specs {
            if spec.parse_as_tag_file && path.starts_with("data/") {
                problems.push(format!(
                    "file spec '{}': payload files cannot be parsed as tag files",
                    path
                ));
            }
        }
        problems
    }

    /// Compile the name and path patterns.
    pub fn compile_patterns(&self) -> Result<CompiledPatterns> {
        let allowed_top_level = self
            .allowed_top_level_names
            .as_deref()
            .map(Regex::new)
            .transpose()?;
        let illegal_paths = self
            .illegal_path_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(CompiledPatterns {
            allowed_top_level,
            illegal_paths,
        })
    }

    /// Relative paths of tag files the validator should parse.
    pub fn tag_files_to_parse(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .file_specs
            .iter()
            .filter(|(_, spec)| spec.parse_as_tag_file)
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }
}
