//! Worker configuration.
//!
//! Loaded from a JSON file, with credentials and the registry URL
//! overridable from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use arca_common::constants::StorageOption;

use crate::error::{Result, WorkerError};

/// Everything a worker process needs to know about its surroundings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the work-item registry
    pub registry_url: String,

    /// Registry API user (header auth)
    #[serde(default)]
    pub registry_user: String,

    /// Registry API key (header auth)
    #[serde(default)]
    pub registry_key: String,

    /// Base URL of the peer network's registry
    #[serde(default)]
    pub peer_registry_url: String,

    /// Region of the primary preservation bucket
    pub primary_region: String,

    /// The primary long-term storage bucket
    pub preservation_bucket: String,

    /// Region of the cold-tier replication bucket
    pub replication_region: String,

    /// Cold-tier bucket receiving the replicated copy of every
    /// standard-storage file
    pub replication_bucket: String,

    /// Cold-tier regions and buckets per storage option
    #[serde(default)]
    pub cold_region_oh: String,
    #[serde(default)]
    pub cold_bucket_oh: String,
    #[serde(default)]
    pub cold_region_or: String,
    #[serde(default)]
    pub cold_bucket_or: String,
    #[serde(default)]
    pub cold_region_va: String,
    #[serde(default)]
    pub cold_bucket_va: String,

    /// Bucket validated peer bags are stored in
    #[serde(default)]
    pub peer_preservation_bucket: String,

    /// Scratch root for downloaded bags and side-indexes
    pub scratch_dir: PathBuf,

    /// Staging root for bags being rebuilt for restore
    pub restore_dir: PathBuf,

    /// Staging root for peer-replication bags
    #[serde(default)]
    pub peer_staging_dir: PathBuf,

    /// Path to the bag validation config (JSON)
    pub validation_config: PathBuf,

    /// Path to the validation config applied to bags from peer nodes
    #[serde(default)]
    pub peer_validation_config: PathBuf,

    /// Handlers running concurrently within one stage
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Deadline per handled message, in seconds
    #[serde(default = "default_max_processing_seconds")]
    pub max_processing_seconds: u64,

    /// Uploads above this size go through multipart
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold: i64,

    /// Hours a thawed cold-tier copy stays readable in primary storage
    #[serde(default = "default_restore_retention_hours")]
    pub restore_retention_hours: u32,

    /// Custom S3 endpoint (test and local-stack use)
    #[serde(default)]
    pub s3_endpoint: Option<String>,

    /// Object-store credentials; read from the environment when empty
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
}

fn default_max_in_flight() -> usize {
    4
}

fn default_max_processing_seconds() -> u64 {
    3600
}

fn default_multipart_threshold() -> i64 {
    100 * 1024 * 1024
}

fn default_restore_retention_hours() -> u32 {
    72
}

impl Config {
    /// Load configuration from a JSON file, then apply environment
    /// overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            WorkerError::config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| WorkerError::config(format!("cannot parse config: {}", e)))?;
        config.apply_env();
        Ok(config)
    }

    /// Environment overrides: `ARCA_REGISTRY_URL`, `ARCA_REGISTRY_USER`,
    /// `ARCA_REGISTRY_KEY`, `ACCESS_KEY_ID` / `AWS_ACCESS_KEY_ID`, and
    /// `SECRET_ACCESS_KEY` / `AWS_SECRET_ACCESS_KEY`.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("ARCA_REGISTRY_URL") {
            self.registry_url = url;
        }
        if let Ok(user) = std::env::var("ARCA_REGISTRY_USER") {
            self.registry_user = user;
        }
        if let Ok(key) = std::env::var("ARCA_REGISTRY_KEY") {
            self.registry_key = key;
        }
        if self.access_key_id.is_empty() {
            self.access_key_id = std::env::var("ACCESS_KEY_ID")
                .or_else(|_| std::env::var("AWS_ACCESS_KEY_ID"))
                .unwrap_or_default();
        }
        if self.secret_access_key.is_empty() {
            self.secret_access_key = std::env::var("SECRET_ACCESS_KEY")
                .or_else(|_| std::env::var("AWS_SECRET_ACCESS_KEY"))
                .unwrap_or_default();
        }
    }

    /// Cold-tier region and bucket for a file, by its storage option.
    ///
    /// Standard-storage files keep their cold copy in the replication
    /// bucket; the cold-only options name their own region and bucket.
    pub fn cold_target(&self, option: StorageOption) -> Result<(String, String)> {
        let (region, bucket) = match option {
            StorageOption::Standard => (&self.replication_region, &self.replication_bucket),
            StorageOption::ColdOh => (&self.cold_region_oh, &self.cold_bucket_oh),
            StorageOption::ColdOr => (&self.cold_region_or, &self.cold_bucket_or),
            StorageOption::ColdVa => (&self.cold_region_va, &self.cold_bucket_va),
        };
        if region.is_empty() || bucket.is_empty() {
            return Err(WorkerError::config(format!(
                "no cold-tier target configured for storage option '{}'",
                option
            )));
        }
        Ok((region.clone(), bucket.clone()))
    }

    /// Primary region and bucket a file's first copy is written to.
    pub fn primary_target(&self, option: StorageOption) -> Result<(String, String)> {
        match option {
            StorageOption::Standard => Ok((
                self.primary_region.clone(),
                self.preservation_bucket.clone(),
            )),
            other => self.cold_target(other),
        }
    }

    /// A config for tests, rooted under the given scratch directory.
    pub fn for_testing(scratch: &Path) -> Self {
        Self {
            registry_url: "http://127.0.0.1:1".to_string(),
            registry_user: "system@example.org".to_string(),
            registry_key: "test-key".to_string(),
            peer_registry_url: String::new(),
            primary_region: "us-east-1".to_string(),
            preservation_bucket: "arca-preservation".to_string(),
            replication_region: "us-west-2".to_string(),
            replication_bucket: "arca-replication".to_string(),
            cold_region_oh: "us-east-2".to_string(),
            cold_bucket_oh: "arca-cold-oh".to_string(),
            cold_region_or: "us-west-2".to_string(),
            cold_bucket_or: "arca-cold-or".to_string(),
            cold_region_va: "us-east-1".to_string(),
            cold_bucket_va: "arca-cold-va".to_string(),
            peer_preservation_bucket: "arca-peer".to_string(),
            scratch_dir: scratch.join("scratch"),
            restore_dir: scratch.join("restore"),
            peer_staging_dir: scratch.join("peer"),
            validation_config: scratch.join("validation.json"),
            peer_validation_config: scratch.join("peer_validation.json"),
            max_in_flight: 2,
            max_processing_seconds: 60,
            multipart_threshold: default_multipart_threshold(),
            restore_retention_hours: 72,
            s3_endpoint: None,
            access_key_id: "test-access-key".to_string(),
            secret_access_key: "test-secret-key".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_target_by_storage_option() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::for_testing(tmp.path());

        let (region, bucket) = config.cold_target(StorageOption::Standard).unwrap();
        assert_eq!(region, "us-west-2");
        assert_eq!(bucket, "arca-replication");

        let (region, bucket) = config.cold_target(StorageOption::ColdOh).unwrap();
        assert_eq!(region, "us-east-2");
        assert_eq!(bucket, "arca-cold-oh");
    }

    #[test]
    fn primary_target_for_cold_options_is_the_cold_bucket() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::for_testing(tmp.path());

        let (_, bucket) = config.primary_target(StorageOption::Standard).unwrap();
        assert_eq!(bucket, "arca-preservation");

        let (_, bucket) = config.primary_target(StorageOption::ColdVa).unwrap();
        assert_eq!(bucket, "arca-cold-va");
    }

    #[test]
    fn missing_cold_target_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::for_testing(tmp.path());
        config.cold_bucket_or.clear();
        assert!(config.cold_target(StorageOption::ColdOr).is_err());
    }

    #[test]
    fn loads_from_json_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "registry_url": "https://registry.example.org",
                "primary_region": "us-east-1",
                "preservation_bucket": "preservation",
                "replication_region": "us-west-2",
                "replication_bucket": "replication",
                "scratch_dir": "/mnt/arca/scratch",
                "restore_dir": "/mnt/arca/restore",
                "validation_config": "/etc/arca/validation.json"
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.registry_url, "https://registry.example.org");
        assert_eq!(config.max_in_flight, 4);
        assert_eq!(config.multipart_threshold, 100 * 1024 * 1024);
    }
}
