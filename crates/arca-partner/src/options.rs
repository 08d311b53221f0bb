//! Option resolution for the partner tools.
//!
//! Credentials come from the environment (`ACCESS_KEY_ID` /
//! `SECRET_ACCESS_KEY`, or their `AWS_`-prefixed forms) or from the
//! partner config file, a plain `key = value` file at
//! `~/.partner.conf` or wherever `--config` points.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

/// Resolved settings for one tool invocation.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,

    /// Custom S3 endpoint (test and local-stack use)
    pub s3_endpoint: Option<String>,

    /// Where each credential came from, for error messages
    pub access_key_from: &'static str,
    pub secret_key_from: &'static str,
}

impl Options {
    /// Resolve options from the config file (if any), then the
    /// environment, then the command line.
    pub fn resolve(
        config_path: Option<&str>,
        region: &str,
        bucket: &str,
    ) -> Result<Self> {
        let mut opts = Options {
            region: region.to_string(),
            bucket: bucket.to_string(),
            ..Default::default()
        };

        if let Some(path) = config_file_path(config_path) {
            let file = parse_config_file(&path)?;
            if let Some(value) = file.get("access_key_id") {
                opts.access_key_id = value.clone();
                opts.access_key_from = "config file";
            }
            if let Some(value) = file.get("secret_access_key") {
                opts.secret_access_key = value.clone();
                opts.secret_key_from = "config file";
            }
            if let Some(value) = file.get("region") {
                if opts.region.is_empty() {
                    opts.region = value.clone();
                }
            }
            if let Some(value) = file.get("s3_endpoint") {
                opts.s3_endpoint = Some(value.clone());
            }
        }

        // Environment wins over the config file.
        if let Some(value) = env_first(&["ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID"]) {
            opts.access_key_id = value;
            opts.access_key_from = "environment";
        }
        if let Some(value) = env_first(&["SECRET_ACCESS_KEY", "AWS_SECRET_ACCESS_KEY"]) {
            opts.secret_access_key = value;
            opts.secret_key_from = "environment";
        }

        opts.validate()?;
        Ok(opts)
    }

    fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(anyhow!("--bucket is required"));
        }
        if self.access_key_id.is_empty() || self.secret_access_key.is_empty() {
            return Err(anyhow!(
                "Cannot find your storage credentials. Set ACCESS_KEY_ID and \
                 SECRET_ACCESS_KEY in the environment, or put access_key_id and \
                 secret_access_key in your partner config file."
            ));
        }
        Ok(())
    }
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
}

/// Explicit `--config` path, else `~/.partner.conf` when it exists.
fn config_file_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }
    let default = dirs::home_dir()?.join(".partner.conf");
    default.exists().then_some(default)
}

/// Parse `key = value` lines; `#` starts a comment.
fn parse_config_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Cannot read config file {}: {}", path.display(), e))?;
    let mut values = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            values.insert(
                key.trim().to_ascii_lowercase(),
                value.trim().trim_matches('"').to_string(),
            );
        }
    }
    Ok(values)
}
