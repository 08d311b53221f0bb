//! Typed object-store operations over primary and cold-tier storage.
//!
//! One client per region is built lazily and cached for the process
//! lifetime. Uploads above the configured threshold go through
//! multipart, and partial multipart uploads are aborted on error
//! (storage accrues charges for orphaned parts otherwise).

use std::collections::HashMap;
use std::path::Path;

use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    CompletedMultipartUpload, CompletedPart, GlacierJobParameters, RestoreRequest, Tier,
};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, WorkerError};

/// Part size for multipart uploads.
const MULTIPART_PART_SIZE: usize = 16 * 1024 * 1024;

/// Thaw status of a cold-tier object, decoded from a HEAD response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreStatus {
    /// A thaw is running but the object is not yet readable
    InProgress,
    /// The thawed copy is readable until roughly `available_until`
    Completed {
        available_until: Option<DateTime<Utc>>,
    },
}

/// What HEAD knows about an object.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub size: i64,
    pub etag: String,
    pub metadata: HashMap<String, String>,
    pub restore: Option<RestoreStatus>,
}

/// Result of asking the cold tier to thaw an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The request was accepted and a thaw has begun
    Accepted,
    /// Someone already asked; a thaw is running
    AlreadyInProgress,
    /// The object is already readable from primary storage
    AlreadyRestored,
}

/// Object-store client with per-region session caching.
pub struct ObjectStore {
    endpoint: Option<String>,
    access_key_id: String,
    secret_access_key: String,
    multipart_threshold: i64,
    clients: RwLock<HashMap<String, Client>>,
}

impl ObjectStore {
    pub fn new(config: &Config) -> Self {
        Self::with_credentials(
            &config.access_key_id,
            &config.secret_access_key,
            config.s3_endpoint.clone(),
            config.multipart_threshold,
        )
    }

    /// A client outside the worker config, for admin tooling.
    pub fn with_credentials(
        access_key_id: &str,
        secret_access_key: &str,
        endpoint: Option<String>,
        multipart_threshold: i64,
    ) -> Self {
        Self {
            endpoint,
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            multipart_threshold,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// The cached client for a region, built on first use.
    async fn client(&self, region: &str) -> Client {
        if let Some(client) = self.clients.read().await.get(region) {
            return client.clone();
        }

        let credentials = Credentials::new(
            &self.access_key_id,
            &self.secret_access_key,
            None,
            None,
            "arca-object-store",
        );
        // Retries belong to the stage framework's requeue/backoff
        // contract, not to the transport.
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            .region(Region::new(region.to_string()));
        if let Some(ref endpoint) = self.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        let client = Client::from_conf(builder.build());

        self.clients
            .write()
            .await
            .insert(region.to_string(), client.clone());
        client
    }

    /// Public URL of an object, matching how this client addresses it.
    pub fn url_for(&self, region: &str, bucket: &str, key: &str) -> String {
        match self.endpoint {
            Some(ref endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
            None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
        }
    }

    /// Upload a local file, returning the object's URL.
    ///
    /// Metadata should carry the canonical keys (`institution`, `bag`,
    /// `bagpath`, `md5`, `sha256`) plus anything caller-specific.
    pub async fn put_file(
        &self,
        region: &str,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: Option<&str>,
        metadata: &HashMap<String, String>,
    ) -> Result<String> {
        let size = tokio::fs::metadata(path).await?.len() as i64;
        debug!(bucket, key, size, "Uploading to object store");

        if size > self.multipart_threshold {
            self.put_file_multipart(region, bucket, key, path, content_type, metadata)
                .await?;
        } else {
            let body = ByteStream::from_path(path)
                .await
                .map_err(|e| WorkerError::object_store(format!("cannot read {}: {}", path.display(), e)))?;
            let mut request = self
                .client(region)
                .await
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(body);
            if let Some(ct) = content_type {
                request = request.content_type(ct);
            }
            for (name, value) in metadata {
                request = request.metadata(name, value);
            }
            request
                .send()
                .await
                .map_err(|e| WorkerError::object_store(format!("put s3://{}/{}: {}", bucket, key, display_sdk_error(&e))))?;
        }

        info!(bucket, key, size, "Upload complete");
        Ok(self.url_for(region, bucket, key))
    }

    async fn put_file_multipart(
        &self,
        region: &str,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: Option<&str>,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        let client = self.client(region).await;

        let mut create = client.create_multipart_upload().bucket(bucket).key(key);
        if let Some(ct) = content_type {
            create = create.content_type(ct);
        }
        for (name, value) in metadata {
            create = create.metadata(name, value);
        }
        let upload = create.send().await.map_err(|e| {
            WorkerError::object_store(format!(
                "create multipart s3://{}/{}: {}",
                bucket,
                key,
                display_sdk_error(&e)
            ))
        })?;
        let upload_id = upload
            .upload_id()
            .ok_or_else(|| WorkerError::object_store("multipart upload came back without an id"))?
            .to_string();

        match self
            .upload_parts(&client, bucket, key, &upload_id, path)
            .await
        {
            Ok(parts) => {
                client
                    .complete_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(
                        CompletedMultipartUpload::builder()
                            .set_parts(Some(parts))
                            .build(),
                    )
                    .send()
                    .await
                    .map_err(|e| {
                        WorkerError::object_store(format!(
                            "complete multipart s3://{}/{}: {}",
                            bucket,
                            key,
                            display_sdk_error(&e)
                        ))
                    })?;
                Ok(())
            }
            Err(e) => {
                warn!(bucket, key, error = %e, "Aborting failed multipart upload");
                let abort = client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await;
                if let Err(abort_err) = abort {
                    warn!(bucket, key, error = %display_sdk_error(&abort_err), "Abort failed; orphaned parts remain");
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        client: &Client,
        bucket: &str,
        key: &str,
        upload_id: &str,
        path: &Path,
    ) -> Result<Vec<CompletedPart>> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut parts = Vec::new();
        let mut part_number = 1;

        loop {
            let mut buffer = vec![0u8; MULTIPART_PART_SIZE];
            let mut filled = 0;
            while filled < buffer.len() {
                let n = file.read(&mut buffer[filled..]).await?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                break;
            }
            buffer.truncate(filled);

            let part = client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(buffer))
                .send()
                .await
                .map_err(|e| {
                    WorkerError::object_store(format!(
                        "upload part {} of s3://{}/{}: {}",
                        part_number,
                        bucket,
                        key,
                        display_sdk_error(&e)
                    ))
                })?;

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(part.e_tag().map(str::to_string))
                    .build(),
            );
            part_number += 1;
            if filled < MULTIPART_PART_SIZE {
                break;
            }
        }

        Ok(parts)
    }

    /// Download an object to a local file.
    pub async fn download_to_file(
        &self,
        region: &str,
        bucket: &str,
        key: &str,
        path: &Path,
    ) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let response = self
            .client(region)
            .await
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                WorkerError::object_store(format!(
                    "get s3://{}/{}: {}",
                    bucket,
                    key,
                    display_sdk_error(&e)
                ))
            })?;

        let mut body = response.body;
        let mut file = tokio::fs::File::create(path).await?;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| WorkerError::object_store(format!("read s3://{}/{}: {}", bucket, key, e)))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    /// HEAD an object; `None` when it does not exist.
    ///
    /// A 403 on a presumed-existing cold object is indistinguishable
    /// from "not yet restored" upstream, so both map to `None` and are
    /// left to operator review.
    pub async fn head(&self, region: &str, bucket: &str, key: &str) -> Result<Option<ObjectInfo>> {
        let result = self
            .client(region)
            .await
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(SdkError::ServiceError(context)) => {
                let status = context.raw().status().as_u16();
                if status == 404 || status == 403 {
                    return Ok(None);
                }
                return Err(WorkerError::object_store(format!(
                    "head s3://{}/{}: status {}",
                    bucket, key, status
                )));
            }
            Err(e) => {
                return Err(WorkerError::object_store(format!(
                    "head s3://{}/{}: {}",
                    bucket,
                    key,
                    display_sdk_error(&e)
                )))
            }
        };

        Ok(Some(ObjectInfo {
            size: output.content_length().unwrap_or(0),
            etag: output.e_tag().unwrap_or_default().trim_matches('"').to_string(),
            metadata: output
                .metadata()
                .map(|m| m.clone())
                .unwrap_or_default(),
            restore: output.restore().and_then(parse_restore_header),
        }))
    }

    /// Ask the cold tier to thaw an object into primary storage.
    pub async fn restore_cold_tier(
        &self,
        region: &str,
        bucket: &str,
        key: &str,
        retention_hours: u32,
    ) -> Result<RestoreOutcome> {
        let days = retention_hours.div_ceil(24).max(1) as i32;
        let job_parameters = GlacierJobParameters::builder()
            .tier(Tier::Standard)
            .build()
            .map_err(|e| WorkerError::object_store(format!("restore request: {}", e)))?;
        let request = RestoreRequest::builder()
            .days(days)
            .glacier_job_parameters(job_parameters)
            .build();

        let result = self
            .client(region)
            .await
            .restore_object()
            .bucket(bucket)
            .key(key)
            .restore_request(request)
            .send()
            .await;

        match result {
            Ok(_) => Ok(RestoreOutcome::Accepted),
            Err(e) => match error_code(&e).as_deref() {
                Some("RestoreAlreadyInProgress") => Ok(RestoreOutcome::AlreadyInProgress),
                // Not in the cold tier: the object is already readable.
                Some("InvalidObjectState") => Ok(RestoreOutcome::AlreadyRestored),
                _ => Err(WorkerError::RestoreRejected(format!(
                    "restore s3://{}/{}: {}",
                    bucket,
                    key,
                    display_sdk_error(&e)
                ))),
            },
        }
    }

    /// Keys under a prefix, up to `max_keys`.
    pub async fn list_keys(
        &self,
        region: &str,
        bucket: &str,
        prefix: &str,
        max_keys: Option<i32>,
    ) -> Result<Vec<String>> {
        let mut request = self
            .client(region)
            .await
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix);
        if let Some(max) = max_keys {
            request = request.max_keys(max);
        }
        let response = request.send().await.map_err(|e| {
            WorkerError::object_store(format!(
                "list s3://{}/{}: {}",
                bucket,
                prefix,
                display_sdk_error(&e)
            ))
        })?;
        Ok(response
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .collect())
    }

    /// Delete an object.
    pub async fn delete(&self, region: &str, bucket: &str, key: &str) -> Result<()> {
        self.client(region)
            .await
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                WorkerError::object_store(format!(
                    "delete s3://{}/{}: {}",
                    bucket,
                    key,
                    display_sdk_error(&e)
                ))
            })?;
        info!(bucket, key, "Deleted object");
        Ok(())
    }
}

/// The canonical metadata attached to every preserved file.
pub fn standard_metadata(
    institution: &str,
    bag: &str,
    bagpath: &str,
    md5: &str,
    sha256: &str,
) -> HashMap<String, String> {
    HashMap::from([
        ("institution".to_string(), institution.to_string()),
        ("bag".to_string(), bag.to_string()),
        ("bagpath".to_string(), bagpath.to_string()),
        ("md5".to_string(), md5.to_string()),
        ("sha256".to_string(), sha256.to_string()),
    ])
}

/// Decode the `x-amz-restore` header.
///
/// `ongoing-request="true"` means a thaw is running;
/// `ongoing-request="false", expiry-date="..."` means the thawed copy
/// is readable until the expiry date.
fn parse_restore_header(header: &str) -> Option<RestoreStatus> {
    if header.contains("ongoing-request=\"true\"") {
        return Some(RestoreStatus::InProgress);
    }
    if header.contains("ongoing-request=\"false\"") {
        let available_until = header
            .split("expiry-date=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .and_then(|date| DateTime::parse_from_rfc2822(date).ok())
            .map(|date| date.with_timezone(&Utc));
        return Some(RestoreStatus::Completed { available_until });
    }
    None
}

fn error_code<E, R>(error: &SdkError<E, R>) -> Option<String>
where
    E: aws_sdk_s3::error::ProvideErrorMetadata,
{
    match error {
        SdkError::ServiceError(context) => context.err().meta().code().map(str::to_string),
        _ => None,
    }
}

fn display_sdk_error<E, R>(error: &SdkError<E, R>) -> String
where
    E: std::fmt::Debug + aws_sdk_s3::error::ProvideErrorMetadata,
    R: std::fmt::Debug,
{
    match error {
        SdkError::ServiceError(context) => {
            let err = context.err();
            match (err.meta().code(), err.meta().message()) {
                (Some(code), Some(message)) => format!("{}: {}", code, message),
                (_, Some(message)) => message.to_string(),
                (Some(code), _) => code.to_string(),
                _ => format!("{:?}", err),
            }
        }
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_header_in_progress() {
        assert_eq!(
            parse_restore_header("ongoing-request=\"true\""),
            Some(RestoreStatus::InProgress)
        );
    }

    #[test]
    fn restore_header_completed_with_expiry() {
        let status = parse_restore_header(
            "ongoing-request=\"false\", expiry-date=\"Fri, 21 Dec 2012 00:00:00 GMT\"",
        )
        .unwrap();
        match status {
            RestoreStatus::Completed { available_until } => {
                let date = available_until.unwrap();
                assert_eq!(date.to_rfc3339(), "2012-12-21T00:00:00+00:00");
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[test]
    fn restore_header_garbage_is_none() {
        assert_eq!(parse_restore_header("who knows"), None);
    }

    #[test]
    fn standard_metadata_carries_canonical_keys() {
        let metadata = standard_metadata("example.edu", "example.edu/bag", "data/a.pdf", "m", "s");
        assert_eq!(metadata["institution"], "example.edu");
        assert_eq!(metadata["bagpath"], "data/a.pdf");
        assert_eq!(metadata.len(), 5);
    }

    #[test]
    fn url_for_with_and_without_endpoint() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::for_testing(tmp.path());
        let store = ObjectStore::new(&config);
        assert_eq!(
            store.url_for("us-east-1", "preservation", "some-uuid"),
            "https://preservation.s3.us-east-1.amazonaws.com/some-uuid"
        );

        config.s3_endpoint = Some("http://127.0.0.1:9000/".to_string());
        let store = ObjectStore::new(&config);
        assert_eq!(
            store.url_for("us-east-1", "preservation", "some-uuid"),
            "http://127.0.0.1:9000/preservation/some-uuid"
        );
    }
}
