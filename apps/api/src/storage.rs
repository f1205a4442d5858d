//! # Object Storage
//!
//! Product and user images live in an S3-compatible bucket (MinIO in
//! development). The desktop client never sends file bytes through the
//! API: it asks for a presigned PUT URL, uploads straight to the bucket
//! under the temp area, and then sends the returned key with the entity.
//!
//! ## Key Layout
//! ```text
//! uploads/temp/products/20250114/3f9c0a1b7d2e.png   ← presigned upload
//!         │
//!         │  entity saved → move_from_temp()
//!         ▼
//! uploads/products/20250114/3f9c0a1b7d2e.png        ← permanent
//! ```
//!
//! Anything left under `uploads/temp/` is swept by the cleanup task.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use forex_core::validation::validate_image_file_name;
use forex_core::ValidationError;

use crate::config::StorageConfig;

/// Folder (under the prefix) holding uploads not yet attached to an entity.
pub const TEMP_FOLDER: &str = "temp";

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{0}")]
    InvalidFile(#[from] ValidationError),

    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("Invalid folder: {0}")]
    InvalidFolder(String),

    #[error("Failed to presign upload: {0}")]
    Presign(String),

    #[error("Storage request failed: {0}")]
    Request(String),
}

/// Presigned upload handed to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrl {
    pub url: String,
    pub key: String,
    pub expires_at: DateTime<Utc>,
}

/// Object storage used by the services.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Presigned PUT URL for a new object under `temp/{folder}`.
    async fn upload_url(&self, folder: &str, file_name: &str) -> Result<UploadUrl, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Moves a temp upload to its permanent key (`/temp/` dropped from the
    /// path). Keys outside the temp area come back unchanged. `None` when
    /// the copy fails.
    async fn move_from_temp(&self, key: &str) -> Option<String>;

    /// Deletes objects under `{prefix}/{folder}` older than `max_age`.
    async fn cleanup_expired(&self, folder: &str, max_age: Duration)
        -> Result<usize, StorageError>;

    /// URL clients can fetch the object from.
    fn public_url(&self, key: &str) -> String;
}

// =============================================================================
// Key helpers
// =============================================================================

/// Checks an upload request before any URL is signed.
pub fn validate_upload(file_name: &str, size: Option<u64>, max: u64) -> Result<String, StorageError> {
    let ext = validate_image_file_name(file_name)?;
    if let Some(size) = size {
        if size > max {
            return Err(StorageError::TooLarge { size, max });
        }
    }
    Ok(ext)
}

fn validate_folder(folder: &str) -> Result<(), StorageError> {
    let valid = !folder.is_empty()
        && folder
            .split('/')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidFolder(folder.to_string()))
    }
}

/// `{prefix}/temp/{folder}/{yyyyMMdd}/{12 hex}{ext}`
pub fn temp_object_key(prefix: &str, folder: &str, file_name: &str) -> Result<String, StorageError> {
    validate_folder(folder)?;
    let ext = validate_image_file_name(file_name)?;
    let date = Utc::now().format("%Y%m%d");
    let id = Uuid::new_v4().simple().to_string();
    Ok(format!(
        "{}/{}/{}/{}/{}{}",
        prefix,
        TEMP_FOLDER,
        folder,
        date,
        &id[..12],
        ext
    ))
}

/// Permanent key for a temp key.
pub fn permanent_key(key: &str) -> String {
    key.replace("/temp/", "/")
}

fn public_object_url(base: &str, bucket: &str, key: &str) -> String {
    if key.trim().is_empty() {
        return String::new();
    }
    if key.starts_with("http://") || key.starts_with("https://") {
        return key.to_string();
    }
    format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        bucket,
        key.trim_start_matches('/')
    )
}

// =============================================================================
// S3 implementation
// =============================================================================

/// S3 / MinIO storage.
///
/// Two clients share the credentials: `client` talks to the internal
/// endpoint, `presign_client` signs URLs for the public endpoint so the
/// signature matches the host the desktop client uploads to.
pub struct S3FileStorage {
    client: Client,
    presign_client: Client,
    bucket: String,
    prefix: String,
    public_base: String,
    upload_expiry: Duration,
}

impl S3FileStorage {
    pub fn new(config: &StorageConfig) -> Self {
        let public_endpoint = config.public_endpoint();
        S3FileStorage {
            client: build_client(config, &config.endpoint),
            presign_client: build_client(config, &public_endpoint),
            bucket: config.bucket.clone(),
            prefix: config.prefix.trim_end_matches('/').to_string(),
            public_base: config.endpoint_url(&public_endpoint),
            upload_expiry: config.upload_url_expiry(),
        }
    }

    /// Creates the bucket when missing; a new bucket gets an anonymous
    /// read policy when `public_read` is set.
    pub async fn ensure_bucket(&self, region: &str, public_read: bool) -> Result<(), StorageError> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            debug!(bucket = %self.bucket, "Bucket exists");
            return Ok(());
        }

        let mut create = self.client.create_bucket().bucket(&self.bucket);
        if region != "us-east-1" {
            create = create.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        create.send().await.map_err(request_error)?;
        info!(bucket = %self.bucket, "Bucket created");

        if public_read {
            let policy = serde_json::json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "AWS": "*" },
                    "Action": ["s3:GetObject"],
                    "Resource": [format!("arn:aws:s3:::{}/*", self.bucket)]
                }]
            });
            self.client
                .put_bucket_policy()
                .bucket(&self.bucket)
                .policy(policy.to_string())
                .send()
                .await
                .map_err(request_error)?;
            info!(bucket = %self.bucket, "Public read policy applied");
        }
        Ok(())
    }
}

fn build_client(config: &StorageConfig, endpoint: &str) -> Client {
    let credentials = Credentials::new(
        config.access_key.clone(),
        config.secret_key.clone(),
        None,
        None,
        "forex-config",
    );
    let s3_config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .endpoint_url(config.endpoint_url(endpoint))
        .credentials_provider(credentials)
        .force_path_style(true)
        .build();
    Client::from_conf(s3_config)
}

fn request_error<E: std::error::Error>(e: E) -> StorageError {
    StorageError::Request(DisplayErrorContext(&e).to_string())
}

#[async_trait]
impl FileStorage for S3FileStorage {
    async fn upload_url(&self, folder: &str, file_name: &str) -> Result<UploadUrl, StorageError> {
        let key = temp_object_key(&self.prefix, folder, file_name)?;
        let presigning = PresigningConfig::expires_in(self.upload_expiry)
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        let presigned = self
            .presign_client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(DisplayErrorContext(&e).to_string()))?;

        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.upload_expiry).unwrap_or(chrono::Duration::hours(1));

        debug!(key = %key, "Presigned upload URL issued");
        Ok(UploadUrl {
            url: presigned.uri().to_string(),
            key,
            expires_at,
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) => {
                Ok(false)
            }
            Err(e) => Err(request_error(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(request_error)?;
        debug!(key = %key, "Object deleted");
        Ok(())
    }

    async fn move_from_temp(&self, key: &str) -> Option<String> {
        let destination = permanent_key(key);
        if destination == key {
            return Some(destination);
        }

        let copied = self
            .client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, key))
            .key(&destination)
            .send()
            .await;
        if let Err(e) = copied {
            warn!(key = %key, error = %DisplayErrorContext(&e), "Failed to move upload out of temp");
            return None;
        }

        if let Err(e) = self.delete(key).await {
            // The copy exists; the temp original is left to the sweep
            warn!(key = %key, error = %e, "Failed to delete temp original");
        }
        Some(destination)
    }

    async fn cleanup_expired(
        &self,
        folder: &str,
        max_age: Duration,
    ) -> Result<usize, StorageError> {
        let prefix = format!("{}/{}/", self.prefix, folder.trim_matches('/'));
        let cutoff = Utc::now().timestamp() - max_age.as_secs() as i64;
        let mut deleted = 0;
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(request_error)?;

            for object in output.contents() {
                let (Some(key), Some(modified)) = (object.key(), object.last_modified()) else {
                    continue;
                };
                if modified.secs() < cutoff {
                    self.delete(key).await?;
                    deleted += 1;
                }
            }

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(deleted)
    }

    fn public_url(&self, key: &str) -> String {
        public_object_url(&self.public_base, &self.bucket, key)
    }
}

// =============================================================================
// In-memory implementation (tests)
// =============================================================================

/// Keeps object keys and their upload times in memory.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
    objects: std::sync::Mutex<std::collections::HashMap<String, DateTime<Utc>>>,
}

#[cfg(test)]
impl MemoryStorage {
    pub const BASE_URL: &'static str = "http://files.test";

    /// Stores an object uploaded `age` ago.
    pub fn put(&self, key: &str, age: Duration) {
        let uploaded = Utc::now() - chrono::Duration::from_std(age).unwrap_or(chrono::Duration::zero());
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), uploaded);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl FileStorage for MemoryStorage {
    async fn upload_url(&self, folder: &str, file_name: &str) -> Result<UploadUrl, StorageError> {
        let key = temp_object_key("uploads", folder, file_name)?;
        Ok(UploadUrl {
            url: format!("{}/forex/{}?signature=test", Self::BASE_URL, key),
            key,
            expires_at: Utc::now() + chrono::Duration::hours(1),
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.contains(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn move_from_temp(&self, key: &str) -> Option<String> {
        let destination = permanent_key(key);
        let mut objects = self.objects.lock().unwrap();
        if destination != key {
            let uploaded = objects.remove(key)?;
            objects.insert(destination.clone(), uploaded);
        }
        Some(destination)
    }

    async fn cleanup_expired(
        &self,
        folder: &str,
        max_age: Duration,
    ) -> Result<usize, StorageError> {
        let prefix = format!("uploads/{}/", folder);
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::zero());
        let mut objects = self.objects.lock().unwrap();
        let before = objects.len();
        objects.retain(|key, uploaded| !(key.starts_with(&prefix) && *uploaded < cutoff));
        Ok(before - objects.len())
    }

    fn public_url(&self, key: &str) -> String {
        public_object_url(Self::BASE_URL, "forex", key)
    }
}
