//! Object Store Adapter.
//!
//! A single `ObjectStore` trait sits between the rest of the system and
//! whichever bucket actually holds originals and outputs, mirroring the
//! way `luster-common`/`luster-auth` wrap sqlx rather than let every
//! caller hold a raw pool. Grounded on
//! `original_source/services/api/s3_client.py`'s `R2Client`: presigned
//! POST for uploads (with `content-length-range` + `Content-Type`
//! conditions so the cap is enforced by the store, not just the API),
//! presigned GET for downloads, `head_object`-based existence checks, and
//! thin `get`/`put`/`delete` for worker-side I/O.

pub mod keys;
mod presign_post;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use luster_common::{Error, Result};
use std::collections::HashMap;
use std::time::Duration;

/// A presigned upload: a client POSTs the file directly to `url` with
/// `fields` as the multipart form fields (in the order S3 expects, with
/// the file itself last).
#[derive(Debug, Clone, serde::Serialize)]
pub struct PresignedUpload {
    pub url: String,
    pub fields: HashMap<String, String>,
    pub expires_at: DateTime<Utc>,
}

/// A presigned download: a client issues a plain `GET` against `url`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PresignedDownload {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Object storage over opaque keys, used both by the API (presigned
/// upload/download) and the worker (direct get/put/delete).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Issue a presigned POST that only accepts `content_type` and no more
    /// than `max_bytes`.
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        max_bytes: i64,
        ttl: Duration,
    ) -> Result<PresignedUpload>;

    /// Issue a presigned GET, optionally forcing a download filename via
    /// `Content-Disposition`.
    async fn presign_download(
        &self,
        key: &str,
        ttl: Duration,
        suggested_filename: Option<&str>,
    ) -> Result<PresignedDownload>;

    /// Whether an object exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Fetch an object's full contents.
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Write an object's full contents.
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()>;

    /// Delete an object. Deleting a key that doesn't exist is not an error
    /// (S3's own `DeleteObject` semantics).
    async fn delete(&self, key: &str) -> Result<()>;
}

/// `aws-sdk-s3`-backed implementation, usable against S3 itself or any
/// S3-compatible endpoint (R2, MinIO) by overriding `endpoint_url` on the
/// client config the caller builds.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    region: String,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, region: String) -> Self {
        Self { client, bucket, region }
    }

    /// Build from the ambient AWS config (env vars / instance profile /
    /// shared credentials file), the way the teacher's comfyui crate
    /// constructs its own S3 client.
    pub async fn from_env(bucket: String, region: String) -> Self {
        let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.clone()))
            .load()
            .await;
        let client = aws_sdk_s3::Client::new(&shared_config);
        Self::new(client, bucket, region)
    }

    async fn credentials(&self) -> Result<aws_credential_types::Credentials> {
        use aws_credential_types::provider::ProvideCredentials;
        self.client
            .config()
            .credentials_provider()
            .ok_or_else(|| Error::Internal("no AWS credentials provider configured".to_string()))?
            .provide_credentials()
            .await
            .map_err(|e| Error::Internal(format!("failed to resolve AWS credentials: {e}")))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        max_bytes: i64,
        ttl: Duration,
    ) -> Result<PresignedUpload> {
        let creds = self.credentials().await?;
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(1));

        let fields = presign_post::sign(presign_post::PostPolicyInputs {
            bucket: &self.bucket,
            key,
            region: &self.region,
            content_type,
            max_bytes,
            access_key_id: creds.access_key_id(),
            secret_access_key: creds.secret_access_key(),
            session_token: creds.session_token(),
            now,
            expires_at,
        });

        let url = format!("https://{}.s3.{}.amazonaws.com/", self.bucket, self.region);
        Ok(PresignedUpload { url, fields, expires_at })
    }

    async fn presign_download(
        &self,
        key: &str,
        ttl: Duration,
        suggested_filename: Option<&str>,
    ) -> Result<PresignedDownload> {
        let presign_config = PresigningConfig::expires_in(ttl)
            .map_err(|e| Error::Internal(format!("invalid presign TTL: {e}")))?;

        let mut request = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(filename) = suggested_filename {
            request = request
                .response_content_disposition(format!("attachment; filename=\"{filename}\""));
        }

        let presigned = request
            .presigned(presign_config)
            .await
            .map_err(|e| Error::Internal(format!("failed to presign download: {e}")))?;

        Ok(PresignedDownload {
            url: presigned.uri().to_string(),
            expires_at: Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(1)),
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false)
                {
                    Ok(false)
                } else {
                    Err(Error::Internal(format!("head_object failed for {key}: {err}")))
                }
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("get_object failed for {key}: {e}")))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| Error::Internal(format!("failed to read object body for {key}: {e}")))?
            .into_bytes();

        Ok(bytes)
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body.into())
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("put_object failed for {key}: {e}")))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("delete_object failed for {key}: {e}")))?;
        Ok(())
    }
}

/// In-memory store for tests and local development without AWS
/// credentials. Presigned URLs are not truly HTTP-servable here; they
/// exist so handlers and worker code can run end-to-end against this
/// fake without special-casing it.
pub struct InMemoryObjectStore {
    objects: tokio::sync::RwLock<HashMap<String, (Bytes, String)>>,
    base_url: String,
}

impl InMemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            objects: tokio::sync::RwLock::new(HashMap::new()),
            base_url: base_url.into(),
        }
    }

    /// Test helper: seed an object without going through a presigned
    /// upload.
    pub async fn seed(&self, key: &str, body: Bytes, content_type: &str) {
        self.objects
            .write()
            .await
            .insert(key.to_string(), (body, content_type.to_string()));
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new("https://objects.test.invalid")
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        _max_bytes: i64,
        ttl: Duration,
    ) -> Result<PresignedUpload> {
        let mut fields = HashMap::new();
        fields.insert("key".to_string(), key.to_string());
        fields.insert("Content-Type".to_string(), content_type.to_string());
        Ok(PresignedUpload {
            url: format!("{}/{}", self.base_url, key),
            fields,
            expires_at: Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(1)),
        })
    }

    async fn presign_download(
        &self,
        key: &str,
        ttl: Duration,
        _suggested_filename: Option<&str>,
    ) -> Result<PresignedDownload> {
        Ok(PresignedDownload {
            url: format!("{}/{}", self.base_url, key),
            expires_at: Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(1)),
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| Error::NotFound(format!("no object at key {key}")))
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.objects
            .write()
            .await
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}
