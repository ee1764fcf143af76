//! Object storage client for uploaded files.
//!
//! Files land under `{folder}/{uuid}.{ext}` with a public-read ACL and
//! are served from a public base URL, so only the key needs storing.

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::ApiError;

/// Client for the upload bucket.
#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl Storage {
    /// Create a client from ambient AWS credentials, honoring an
    /// endpoint override for S3-compatible providers.
    pub async fn new(settings: &Settings) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(endpoint) = &settings.s3_endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;
        let client = Client::new(&config);

        tracing::info!(bucket = %settings.s3_bucket, "Object storage client initialized");

        Ok(Self {
            client,
            bucket: settings.s3_bucket.clone(),
            public_base_url: settings.s3_public_base_url.clone(),
        })
    }

    /// Upload bytes under `folder`, keyed by a fresh UUID plus the
    /// original extension. Transient failures are retried with
    /// exponential backoff; persistent failure surfaces as a generic
    /// upload error per the upload contract.
    pub async fn upload(
        &self,
        folder: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ApiError> {
        let key = generate_key(folder, file_name);
        let content_type = content_type_for(file_name);

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_elapsed_time(Some(Duration::from_secs(8)))
            .build();

        let key_ref = &key;
        backoff::future::retry(policy, || {
            let body = ByteStream::from(bytes.clone());
            async move {
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(key_ref.as_str())
                    .body(body)
                    .content_type(content_type)
                    .acl(ObjectCannedAcl::PublicRead)
                    .send()
                    .await
                    .map_err(|e| {
                        tracing::warn!(error = %e, key = %key_ref, "S3 put failed, retrying");
                        backoff::Error::transient(e)
                    })
            }
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, key = %key, bucket = %self.bucket, "S3 upload failed");
            ApiError::bad_request("Failed to store uploaded file")
        })?;

        tracing::debug!(key = %key, size = bytes.len(), "File uploaded");
        Ok(self.public_url(&key))
    }

    /// Public URI for a stored key.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Probe bucket reachability.
    pub async fn health_check(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .context("Upload bucket unreachable")?;
        Ok(())
    }
}

/// Storage key for an upload: folder, fresh UUID, original extension.
pub fn generate_key(folder: &str, file_name: &str) -> String {
    format!("{}/{}.{}", folder, Uuid::new_v4(), file_extension(file_name))
}

/// Lowercased extension of the original name, `bin` when absent.
pub fn file_extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "bin".to_string())
}

/// MIME type by extension; photo formats the field app produces, plus
/// PDF for signed documents.
pub fn content_type_for(file_name: &str) -> &'static str {
    match file_extension(file_name).as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_falls_back_to_bin() {
        assert_eq!(file_extension("photo.PNG"), "png");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("no-extension"), "bin");
        assert_eq!(file_extension("trailing-dot."), "bin");
    }

    #[test]
    fn content_types_cover_field_app_formats() {
        assert_eq!(content_type_for("a.jpg"), "image/jpeg");
        assert_eq!(content_type_for("a.JPEG"), "image/jpeg");
        assert_eq!(content_type_for("act.pdf"), "application/pdf");
        assert_eq!(content_type_for("a.xyz"), "application/octet-stream");
    }

    #[test]
    fn keys_embed_folder_uuid_and_extension() {
        let key = generate_key("objects/photos", "evidence.webp");
        let rest = key.strip_prefix("objects/photos/").unwrap();
        let (stem, ext) = rest.rsplit_once('.').unwrap();
        assert_eq!(ext, "webp");
        assert!(Uuid::parse_str(stem).is_ok());
    }
}
