use super::{ObjectStorage, ProgressFn};
use crate::config::LandShapeConfig;
use crate::error::LandShapeError;
use crate::types::{ObjectEntry, TransferProgress};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Region, SharedCredentialsProvider};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use std::path::Path;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::AsyncReadExt;

/// Region used when an endpoint override is configured and nothing else provides one.
const FALLBACK_REGION: &str = "us-east-1";

/// Storage backend for Amazon S3 and S3-compatible services.
///
/// Files up to `part_size` bytes are stored with a single `PutObject`; larger files
/// go through a multipart upload so progress is reported after every part.
#[derive(Clone, Debug)]
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
    url_expiry: Duration,
    part_size: u64,
}

impl S3Storage {
    /// Connects using the AWS default configuration chain with overrides from `config`.
    ///
    /// Static credentials replace the default credential chain, and an endpoint override
    /// switches to path-style addressing for MinIO and similar services.
    ///
    /// # Errors
    ///
    /// - `LandShapeError::MissingBucket` if the bucket name is empty.
    pub async fn connect(config: &LandShapeConfig) -> Result<Self, LandShapeError> {
        if config.bucket.is_empty() {
            return Err(LandShapeError::MissingBucket);
        }

        let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);

        if let Some(region) = &config.region {
            builder = builder.region(Region::new(region.clone()));
        }

        if let Some(credentials) = &config.credentials {
            let credentials = Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                None,
                None,
                "LandShapeStaticCredentials",
            );
            builder = builder.credentials_provider(SharedCredentialsProvider::new(credentials));
        }

        if let Some(endpoint_url) = &config.endpoint_url {
            if config.region.is_none() && shared.region().is_none() {
                builder = builder.region(Region::new(FALLBACK_REGION));
            }
            builder = builder.endpoint_url(endpoint_url).force_path_style(true);
        }

        Ok(Self::from_conf(builder.build(), config))
    }

    /// Wraps an already built S3 client configuration.
    pub fn from_conf(s3_config: aws_sdk_s3::Config, config: &LandShapeConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            url_expiry: config.url_expiry,
            part_size: config.part_size.max(1),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_single(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
        total: u64,
        progress: ProgressFn<'_>,
    ) -> Result<(), LandShapeError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| LandShapeError::storage("upload", e))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| LandShapeError::storage("upload", DisplayErrorContext(e)))?;

        progress(TransferProgress {
            bytes_transferred: total,
            bytes_total: total,
        });
        Ok(())
    }

    async fn put_multipart(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
        total: u64,
        progress: ProgressFn<'_>,
    ) -> Result<(), LandShapeError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| LandShapeError::storage("upload", DisplayErrorContext(e)))?;

        let Some(upload_id) = created.upload_id().map(str::to_string) else {
            return Err(LandShapeError::storage(
                "upload",
                "multipart upload was created without an upload id",
            ));
        };
        tracing::debug!(key = %key, upload_id = %upload_id, "Multipart upload started");

        let parts = match self.upload_parts(key, &upload_id, path, total, progress).await {
            Ok(parts) => parts,
            Err(err) => {
                self.abort_multipart(key, &upload_id).await;
                return Err(err);
            }
        };

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        if let Err(e) = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(completed)
            .send()
            .await
        {
            self.abort_multipart(key, &upload_id).await;
            return Err(LandShapeError::storage("upload", DisplayErrorContext(e)));
        }

        Ok(())
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        path: &Path,
        total: u64,
        progress: ProgressFn<'_>,
    ) -> Result<Vec<CompletedPart>, LandShapeError> {
        let mut file = File::open(path).await?;
        let mut parts = Vec::new();
        let mut sent = 0u64;
        let mut part_number = 1;

        loop {
            let mut chunk = Vec::with_capacity(self.part_size.min(total) as usize);
            let read = (&mut file).take(self.part_size).read_to_end(&mut chunk).await?;
            if read == 0 {
                break;
            }

            let output = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .map_err(|e| LandShapeError::storage("upload", DisplayErrorContext(e)))?;

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(output.e_tag().map(str::to_string))
                    .set_checksum_crc32(output.checksum_crc32().map(str::to_string))
                    .build(),
            );

            sent += read as u64;
            progress(TransferProgress {
                bytes_transferred: sent.min(total),
                bytes_total: total,
            });
            part_number += 1;
        }

        Ok(parts)
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            tracing::warn!(
                key = %key,
                upload_id = %upload_id,
                error = %DisplayErrorContext(e),
                "Failed to abort multipart upload"
            );
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_resumable(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
        progress: ProgressFn<'_>,
    ) -> Result<(), LandShapeError> {
        let total = fs::metadata(path).await?.len();
        let start = std::time::Instant::now();

        if total <= self.part_size {
            self.put_single(key, path, content_type, total, progress).await?;
        } else {
            self.put_multipart(key, path, content_type, total, progress).await?;
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = total,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, LandShapeError> {
        let mut entries = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .delimiter("/")
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| LandShapeError::storage("list", DisplayErrorContext(e)))?;

            for object in output.contents() {
                if let Some(key) = object.key() {
                    entries.push(ObjectEntry {
                        key: key.to_string(),
                        size: object.size().and_then(|size| u64::try_from(size).ok()),
                    });
                }
            }

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        tracing::debug!(bucket = %self.bucket, prefix = %prefix, count = entries.len(), "Listed objects");
        Ok(entries)
    }

    async fn exists(&self, key: &str) -> Result<bool, LandShapeError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|err| err.is_not_found()) => Ok(false),
            Err(e) => Err(LandShapeError::storage("head", DisplayErrorContext(e))),
        }
    }

    async fn download_url(&self, key: &str) -> Result<String, LandShapeError> {
        let presigning = PresigningConfig::expires_in(self.url_expiry)
            .map_err(|e| LandShapeError::storage("presign", e))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| LandShapeError::storage("presign", DisplayErrorContext(e)))?;

        Ok(request.uri().to_string())
    }
}
