//! S3 object store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

use signer_core::{JobOutcome, STATUS_OBJECT_NAME, SignerError, SignerResult};

use super::{ObjectStore, commit_partial, ensure_parent, partial_path};

/// Object store backed by a single S3 bucket.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self), fields(bucket = %self.bucket), err)]
    async fn download(&self, key: &str, dest: &Path) -> SignerResult<PathBuf> {
        ensure_parent(dest).await?;
        info!(dest = %dest.display(), "downloading {}", self.location(key));

        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                SignerError::transport(format!(
                    "download {}: {}",
                    self.location(key),
                    DisplayErrorContext(&e)
                ))
            })?;

        let partial = partial_path(dest);
        let io_err = |e: std::io::Error| {
            SignerError::transport(format!("write {}: {e}", partial.display()))
        };
        let mut file = tokio::fs::File::create(&partial).await.map_err(io_err)?;
        let mut body = object.body.into_async_read();
        let bytes = tokio::io::copy(&mut body, &mut file).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        drop(file);
        commit_partial(&partial, dest).await?;

        info!(bytes, "downloaded {}", self.location(key));
        Ok(dest.to_path_buf())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket), err)]
    async fn upload(&self, src: &Path, key: &str) -> SignerResult<()> {
        let body = ByteStream::from_path(src).await.map_err(|e| {
            SignerError::transport(format!("read {}: {e}", src.display()))
        })?;
        let size = body.size_hint().0;
        info!(size, "uploading {} -> {}", src.display(), self.location(key));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                SignerError::transport(format!(
                    "upload {}: {}",
                    self.location(key),
                    DisplayErrorContext(&e)
                ))
            })?;

        info!("upload complete: {}", self.location(key));
        Ok(())
    }

    #[instrument(skip(self, outcome), fields(bucket = %self.bucket, run_id = %outcome.run_id), err)]
    async fn put_status(&self, prefix: &str, outcome: &JobOutcome) -> SignerResult<()> {
        let key = format!("{prefix}{STATUS_OBJECT_NAME}");
        let body = outcome
            .to_status_record()
            .to_json_pretty()
            .map_err(|e| SignerError::transport(format!("encode status: {e}")))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("application/json")
            .body(ByteStream::from(body.into_bytes()))
            .send()
            .await
            .map_err(|e| {
                SignerError::transport(format!(
                    "write status {}: {}",
                    self.location(&key),
                    DisplayErrorContext(&e)
                ))
            })?;

        info!(success = outcome.success, "status uploaded: {}", self.location(&key));
        Ok(())
    }
}
