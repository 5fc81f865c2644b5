//! Object storage capability.
//!
//! ## Contract
//!
//! - `download` materialises a remote object at a local path, creating parent
//!   directories first. The final path only ever holds a complete file.
//! - `upload` overwrites the destination key (idempotent across retries).
//! - `put_status` writes `<prefix>status.json`.
//!
//! Calls fail fast; retry policy belongs to the job processor, not here.

pub mod in_memory;
pub mod s3;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use signer_core::{JobOutcome, SignerError, SignerResult};

pub use in_memory::InMemoryObjectStore;
pub use s3::S3ObjectStore;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch `key` into `dest`; returns the path written.
    async fn download(&self, key: &str, dest: &Path) -> SignerResult<PathBuf>;

    /// Store the local file at `key`, replacing any previous object.
    async fn upload(&self, src: &Path, key: &str) -> SignerResult<()>;

    /// Persist the status object for a job under `prefix`.
    async fn put_status(&self, prefix: &str, outcome: &JobOutcome) -> SignerResult<()>;
}

/// Sibling path that receives bytes before the final rename.
pub(crate) fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    dest.with_file_name(name)
}

pub(crate) async fn ensure_parent(dest: &Path) -> SignerResult<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            SignerError::transport(format!("create directory {}: {e}", parent.display()))
        })?;
    }
    Ok(())
}

pub(crate) async fn commit_partial(partial: &Path, dest: &Path) -> SignerResult<()> {
    tokio::fs::rename(partial, dest).await.map_err(|e| {
        SignerError::transport(format!("finalise {}: {e}", dest.display()))
    })
}
