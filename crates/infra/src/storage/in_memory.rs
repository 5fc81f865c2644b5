//! In-memory object store for tests/dev.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use signer_core::{JobOutcome, STATUS_OBJECT_NAME, SignerError, SignerResult, StatusRecord};

use super::{ObjectStore, commit_partial, ensure_parent, partial_path};

/// Map-backed store with failure injection.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    failing_downloads: RwLock<HashSet<String>>,
    failing_uploads: RwLock<HashSet<String>>,
    fail_status: RwLock<bool>,
    status_writes: AtomicUsize,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.objects.write().unwrap().insert(key.into(), bytes.into());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.read().unwrap().keys().cloned().collect()
    }

    /// Decoded status object under `prefix`, if one was written.
    pub fn status(&self, prefix: &str) -> Option<StatusRecord> {
        self.get(&format!("{prefix}{STATUS_OBJECT_NAME}"))
            .and_then(|bytes| StatusRecord::from_json(&bytes).ok())
    }

    /// Number of successful `put_status` calls so far.
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    pub fn fail_download(&self, key: impl Into<String>) {
        self.failing_downloads.write().unwrap().insert(key.into());
    }

    pub fn fail_upload(&self, key: impl Into<String>) {
        self.failing_uploads.write().unwrap().insert(key.into());
    }

    pub fn fail_status_writes(&self, fail: bool) {
        *self.fail_status.write().unwrap() = fail;
    }

    pub fn clear_failures(&self) {
        self.failing_downloads.write().unwrap().clear();
        self.failing_uploads.write().unwrap().clear();
        *self.fail_status.write().unwrap() = false;
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn download(&self, key: &str, dest: &Path) -> SignerResult<PathBuf> {
        if self.failing_downloads.read().unwrap().contains(key) {
            return Err(SignerError::transport(format!("download {key}: injected failure")));
        }
        let bytes = self
            .get(key)
            .ok_or_else(|| SignerError::transport(format!("download {key}: NoSuchKey")))?;

        ensure_parent(dest).await?;
        let partial = partial_path(dest);
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|e| SignerError::transport(format!("write {}: {e}", partial.display())))?;
        commit_partial(&partial, dest).await?;
        Ok(dest.to_path_buf())
    }

    async fn upload(&self, src: &Path, key: &str) -> SignerResult<()> {
        if self.failing_uploads.read().unwrap().contains(key) {
            return Err(SignerError::transport(format!("upload {key}: injected failure")));
        }
        let bytes = tokio::fs::read(src)
            .await
            .map_err(|e| SignerError::transport(format!("read {}: {e}", src.display())))?;
        self.insert(key, bytes);
        Ok(())
    }

    async fn put_status(&self, prefix: &str, outcome: &JobOutcome) -> SignerResult<()> {
        if *self.fail_status.read().unwrap() {
            return Err(SignerError::transport("write status: injected failure"));
        }
        let body = outcome
            .to_status_record()
            .to_json_pretty()
            .map_err(|e| SignerError::transport(format!("encode status: {e}")))?;
        self.insert(format!("{prefix}{STATUS_OBJECT_NAME}"), body.into_bytes());
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
