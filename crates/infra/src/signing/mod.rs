//! Signing executor capability.

pub mod signtool;

use std::path::Path;

use async_trait::async_trait;

use signer_core::{SignerResult, SigningJob};

pub use signtool::SigntoolExecutor;

/// Per-job signing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningParams {
    pub cert_identity: String,
    pub timestamp_authority: String,
}

impl SigningParams {
    pub fn for_job(job: &SigningJob) -> Self {
        Self {
            cert_identity: job.cert_identity.clone(),
            timestamp_authority: job.timestamp_authority.clone(),
        }
    }
}

/// Signs and verifies local files in place.
///
/// Both calls return `SignerError::Signing` on failure.
#[async_trait]
pub trait SigningExecutor: Send + Sync {
    async fn sign(&self, path: &Path, params: &SigningParams) -> SignerResult<()>;

    async fn verify(&self, path: &Path) -> SignerResult<()>;
}
