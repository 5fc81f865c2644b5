//! `signtool.exe` executor.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, instrument};

use signer_core::{SignerError, SignerResult};

use super::{SigningExecutor, SigningParams};

pub const SIGN_TIMEOUT: Duration = Duration::from_secs(120);
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the Windows SDK installs versioned tool directories.
pub const WINDOWS_KITS_BIN: &str = r"C:\Program Files (x86)\Windows Kits\10\bin";

#[derive(Debug, Clone)]
pub struct SigntoolExecutor {
    /// Explicit tool path; discovered lazily under the SDK root when unset.
    path: Option<PathBuf>,
    sdk_root: PathBuf,
    description: String,
}

impl SigntoolExecutor {
    pub fn new(path: Option<PathBuf>, description: impl Into<String>) -> Self {
        Self {
            path,
            sdk_root: PathBuf::from(WINDOWS_KITS_BIN),
            description: description.into(),
        }
    }

    pub fn with_sdk_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sdk_root = root.into();
        self
    }

    fn tool(&self) -> SignerResult<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        discover_signtool(&self.sdk_root).ok_or_else(|| {
            SignerError::signing(format!(
                "signtool.exe not found under {}",
                self.sdk_root.display()
            ))
        })
    }

    async fn run(&self, args: Vec<OsString>, timeout: Duration, what: &str) -> SignerResult<()> {
        let tool = self.tool()?;
        let child = Command::new(&tool)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, child)
            .await
            .map_err(|_| SignerError::signing(format!("signtool {what} timed out after {timeout:?}")))?
            .map_err(|e| SignerError::signing(format!("run {}: {e}", tool.display())))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        Err(SignerError::signing(format!("signtool {what} failed: {detail}")))
    }
}

/// Highest-versioned `<a.b.c.d>/x64/signtool.exe` under `root`.
pub fn discover_signtool(root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(root).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            let version = parse_sdk_version(&name)?;
            let tool = entry.path().join("x64").join("signtool.exe");
            tool.is_file().then_some((version, tool))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, tool)| tool)
}

fn parse_sdk_version(name: &str) -> Option<Vec<u32>> {
    let parts = name
        .split('.')
        .map(|p| p.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    (parts.len() == 4).then_some(parts)
}

pub fn sign_args(path: &Path, params: &SigningParams, description: &str) -> Vec<OsString> {
    vec![
        "sign".into(),
        "/fd".into(),
        "SHA256".into(),
        "/tr".into(),
        params.timestamp_authority.clone().into(),
        "/td".into(),
        "SHA256".into(),
        "/n".into(),
        params.cert_identity.clone().into(),
        "/d".into(),
        description.into(),
        path.as_os_str().to_os_string(),
    ]
}

pub fn verify_args(path: &Path) -> Vec<OsString> {
    vec!["verify".into(), "/pa".into(), path.as_os_str().to_os_string()]
}

#[async_trait]
impl SigningExecutor for SigntoolExecutor {
    #[instrument(skip(self, params), fields(cert = %params.cert_identity), err)]
    async fn sign(&self, path: &Path, params: &SigningParams) -> SignerResult<()> {
        self.run(sign_args(path, params, &self.description), SIGN_TIMEOUT, "sign")
            .await?;
        info!(file = %path.display(), "signed");
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn verify(&self, path: &Path) -> SignerResult<()> {
        self.run(verify_args(path), VERIFY_TIMEOUT, "verify").await?;
        info!(file = %path.display(), "signature verified");
        Ok(())
    }
}
