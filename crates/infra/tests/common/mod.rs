//! Shared fakes for the worker integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use signer_core::{
    Credentials, DeliveryHandle, JobDefaults, JobMessage, JobOutcome, RetryPolicy, SessionProbe,
    SessionStatus, SignerError, SignerResult, SigningJob, StatusEvent, WindowHint,
};
use signer_events::{EventBus, InMemoryEventBus, Subscription};
use signer_infra::queue::{Delivery, InMemoryQueue, JobQueue};
use signer_infra::storage::InMemoryObjectStore;
use signer_infra::{
    AuthSession, JobProcessor, JobProcessorConfig, ObjectStore, SessionDriver, SigningExecutor,
    SigningParams,
};

pub const UNSIGNED: &[u8] = b"MZ-unsigned";
pub const SIGNATURE: &[u8] = b"|signed";

pub type Events = Arc<InMemoryEventBus<StatusEvent>>;

pub fn job(run_id: &str, files: &[&str]) -> SigningJob {
    let message = JobMessage {
        run_id: Some(run_id.to_string()),
        s3_prefix: Some(format!("signing/pending/{run_id}/")),
        files: Some(files.iter().map(|f| f.to_string()).collect()),
        cert_name: None,
        timestamp_url: None,
        completed_prefix: Some(format!("signing/completed/{run_id}/")),
    };
    SigningJob::from_message(message, &defaults())
}

pub fn defaults() -> JobDefaults {
    JobDefaults {
        cert_identity: "Wordgate LLC".into(),
        timestamp_authority: "http://timestamp.sectigo.com".into(),
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        totp_uri: "otpauth://totp/Certum:me?secret=JBSWY3DPEHPK3PXP".into(),
        username: "me@example.com".into(),
    }
}

pub fn signed(bytes: &[u8]) -> Vec<u8> {
    [bytes, SIGNATURE].concat()
}

/// Put every file of `job` in the source prefix.
pub fn stage(store: &InMemoryObjectStore, job: &SigningJob) {
    for file in &job.files {
        store.insert(job.source_key(file), UNSIGNED.to_vec());
    }
}

/// Observable state of [`FakeDriver`], shared with the test.
#[derive(Debug)]
pub struct DriverState {
    pub connected: AtomicBool,
    pub login_succeeds: AtomicBool,
    pub checks: AtomicUsize,
    pub logins: AtomicUsize,
    pub overlaps: AtomicUsize,
    in_call: AtomicBool,
    pub call_delay: Duration,
    pub hints: Mutex<Vec<Option<WindowHint>>>,
}

impl DriverState {
    pub fn new(connected: bool, call_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(connected),
            login_succeeds: AtomicBool::new(true),
            checks: AtomicUsize::new(0),
            logins: AtomicUsize::new(0),
            overlaps: AtomicUsize::new(0),
            in_call: AtomicBool::new(false),
            call_delay,
            hints: Mutex::new(Vec::new()),
        })
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn enter(&self) {
        if self.in_call.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn exit(&self) {
        self.in_call.store(false, Ordering::SeqCst);
    }
}

/// Session driver that records whether two calls were ever in flight at once.
pub struct FakeDriver(pub Arc<DriverState>);

#[async_trait]
impl SessionDriver for FakeDriver {
    async fn check(&mut self) -> SessionProbe {
        self.0.enter();
        tokio::time::sleep(self.0.call_delay).await;
        self.0.checks.fetch_add(1, Ordering::SeqCst);
        let probe = if self.0.connected.load(Ordering::SeqCst) {
            SessionProbe::new(SessionStatus::Connected)
        } else {
            SessionProbe::new(SessionStatus::Disconnected).with_hint(WindowHint::new("hwnd-7"))
        };
        self.0.exit();
        probe
    }

    async fn login(&mut self, _credentials: &Credentials, hint: Option<&WindowHint>) -> bool {
        self.0.enter();
        self.0.hints.lock().unwrap().push(hint.cloned());
        tokio::time::sleep(self.0.call_delay * 3).await;
        self.0.logins.fetch_add(1, Ordering::SeqCst);
        let ok = self.0.login_succeeds.load(Ordering::SeqCst);
        if ok {
            self.0.connected.store(true, Ordering::SeqCst);
        }
        self.0.exit();
        ok
    }
}

/// Appends a signature marker; verify checks for it.
#[derive(Debug, Default)]
pub struct FakeExecutor {
    fail_sign: Mutex<HashSet<String>>,
    pub signed: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn fail_sign(&self, file: &str) {
        self.fail_sign.lock().unwrap().insert(file.to_string());
    }

    pub fn clear(&self) {
        self.fail_sign.lock().unwrap().clear();
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl SigningExecutor for FakeExecutor {
    async fn sign(&self, path: &Path, _params: &SigningParams) -> SignerResult<()> {
        let name = file_name(path);
        if self.fail_sign.lock().unwrap().contains(&name) {
            return Err(SignerError::signing(format!("signtool sign failed: {name}")));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SignerError::signing(e.to_string()))?;
        tokio::fs::write(path, signed(&bytes))
            .await
            .map_err(|e| SignerError::signing(e.to_string()))?;
        self.signed.lock().unwrap().push(name);
        Ok(())
    }

    async fn verify(&self, path: &Path) -> SignerResult<()> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SignerError::signing(e.to_string()))?;
        if bytes.ends_with(SIGNATURE) {
            Ok(())
        } else {
            Err(SignerError::signing("signtool verify failed: no signature"))
        }
    }
}

/// Ordered record of status writes and acknowledgements.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }
}

pub struct JournalingStore {
    pub inner: Arc<InMemoryObjectStore>,
    pub journal: Journal,
    /// Simulated crash: the status lands, then the call never returns.
    pub hang_after_status: AtomicBool,
}

#[async_trait]
impl ObjectStore for JournalingStore {
    async fn download(&self, key: &str, dest: &Path) -> SignerResult<PathBuf> {
        self.inner.download(key, dest).await
    }

    async fn upload(&self, src: &Path, key: &str) -> SignerResult<()> {
        self.inner.upload(src, key).await
    }

    async fn put_status(&self, prefix: &str, outcome: &JobOutcome) -> SignerResult<()> {
        self.inner.put_status(prefix, outcome).await?;
        self.journal.push(format!("status:{prefix}"));
        if self.hang_after_status.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

pub struct JournalingQueue {
    pub inner: Arc<InMemoryQueue>,
    pub journal: Journal,
}

#[async_trait]
impl JobQueue for JournalingQueue {
    async fn receive(&self, wait: Duration) -> Option<Delivery> {
        self.inner.receive(wait).await
    }

    async fn acknowledge(&self, handle: DeliveryHandle) {
        self.journal.push(format!("ack:{}", handle.as_str()));
        self.inner.acknowledge(handle).await;
    }
}

/// In-memory world plus fakes, wired the way the daemon wires real adapters.
pub struct Harness {
    pub queue: Arc<InMemoryQueue>,
    pub store: Arc<InMemoryObjectStore>,
    pub driver: Arc<DriverState>,
    pub executor: Arc<FakeExecutor>,
    pub session: Arc<AuthSession>,
    pub events: Events,
    pub journal: Journal,
    pub scratch: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_driver(DriverState::new(true, Duration::from_millis(1)))
    }

    pub fn with_driver(driver: Arc<DriverState>) -> Self {
        let session = Arc::new(AuthSession::new(
            Box::new(FakeDriver(Arc::clone(&driver))),
            credentials(),
        ));
        Self {
            queue: Arc::new(InMemoryQueue::new()),
            store: Arc::new(InMemoryObjectStore::new()),
            driver,
            executor: Arc::new(FakeExecutor::default()),
            session,
            events: Arc::new(InMemoryEventBus::new()),
            journal: Journal::default(),
            scratch: tempfile::tempdir().expect("scratch dir"),
        }
    }

    pub fn config(&self) -> JobProcessorConfig {
        JobProcessorConfig {
            poll_wait: Duration::from_millis(20),
            retry: RetryPolicy::default(),
            temp_dir: self.workdir(),
            error_pause: Duration::from_millis(10),
        }
    }

    pub fn workdir(&self) -> PathBuf {
        self.scratch.path().join("work")
    }

    pub fn journaling_store(&self) -> Arc<JournalingStore> {
        Arc::new(JournalingStore {
            inner: Arc::clone(&self.store),
            journal: self.journal.clone(),
            hang_after_status: AtomicBool::new(false),
        })
    }

    pub fn journaling_queue(&self) -> Arc<JournalingQueue> {
        Arc::new(JournalingQueue {
            inner: Arc::clone(&self.queue),
            journal: self.journal.clone(),
        })
    }

    /// Processor over the journaling wrappers.
    pub fn processor(&self) -> JobProcessor<Events> {
        self.processor_with(self.journaling_queue(), self.journaling_store())
    }

    pub fn processor_with(
        &self,
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn ObjectStore>,
    ) -> JobProcessor<Events> {
        JobProcessor::new(
            queue,
            store,
            Arc::clone(&self.executor) as Arc<dyn SigningExecutor>,
            Arc::clone(&self.session),
            Arc::clone(&self.events),
            self.config(),
        )
    }

    pub fn subscribe(&self) -> Subscription<StatusEvent> {
        self.events.subscribe()
    }

    pub async fn receive(&self) -> Delivery {
        self.queue
            .receive(Duration::from_millis(50))
            .await
            .expect("a delivery")
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
