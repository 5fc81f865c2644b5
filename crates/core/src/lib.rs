//! `signer-core`: data model for the signing worker.
//!
//! This crate is **pure**: job and status schemas, the error taxonomy and the
//! retry policy. Queue, storage and automation concerns live in `signer-infra`.

pub mod error;
pub mod event;
pub mod id;
pub mod job;
pub mod outcome;
pub mod retry;
pub mod session;

pub use error::{SignerError, SignerResult};
pub use event::{Command, StatusEvent};
pub use id::{AttemptId, RunId};
pub use job::{DeliveryAttempt, DeliveryHandle, JobDefaults, JobMessage, SigningJob};
pub use outcome::{JobOutcome, StatusRecord, STATUS_OBJECT_NAME};
pub use retry::{FailureDisposition, RetryPolicy};
pub use session::{Credentials, SessionPhase, SessionProbe, SessionStatus, WindowHint};
