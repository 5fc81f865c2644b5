//! Presentation-side view of the worker, folded from status events.

use chrono::{DateTime, Utc};
use serde::Serialize;

use signer_core::{RunId, StatusEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastJob {
    pub run_id: RunId,
    pub success: bool,
    pub files: usize,
    pub finished_at: DateTime<Utc>,
}

/// Everything a tray icon or log line needs to show.
///
/// Events are loss-tolerant, so the board never assumes it saw a
/// `JobStarted` before the matching `JobCompleted`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusBoard {
    pub status_line: String,
    pub ready: bool,
    pub current_job: Option<RunId>,
    pub jobs_succeeded: u64,
    pub attempts_failed: u64,
    pub errors: u64,
    pub last_error: Option<String>,
    pub last_job: Option<LastJob>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            status_line: "Starting".to_string(),
            ..Self::default()
        }
    }

    pub fn apply(&mut self, event: &StatusEvent) {
        match event {
            StatusEvent::Ready => {
                self.ready = true;
                self.status_line = "Ready".to_string();
            }
            StatusEvent::JobStarted { run_id, files } => {
                self.current_job = Some(run_id.clone());
                self.status_line = format!("Signing {run_id} ({} files)", files.len());
            }
            StatusEvent::JobCompleted {
                run_id,
                success,
                files,
                error,
            } => {
                if self.current_job.as_ref() == Some(run_id) {
                    self.current_job = None;
                }
                if *success {
                    self.jobs_succeeded += 1;
                    self.status_line = format!("Signed {run_id}");
                } else {
                    self.attempts_failed += 1;
                    self.status_line = format!(
                        "Failed {run_id}: {}",
                        error.as_deref().unwrap_or("unknown error")
                    );
                }
                self.last_job = Some(LastJob {
                    run_id: run_id.clone(),
                    success: *success,
                    files: files.len(),
                    finished_at: Utc::now(),
                });
            }
            StatusEvent::Error { message } => {
                self.errors += 1;
                self.last_error = Some(message.clone());
                self.status_line = format!("Error: {message}");
            }
        }
    }
}
