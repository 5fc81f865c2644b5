//! Background thread that folds status events into a [`StatusBoard`].

use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use signer_core::StatusEvent;
use signer_events::Subscription;

use crate::status_board::StatusBoard;

/// Handle to read and stop a running reporter.
#[derive(Debug)]
pub struct ReporterHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    board: Arc<Mutex<StatusBoard>>,
}

impl ReporterHandle {
    pub fn board(&self) -> StatusBoard {
        self.board
            .lock()
            .map(|b| b.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Stop after folding whatever is already buffered.
    pub fn shutdown(mut self) -> StatusBoard {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
        self.board()
    }
}

#[derive(Debug)]
pub struct StatusReporter;

impl StatusReporter {
    pub fn spawn(
        name: &'static str,
        subscription: Subscription<StatusEvent>,
    ) -> std::io::Result<ReporterHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let board = Arc::new(Mutex::new(StatusBoard::new()));

        let shared = Arc::clone(&board);
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || reporter_loop(subscription, shutdown_rx, shared))?;

        Ok(ReporterHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            board,
        })
    }
}

fn reporter_loop(
    subscription: Subscription<StatusEvent>,
    shutdown_rx: mpsc::Receiver<()>,
    board: Arc<Mutex<StatusBoard>>,
) {
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            for event in subscription.drain() {
                fold(&board, &event);
            }
            break;
        }

        match subscription.recv_timeout(tick) {
            Ok(event) => fold(&board, &event),
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn fold(board: &Mutex<StatusBoard>, event: &StatusEvent) {
    let mut board = match board.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    board.apply(event);

    match event {
        StatusEvent::Error { message } => error!(message = %message, "worker error"),
        StatusEvent::JobCompleted { success: false, .. } => {
            warn!(status = %board.status_line, failed = board.attempts_failed, "status")
        }
        _ => info!(
            status = %board.status_line,
            succeeded = board.jobs_succeeded,
            failed = board.attempts_failed,
            "status"
        ),
    }
}
