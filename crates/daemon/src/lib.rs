//! Process edge of the signing worker: wiring, status reporting, signals.

pub mod app;
pub mod aws;
pub mod reporter;
pub mod signals;
pub mod status_board;

pub use reporter::{ReporterHandle, StatusReporter};
pub use status_board::{LastJob, StatusBoard};
