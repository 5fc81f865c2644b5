//! Background worker units.

pub mod job_processor;
pub mod orchestrator;
pub mod session_keeper;

pub use job_processor::{JobDisposition, JobProcessor, JobProcessorConfig};
pub use orchestrator::{Orchestrator, OrchestratorHandle};
pub use session_keeper::{SessionKeeper, SessionKeeperHandle};
