//! Infrastructure layer: configuration, capability adapters, worker units.

pub mod config;
pub mod queue;
pub mod retry;
pub mod session;
pub mod signing;
pub mod storage;
pub mod workers;

pub use config::{ConfigError, SignerConfig};
pub use queue::{Delivery, JobQueue};
pub use retry::TransportRetry;
pub use session::{AuthSession, SessionDriver, SessionStats};
pub use signing::{SigningExecutor, SigningParams};
pub use storage::ObjectStore;
pub use workers::{
    JobDisposition, JobProcessor, JobProcessorConfig, Orchestrator, OrchestratorHandle,
    SessionKeeper, SessionKeeperHandle,
};
