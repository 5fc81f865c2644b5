use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use signer_core::StatusEvent;
use signer_events::{EventBus, InMemoryEventBus, publish_best_effort};
use signer_infra::{ConfigError, SignerConfig};
use signer_observability::LogFormat;

use signer_daemon::{StatusReporter, app, signals};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let format = std::env::var("SIGNER_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or_default();
    // Held until exit so buffered file lines are flushed.
    let _log_guard = match std::env::var_os("SIGNER_LOG_DIR").filter(|dir| !dir.is_empty()) {
        Some(dir) => signer_observability::init_with_files(format, Path::new(&dir)),
        None => {
            signer_observability::init_with(format);
            None
        }
    };

    let events: app::Events = Arc::new(InMemoryEventBus::new());
    let reporter = StatusReporter::spawn("status-reporter", events.subscribe())
        .context("spawning status reporter")?;

    let config = match SignerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            let message = match &err {
                ConfigError::Missing(keys) => format!("Missing config: {}", keys.join(", ")),
                other => other.to_string(),
            };
            publish_best_effort(&events, StatusEvent::error(message));
            tracing::error!(error = %err, "configuration rejected");
            reporter.shutdown();
            return Err(err).context("loading configuration");
        }
    };
    tracing::info!(config = ?config, "configuration loaded");

    let orchestrator = app::start(&config, Arc::clone(&events)).await;

    let served = signals::run_until_shutdown(&orchestrator).await;
    orchestrator.stop().await;

    let board = reporter.shutdown();
    tracing::info!(
        succeeded = board.jobs_succeeded,
        failed = board.attempts_failed,
        errors = board.errors,
        "signer stopped"
    );

    served.context("waiting for signals")
}
