//! OS signals mapped onto orchestrator commands.

use tracing::{info, warn};

use signer_infra::OrchestratorHandle;

/// Serve signals until a shutdown is requested.
///
/// `SIGUSR1` asks for a forced login; Ctrl-C and `SIGTERM` return.
#[cfg(unix)]
pub async fn run_until_shutdown(handle: &OrchestratorHandle) -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut force_login = signal(SignalKind::user_defined1())?;
    let mut terminate = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("interrupt received");
                return Ok(());
            }
            _ = terminate.recv() => {
                info!("terminate received");
                return Ok(());
            }
            _ = force_login.recv() => {
                info!("force login requested by signal");
                if let Err(err) = handle.force_login() {
                    warn!(error = %err, "force login not queued");
                }
            }
        }
    }
}

#[cfg(not(unix))]
pub async fn run_until_shutdown(_handle: &OrchestratorHandle) -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("interrupt received");
    Ok(())
}
