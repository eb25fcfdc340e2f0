use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancel `token` on the first SIGINT or SIGTERM.
///
/// The feed pump and the monitor both watch this token, so a signal stops
/// ingestion and lets the final snapshot be printed.
pub fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            received = wait_for_signal() => match received {
                Ok(name) => {
                    tracing::info!(signal = name, "Received signal, stopping monitor");
                    token.cancel();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Could not install signal handlers");
                }
            },
            _ = token.cancelled() => {}
        }
    })
}

async fn wait_for_signal() -> std::io::Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}
