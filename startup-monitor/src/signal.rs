use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Return a token that is cancelled once SIGTERM or SIGINT is received.
///
/// Must be called from within a tokio runtime.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to listen for SIGTERM: {e:?}");
                cancel.cancel();
                return;
            }
        };
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    error!("failed to listen for ctrl_c: {e:?}");
                }
            }
            _ = sigterm.recv() => {}
        }
        info!("Received SIGTERM or SIGINT signal, shutting down the process.");
        cancel.cancel();
    });
    token
}
