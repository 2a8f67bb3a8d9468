use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancel `token` on SIGINT, and on SIGTERM on Unix systems
pub fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(e) => error!(error = %e, "error setting up signal handler"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM signal");
                token.cancel();
            }
            Err(e) => error!(error = %e, "error setting up SIGTERM handler"),
        }
    });
}
