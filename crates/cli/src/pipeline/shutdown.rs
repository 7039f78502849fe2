//! Cancellation on Ctrl+C, SIGTERM or timeout.

use std::time::Duration;

use sync_engine::CancellationToken;
use tokio::task::JoinHandle;
use tracing::warn;

/// Cancel `token` on the first shutdown signal or when `timeout` elapses.
///
/// The returned task ends as soon as the token is cancelled by anyone.
pub fn spawn_cancel_on_shutdown(
    token: CancellationToken,
    timeout: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let deadline = async move {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = token.cancelled() => return,
            _ = ctrl_c() => warn!("Received Ctrl+C, cancelling run"),
            _ = terminate() => warn!("Received SIGTERM, cancelling run"),
            _ = deadline => warn!("Run timeout reached, cancelling run"),
        }
        token.cancel();
    })
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_token() {
        let token = CancellationToken::new();
        let handle = spawn_cancel_on_shutdown(token.clone(), Some(Duration::from_secs(5)));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(token.is_cancelled());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_watcher_exits_when_token_cancelled() {
        let token = CancellationToken::new();
        let handle = spawn_cancel_on_shutdown(token.clone(), None);

        token.cancel();
        handle.await.unwrap();
    }
}
