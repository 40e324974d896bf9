//! Cancellation of in-flight uploads.

use std::future::Future;

use tokio::sync::watch;
use tracing::debug;

/// Run `fut` until it finishes or `shutdown` becomes `true`.
///
/// On shutdown `fut` is dropped where it stands: no further chunk is
/// requested, owned sinks are released by their `Drop`, and `None` is
/// returned instead of an outcome. A closed channel never cancels.
pub async fn with_shutdown<F: Future>(fut: F, mut shutdown: watch::Receiver<bool>) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = stopped(&mut shutdown) => {
            debug!("upload cancelled");
            None
        }
        output = fut => Some(output),
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let closed = shutdown.wait_for(|stop| *stop).await.is_err();
    if closed {
        // Sender gone without asking for shutdown.
        std::future::pending::<()>().await;
    }
}
