//! Turning termination signals into cancellation

use futures::stream::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Cancels `token` on the first SIGINT or SIGTERM
pub struct SignalHandler {
    handle: signal_hook_tokio::Handle,
    task: JoinHandle<()>,
}

impl SignalHandler {
    pub fn start(token: CancellationToken) -> std::io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let handle = signals.handle();
        let task = tokio::spawn(async move {
            if let Some(signal) = signals.next().await {
                warn!("Received signal {}, cancelling", signal);
                token.cancel();
            }
        });
        Ok(Self { handle, task })
    }

    pub fn stop(self) {
        self.handle.close();
        self.task.abort();
    }
}
