//! Explicit shutdown requests.
//!
//! Each orchestrator owns one single-slot channel. Any number of cloned
//! [`ShutdownHandle`]s may write into it; the orchestrator reads it once,
//! while awaiting its trigger. Sends never block: if a value is already
//! pending, later requests are dropped, so the first caller wins.

use tokio::sync::mpsc;
use tracing::debug;

pub type ShutdownRequest = Option<anyhow::Error>;

/// Cloneable handle that asks an orchestrator to begin shutting down
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: mpsc::Sender<ShutdownRequest>,
}

/// Read side of the shutdown channel, owned by the orchestrator
#[derive(Debug)]
pub(crate) struct ShutdownReceiver {
    rx: mpsc::Receiver<ShutdownRequest>,
}

pub(crate) fn channel() -> (ShutdownHandle, ShutdownReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (ShutdownHandle { tx }, ShutdownReceiver { rx })
}

impl ShutdownHandle {
    /// Request shutdown, carrying `err` as the runtime error (`None` for a
    /// normal finish).
    ///
    /// Returns `true` if this request was retained, `false` if another
    /// request is already pending or the orchestrator is gone.
    pub fn request(&self, err: ShutdownRequest) -> bool {
        match self.tx.try_send(err) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Shutdown already requested, dropping request");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Orchestrator no longer listening, dropping shutdown request");
                false
            }
        }
    }

    /// Request shutdown after a successful run
    pub fn finish(&self) -> bool {
        self.request(None)
    }

    /// Request shutdown because of an unrecoverable error
    pub fn fail<E>(&self, err: E) -> bool
    where
        E: Into<anyhow::Error>,
    {
        self.request(Some(err.into()))
    }
}

impl ShutdownReceiver {
    /// Wait for the first retained request
    pub(crate) async fn recv(&mut self) -> ShutdownRequest {
        match self.rx.recv().await {
            Some(request) => request,
            // All handles dropped: an explicit request can no longer arrive
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_request_wins() {
        let (handle, mut receiver) = channel();
        assert!(handle.fail(anyhow::anyhow!("first")));
        assert!(!handle.fail(anyhow::anyhow!("second")));
        assert!(!handle.finish());

        let request = receiver.recv().await;
        assert_eq!(request.unwrap().to_string(), "first");
    }

    #[tokio::test]
    async fn test_finish_carries_no_error() {
        let (handle, mut receiver) = channel();
        assert!(handle.clone().finish());
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_request_after_receiver_dropped() {
        let (handle, receiver) = channel();
        drop(receiver);
        assert!(!handle.finish());
    }

    #[tokio::test]
    async fn test_concurrent_requests_exactly_one_retained() {
        let (handle, mut receiver) = channel();
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let mut tasks = Vec::new();
        for message in ["left", "right"] {
            let handle = handle.clone();
            let barrier = barrier.clone();
            tasks.push(tokio::spawn(async move {
                barrier.wait().await;
                handle.fail(anyhow::anyhow!(message))
            }));
        }

        let mut retained = 0;
        for task in tasks {
            if task.await.unwrap() {
                retained += 1;
            }
        }
        assert_eq!(retained, 1);

        let winner = receiver.recv().await.unwrap().to_string();
        assert!(winner == "left" || winner == "right");

        let nothing_else =
            tokio::time::timeout(Duration::from_millis(20), receiver.recv()).await;
        assert!(nothing_else.is_err());
    }
}
