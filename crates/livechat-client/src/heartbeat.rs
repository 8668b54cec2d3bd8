//! Keepalive task for a verified connection.
//!
//! The scheduler owns a tokio task that writes the heartbeat frame right
//! away and then once per interval. It shares the socket writer with the
//! connection manager and never looks at connection state; the manager
//! decides when it starts and stops.

use std::sync::Arc;
use std::time::Duration;

use livechat_protocol::encode_heartbeat_frame;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{trace, warn};

use crate::error::ClientError;
use crate::transport::SocketWriter;

/// Default interval between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Socket writer shared between the receive loop and the heartbeat task.
pub type SharedWriter = Arc<Mutex<Box<dyn SocketWriter>>>;

/// Handle to a running heartbeat task.
pub struct HeartbeatScheduler {
    cancel: oneshot::Sender<()>,
    failure: Option<oneshot::Receiver<ClientError>>,
    task: JoinHandle<()>,
}

impl HeartbeatScheduler {
    /// Spawns the heartbeat task.
    pub fn start(writer: SharedWriter, interval: Duration) -> Self {
        let (cancel, cancel_rx) = oneshot::channel();
        let (failure_tx, failure) = oneshot::channel();
        let task = tokio::spawn(run(writer, interval, cancel_rx, failure_tx));

        Self {
            cancel,
            failure: Some(failure),
            task,
        }
    }

    /// Resolves with the send error if the task fails. Pends forever otherwise.
    ///
    /// Cancel safe.
    pub async fn failed(&mut self) -> ClientError {
        if let Some(failure) = self.failure.as_mut() {
            let result = failure.await;
            self.failure = None;
            if let Ok(err) = result {
                return err;
            }
        }
        std::future::pending().await
    }

    /// Stops the task and waits for it to finish.
    ///
    /// No heartbeat is written once this returns.
    pub async fn stop(self) {
        let Self { cancel, task, .. } = self;
        let _ = cancel.send(());
        if let Err(e) = task.await {
            if e.is_panic() {
                warn!(error = %e, "heartbeat task panicked");
            }
        }
    }
}

async fn run(
    writer: SharedWriter,
    interval: Duration,
    mut cancel: oneshot::Receiver<()>,
    failure: oneshot::Sender<ClientError>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut cancel => break,
            _ = ticker.tick() => {
                let result = writer.lock().await.send(encode_heartbeat_frame().to_vec()).await;
                match result {
                    Ok(()) => trace!("heartbeat sent"),
                    Err(e) => {
                        warn!(error = %e, "heartbeat send failed");
                        let _ = failure.send(e);
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Connector;
    use crate::transport::mock::{MockConnector, MockHost};

    const URL: &str = "ws://hb:1/sub";

    async fn shared_writer(connector: &MockConnector) -> SharedWriter {
        let (writer, _reader) = connector.connect(URL.to_string()).await.unwrap();
        Arc::new(Mutex::new(writer))
    }

    #[tokio::test(start_paused = true)]
    async fn sends_immediately_then_every_interval() {
        let connector = MockConnector::new().with_host(URL, MockHost::default());
        let writer = shared_writer(&connector).await;

        let scheduler = HeartbeatScheduler::start(writer, Duration::from_secs(30));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(connector.heartbeats(URL), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.heartbeats(URL), 2);

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_written_after_stop() {
        let connector = MockConnector::new().with_host(URL, MockHost::default());
        let writer = shared_writer(&connector).await;

        let scheduler = HeartbeatScheduler::start(writer, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(35)).await;
        scheduler.stop().await;
        let sent = connector.heartbeats(URL);
        assert!(sent >= 3);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(connector.heartbeats(URL), sent);
    }

    #[tokio::test(start_paused = true)]
    async fn send_failure_is_reported() {
        let host = MockHost {
            fail_writes: true,
            ..MockHost::default()
        };
        let connector = MockConnector::new().with_host(URL, host);
        let writer = shared_writer(&connector).await;

        let mut scheduler = HeartbeatScheduler::start(writer, Duration::from_secs(30));
        let err = scheduler.failed().await;
        assert!(matches!(err, ClientError::Connection(_)));
        scheduler.stop().await;
        assert_eq!(connector.heartbeats(URL), 0);
    }
}
