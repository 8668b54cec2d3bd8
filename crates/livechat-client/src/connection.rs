//! Connection manager with host failover.
//!
//! The manager walks the host list in order. For each host it opens a
//! socket, sends the verify request and waits for the reply. Once
//! verified it starts the heartbeat and runs the receive loop until the
//! socket is lost or a close is requested. A lost host is never retried;
//! when the list runs out the manager fails with
//! [`ClientError::ExhaustedHosts`].
//!
//! # Example
//!
//! ```ignore
//! let (tx, mut rx) = tokio::sync::mpsc::channel(256);
//! let manager = ConnectionManager::new(config, WsConnector::new(), tx);
//! let close = manager.close_handle();
//! let task = tokio::spawn(manager.run());
//! while let Some(event) = rx.recv().await {
//!     println!("{:?}", event);
//! }
//! task.await??;
//! ```

use std::sync::Arc;
use std::time::Duration;

use livechat_core::ChatEvent;
use livechat_protocol::{
    Dispatch, MessageDispatcher, UnknownCommandPolicy, decode_frames, encode_verify_frame,
};
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use crate::config::{ConnectionConfig, DEFAULT_SCHEME, HostAddr};
use crate::error::{ClientError, ClientResult};
use crate::heartbeat::{DEFAULT_HEARTBEAT_INTERVAL, HeartbeatScheduler, SharedWriter};
use crate::signals::CloseHandle;
use crate::state::{ConnectionState, Transition};
use crate::transport::{Connector, SocketReader};

/// Time allowed between sending the verify request and its reply.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(20);

/// Tunables for the connection manager.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Interval between heartbeats.
    pub heartbeat_interval: Duration,
    /// Deadline for the verify reply.
    pub verify_timeout: Duration,
    /// WebSocket scheme (`wss` or `ws`).
    pub scheme: String,
    /// What to do with unrecognized commands.
    pub unknown_commands: UnknownCommandPolicy,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
            scheme: DEFAULT_SCHEME.to_string(),
            unknown_commands: UnknownCommandPolicy::Drop,
        }
    }
}

impl ManagerSettings {
    /// Builder: set the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Builder: set the verify timeout.
    #[must_use]
    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    /// Builder: set the WebSocket scheme.
    #[must_use]
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Builder: set the unknown-command policy.
    #[must_use]
    pub fn with_unknown_commands(mut self, policy: UnknownCommandPolicy) -> Self {
        self.unknown_commands = policy;
        self
    }
}

/// How one host session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Closed on request (or the consumer went away).
    Graceful,
    /// Lost abnormally with hosts left to try.
    Failover,
    /// Lost abnormally and no hosts remain.
    Exhausted,
    /// Failed with an error another host would not fix.
    Fatal,
}

impl SessionEnd {
    /// Classifies a session outcome.
    pub fn classify(outcome: &ClientResult<()>, hosts_remaining: bool) -> Self {
        match outcome {
            Ok(()) => Self::Graceful,
            Err(e) if !e.triggers_failover() => Self::Fatal,
            Err(_) if hosts_remaining => Self::Failover,
            Err(_) => Self::Exhausted,
        }
    }
}

/// Outcome of handling one socket read.
enum ReadOutcome {
    Continue,
    ConsumerGone,
}

/// Drives a connection attempt sequence over a host list.
pub struct ConnectionManager {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    events: mpsc::Sender<ChatEvent>,
    settings: ManagerSettings,
    state: watch::Sender<ConnectionState>,
    close: CloseHandle,
    ever_connected: bool,
}

impl ConnectionManager {
    /// Creates a manager that sends events to `events`.
    pub fn new(
        config: ConnectionConfig,
        connector: impl Connector + 'static,
        events: mpsc::Sender<ChatEvent>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            config,
            connector: Arc::new(connector),
            events,
            settings: ManagerSettings::default(),
            state,
            close: CloseHandle::new(),
            ever_connected: false,
        }
    }

    /// Replaces the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ManagerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Returns a receiver for state snapshots.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Returns a handle that requests a graceful close.
    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    /// Runs until a graceful close or until every host has failed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ExhaustedHosts`] when the host list runs out,
    /// or the session error itself when it does not trigger failover.
    pub async fn run(mut self) -> ClientResult<()> {
        let hosts = self.config.host_list.clone();
        let attempted = hosts.len();

        for (index, host) in hosts.iter().enumerate() {
            if self.close.is_closed() {
                self.transition(Transition::CloseRequested);
                return Ok(());
            }

            self.transition(Transition::Dial(host.clone()));
            info!(host = %host, attempt = index + 1, of = attempted, "connecting");

            let outcome = self.session(host).await;
            match SessionEnd::classify(&outcome, index + 1 < attempted) {
                SessionEnd::Graceful => {
                    self.transition(Transition::CloseRequested);
                    info!(host = %host, "connection closed");
                    return Ok(());
                }
                SessionEnd::Failover => {
                    self.transition(Transition::Lost);
                    if let Err(e) = outcome {
                        warn!(host = %host, error = %e, "connection lost, trying next host");
                    }
                }
                SessionEnd::Exhausted => {
                    self.transition(Transition::Lost);
                    if let Err(e) = outcome {
                        warn!(host = %host, error = %e, "connection lost, no hosts left");
                    }
                }
                SessionEnd::Fatal => {
                    self.transition(Transition::Lost);
                    self.transition(Transition::Exhausted);
                    if let Err(ref e) = outcome {
                        error!(host = %host, error = %e, "giving up without failover");
                    }
                    return outcome;
                }
            }

            // Let state subscribers observe `Reconnecting` before the next dial.
            tokio::task::yield_now().await;
        }

        self.transition(Transition::Exhausted);
        error!(attempted, ever_connected = self.ever_connected, "all hosts failed");
        Err(ClientError::ExhaustedHosts {
            attempted,
            ever_connected: self.ever_connected,
        })
    }

    /// Publishes the next state, ignoring illegal transitions.
    fn transition(&self, transition: Transition) -> bool {
        let current = self.state.borrow().clone();
        match current.apply(transition.clone()) {
            Some(next) => {
                debug!(from = %current, to = %next, "state transition");
                self.state.send_replace(next);
                true
            }
            None => {
                warn!(state = %current, ?transition, "ignoring illegal transition");
                false
            }
        }
    }

    /// One host attempt. `Ok` means a graceful close.
    async fn session(&mut self, host: &HostAddr) -> ClientResult<()> {
        let url = host.url(&self.settings.scheme);
        let connector = self.connector.clone();

        let (writer, mut reader) = tokio::select! {
            biased;
            _ = self.close.wait().wait() => return Ok(()),
            result = connector.connect(url) => result?,
        };
        self.transition(Transition::Opened);

        let writer: SharedWriter = Arc::new(Mutex::new(writer));
        let verify = encode_verify_frame(&self.config.auth_token, self.config.room_id)?;
        writer.lock().await.send(verify).await?;
        debug!(host = %host, room_id = self.config.room_id, "verify sent");

        let result = self.receive(host, &writer, reader.as_mut()).await;
        if result.is_ok() {
            if let Err(e) = writer.lock().await.close().await {
                debug!(host = %host, error = %e, "close frame not sent");
            }
        }
        result
    }

    /// Receive loop for one socket. Stops the heartbeat on every exit.
    async fn receive(
        &mut self,
        host: &HostAddr,
        writer: &SharedWriter,
        reader: &mut dyn SocketReader,
    ) -> ClientResult<()> {
        let dispatcher = MessageDispatcher::new(self.settings.unknown_commands);
        let close = self.close.clone();
        let mut heartbeat: Option<HeartbeatScheduler> = None;

        let verify_deadline = tokio::time::sleep(self.settings.verify_timeout);
        tokio::pin!(verify_deadline);

        let result = loop {
            tokio::select! {
                biased;
                _ = close.wait().wait() => {
                    debug!(host = %host, "close requested");
                    break Ok(());
                }
                err = heartbeat_failure(&mut heartbeat) => break Err(err),
                _ = &mut verify_deadline, if heartbeat.is_none() => {
                    break Err(ClientError::Connection(format!(
                        "no verify reply within {:?}",
                        self.settings.verify_timeout
                    )));
                }
                read = reader.next() => {
                    let raw = match read {
                        Some(Ok(raw)) => raw,
                        Some(Err(e)) => break Err(e),
                        None => break Err(ClientError::Connection("closed by server".into())),
                    };
                    match self.handle_read(host, &raw, &dispatcher, writer, &mut heartbeat).await {
                        Ok(ReadOutcome::Continue) => {}
                        Ok(ReadOutcome::ConsumerGone) => {
                            info!("event receiver dropped, closing");
                            self.close.close();
                            break Ok(());
                        }
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        if let Some(heartbeat) = heartbeat.take() {
            heartbeat.stop().await;
        }
        result
    }

    /// Decodes and dispatches everything in one read, in order.
    async fn handle_read(
        &mut self,
        host: &HostAddr,
        raw: &[u8],
        dispatcher: &MessageDispatcher,
        writer: &SharedWriter,
        heartbeat: &mut Option<HeartbeatScheduler>,
    ) -> ClientResult<ReadOutcome> {
        let frames = match decode_frames(raw) {
            Ok(frames) => frames,
            Err(e) => {
                warn!(host = %host, len = raw.len(), error = %e, "discarding unreadable read");
                return Ok(ReadOutcome::Continue);
            }
        };

        for frame in frames {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) if e.aborts_batch() => {
                    warn!(host = %host, error = %e, "dropping rest of batch");
                    break;
                }
                Err(e) => {
                    warn!(host = %host, error = %e, "discarding bad sub-frame");
                    continue;
                }
            };

            let dispatch = match dispatcher.dispatch(&frame) {
                Ok(dispatch) => dispatch,
                Err(e) => {
                    warn!(host = %host, error = %e, "skipping undecodable message");
                    continue;
                }
            };

            match dispatch {
                Dispatch::Event(event) => {
                    if self.events.send(event).await.is_err() {
                        return Ok(ReadOutcome::ConsumerGone);
                    }
                }
                Dispatch::VerifyReply { code } if heartbeat.is_some() => {
                    debug!(host = %host, code, "ignoring repeated verify reply");
                }
                Dispatch::VerifyReply { code: 0 } => {
                    self.transition(Transition::Verified);
                    self.ever_connected = true;
                    info!(host = %host, "verified");
                    *heartbeat = Some(HeartbeatScheduler::start(
                        writer.clone(),
                        self.settings.heartbeat_interval,
                    ));
                }
                Dispatch::VerifyReply { code } => {
                    warn!(host = %host, code, "verify rejected");
                    return Err(ClientError::Auth { code });
                }
                Dispatch::HeartbeatReply { popularity } => {
                    debug!(host = %host, ?popularity, "heartbeat acknowledged");
                }
                Dispatch::Ignored { operation, command } => {
                    trace!(operation, ?command, "ignored");
                }
            }
        }
        Ok(ReadOutcome::Continue)
    }
}

async fn heartbeat_failure(heartbeat: &mut Option<HeartbeatScheduler>) -> ClientError {
    match heartbeat {
        Some(heartbeat) => heartbeat.failed().await,
        None => std::future::pending().await,
    }
}
