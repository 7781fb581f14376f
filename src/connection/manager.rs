use crate::bus::{ClientEvent, Disconnect, ErrorEvent, EventBus};
use crate::codec::{self, InboundFrame};
use crate::config::LiveChannelConfig;
use crate::connection::backoff::ReconnectPolicy;
use crate::connection::timer::TimerHandle;
use crate::connection::transport::{
    Connector, Transport, TransportEvent, CLOSE_ABNORMAL, CLOSE_HEARTBEAT_TIMEOUT, CLOSE_NORMAL,
};
use crate::dispatch::Dispatcher;
use crate::ClientError;
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// How long `disconnect` waits for the session to flush its close frame
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle of the live-update connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    Reconnecting,
}

/// Commands from the manager to the running session task
enum Outbound {
    Frame(String),
    Close,
}

/// Mutable connection bookkeeping, guarded by one mutex
struct Link {
    state: ConnectionState,
    /// Reconnects scheduled since the last successful open
    attempt: u32,
    /// Bumped on every explicit connect/disconnect; stale tasks compare and bail
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    session: Option<JoinHandle<()>>,
    reconnect: Option<TimerHandle>,
    /// Aborts the in-flight handshake, if any
    handshake_cancel: Option<oneshot::Sender<()>>,
}

struct Inner {
    settings: LiveChannelConfig,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    dispatcher: Dispatcher,
    bus: Arc<EventBus>,
    link: Mutex<Link>,
    /// One permit: held from the start of a handshake until its transport
    /// belongs to a session or has been closed
    handshake_gate: Semaphore,
}

/// Owns the single live-update connection.
///
/// At most one transport is live at a time. Transport loss that the caller
/// did not ask for is retried with exponential backoff until the attempt
/// budget runs out; inbound frames are decoded and dispatched strictly in
/// arrival order by one session task.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        settings: LiveChannelConfig,
        policy: ReconnectPolicy,
        connector: Arc<dyn Connector>,
        dispatcher: Dispatcher,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                policy,
                connector,
                dispatcher,
                bus,
                link: Mutex::new(Link {
                    state: ConnectionState::Idle,
                    attempt: 0,
                    generation: 0,
                    outbound: None,
                    session: None,
                    reconnect: None,
                    handshake_cancel: None,
                }),
                handshake_gate: Semaphore::new(1),
            }),
        }
    }

    /// Open the connection.
    ///
    /// No-op if already Open or Connecting. A manual connect cancels any
    /// pending scheduled reconnect and resets the attempt counter. If this
    /// attempt fails the error is returned and the reconnect path takes over.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let generation = {
            let mut link = self.inner.lock();
            match link.state {
                ConnectionState::Open | ConnectionState::Connecting => return Ok(()),
                ConnectionState::Closing => return Err(ClientError::Closing),
                ConnectionState::Idle | ConnectionState::Closed | ConnectionState::Reconnecting => {}
            }

            if let Some(timer) = link.reconnect.take() {
                timer.cancel();
            }
            link.state = ConnectionState::Connecting;
            link.attempt = 0;
            link.generation += 1;
            link.generation
        };

        self.inner.establish(generation).await
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Any pending reconnect is invalidated before this returns control to
    /// the runtime, so a `connect()` right after never races a stale timer.
    pub async fn disconnect(&self) {
        let (outbound, session, was_active) = {
            let mut link = self.inner.lock();
            link.generation += 1;
            if let Some(timer) = link.reconnect.take() {
                timer.cancel();
            }
            if let Some(cancel) = link.handshake_cancel.take() {
                let _ = cancel.send(());
            }

            let was_active = matches!(
                link.state,
                ConnectionState::Open | ConnectionState::Connecting | ConnectionState::Reconnecting
            );
            let session = link.session.take();
            link.state = if session.is_some() {
                ConnectionState::Closing
            } else {
                ConnectionState::Closed
            };
            (link.outbound.take(), session, was_active)
        };

        if let Some(tx) = outbound {
            let _ = tx.send(Outbound::Close);
        }

        if let Some(mut session) = session {
            if tokio::time::timeout(CLOSE_GRACE, &mut session).await.is_err() {
                warn!("Live session did not close in time, aborting");
                session.abort();
                // Wait for the abort to drop the transport
                let _ = session.await;
            }
            let mut link = self.inner.lock();
            if link.state == ConnectionState::Closing {
                link.state = ConnectionState::Closed;
            }
        }

        if was_active {
            info!("Live channel disconnected by client");
            self.inner.bus.emit(&ClientEvent::Disconnected(Disconnect {
                code: CLOSE_NORMAL,
                reason: "Client disconnect".to_string(),
                retry_in: None,
            }));
        }
    }

    /// Queue a JSON frame for sending.
    ///
    /// Fails with `NotConnected` unless the connection is Open.
    pub fn send<T: Serialize>(&self, frame: &T) -> Result<(), ClientError> {
        let text = serde_json::to_string(frame)?;
        self.inner.send_text(text)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Reconnects scheduled since the last successful open
    pub fn attempt(&self) -> u32 {
        self.inner.lock().attempt
    }

    /// Whether a reconnect timer is pending
    pub fn reconnect_pending(&self) -> bool {
        self.inner
            .lock()
            .reconnect
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn send_text(&self, text: String) -> Result<(), ClientError> {
        let link = self.lock();
        match (&link.state, &link.outbound) {
            (ConnectionState::Open, Some(tx)) => tx
                .send(Outbound::Frame(text))
                .map_err(|_| ClientError::NotConnected),
            _ => {
                warn!(state = ?link.state, "Live channel not connected, frame not sent");
                Err(ClientError::NotConnected)
            }
        }
    }

    /// One connection attempt for `generation`
    ///
    /// Waits for any older handshake to release the gate first, so two
    /// transports are never being opened (or held) at once.
    async fn establish(self: &Arc<Self>, generation: u64) -> Result<(), ClientError> {
        let _permit = self
            .handshake_gate
            .acquire()
            .await
            .map_err(|_| ClientError::Cancelled)?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        {
            let mut link = self.lock();
            if link.generation != generation {
                return Err(ClientError::Cancelled);
            }
            link.handshake_cancel = Some(cancel_tx);
        }

        let url = self.settings.url.clone();
        let connect_timeout = self.settings.connect_timeout();
        info!(url = %url, "Connecting to live channel");

        let result = tokio::select! {
            outcome = tokio::time::timeout(connect_timeout, self.connector.connect(&url)) => match outcome {
                Ok(Ok(transport)) => Ok(transport),
                Ok(Err(e)) => Err(ClientError::Transport(e.to_string())),
                Err(_) => Err(ClientError::ConnectTimeout(connect_timeout)),
            },
            _ = cancel_rx => {
                debug!("Handshake cancelled by disconnect");
                Err(ClientError::Cancelled)
            }
        };
        // Only this attempt can have set it while the permit is held
        self.lock().handshake_cancel = None;

        let transport = match result {
            Ok(transport) => transport,
            Err(e) => {
                if !self.is_current(generation) {
                    return Err(ClientError::Cancelled);
                }
                warn!(url = %url, error = %e, "Live channel connect failed");
                self.bus.emit(&ClientEvent::Error(ErrorEvent::Transport {
                    message: e.to_string(),
                }));
                self.connection_lost(generation, CLOSE_ABNORMAL, e.to_string());
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let opened = {
            let mut link = self.lock();
            if link.generation == generation && link.state == ConnectionState::Connecting {
                link.state = ConnectionState::Open;
                link.attempt = 0;
                link.outbound = Some(tx);
                true
            } else {
                false
            }
        };
        if !opened {
            debug!("Connect superseded while handshaking, closing transport");
            return Self::discard(transport).await;
        }

        info!(url = %url, "Live channel connected");
        self.bus.emit(&ClientEvent::Connected);

        let mut pending = Some(transport);
        {
            let mut link = self.lock();
            // disconnect() may have run inside a Connected listener
            if link.generation == generation {
                if let Some(transport) = pending.take() {
                    let inner = Arc::clone(self);
                    link.session = Some(tokio::spawn(async move {
                        inner.run_session(transport, rx, generation).await;
                    }));
                }
            }
        }

        match pending {
            Some(transport) => Self::discard(transport).await,
            None => Ok(()),
        }
    }

    async fn discard(mut transport: Box<dyn Transport>) -> Result<(), ClientError> {
        let _ = transport.close(CLOSE_NORMAL, "Client disconnect").await;
        Err(ClientError::Cancelled)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Session loop: the only reader of the transport.
    async fn run_session(
        self: Arc<Self>,
        mut transport: Box<dyn Transport>,
        mut outbound: mpsc::UnboundedReceiver<Outbound>,
        generation: u64,
    ) {
        let ack_timeout = self.settings.heartbeat_ack_timeout();
        let mut heartbeat = self.settings.heartbeat_interval().map(|every| {
            let mut interval = interval_at(Instant::now() + every, every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        // Deadline for an answer to the oldest unanswered heartbeat
        let mut ack_deadline: Option<Instant> = None;

        let (code, reason) = loop {
            let watchdog = ack_deadline.unwrap_or_else(Instant::now);

            tokio::select! {
                event = transport.recv() => match event {
                    TransportEvent::Text(text) => {
                        ack_deadline = None;
                        self.handle_frame(&text);
                    }
                    TransportEvent::Pong => {
                        ack_deadline = None;
                    }
                    TransportEvent::Closed { code, reason } => break (code, reason),
                },

                command = outbound.recv() => match command {
                    Some(Outbound::Frame(text)) => {
                        if let Err(e) = transport.send_text(text).await {
                            warn!(error = %e, "Failed to send frame");
                            break (CLOSE_ABNORMAL, e.to_string());
                        }
                    }
                    Some(Outbound::Close) | None => {
                        if let Err(e) = transport.close(CLOSE_NORMAL, "Client disconnect").await {
                            debug!(error = %e, "Close handshake failed");
                        }
                        return;
                    }
                },

                _ = next_heartbeat(&mut heartbeat) => {
                    let frame = codec::encode_heartbeat(Utc::now());
                    if let Err(e) = transport.send_text(frame).await {
                        warn!(error = %e, "Failed to send heartbeat");
                        break (CLOSE_ABNORMAL, e.to_string());
                    }
                    debug!("Heartbeat sent");
                    if let (None, Some(timeout)) = (ack_deadline, ack_timeout) {
                        ack_deadline = Some(Instant::now() + timeout);
                    }
                }

                _ = sleep_until(watchdog), if ack_deadline.is_some() => {
                    warn!("Heartbeat not acknowledged, dropping connection");
                    let _ = transport.close(CLOSE_HEARTBEAT_TIMEOUT, "Heartbeat timeout").await;
                    break (CLOSE_HEARTBEAT_TIMEOUT, "heartbeat timeout".to_string());
                }
            }
        };

        drop(transport);
        self.connection_lost(generation, code, reason);
    }

    /// Decode one inbound frame and route it. Never fails the connection.
    fn handle_frame(&self, text: &str) {
        match codec::decode(text) {
            Ok(InboundFrame::LiveUpdate(delta)) => {
                self.dispatcher.dispatch(delta);
            }
            Ok(InboundFrame::HeartbeatAck { timestamp }) => {
                debug!(timestamp = ?timestamp, "Heartbeat acknowledged");
            }
            Ok(InboundFrame::Error { message }) => {
                warn!(message = %message, "Server reported error");
                self.bus.emit(&ClientEvent::Error(ErrorEvent::Server { message }));
            }
            Ok(InboundFrame::Notice { frame_type }) => {
                debug!(frame_type = %frame_type, "Server notice");
            }
            Ok(InboundFrame::Unknown { frame_type }) => {
                warn!(frame_type = %frame_type, "Unknown frame type, ignoring");
            }
            Err(e) => {
                warn!(error = %e, "Failed to decode frame, dropping");
            }
        }
    }

    /// Transport went away without `disconnect()`: schedule a retry or give up.
    fn connection_lost(self: &Arc<Self>, generation: u64, code: u16, reason: String) {
        let (retry_in, attempts) = {
            let mut link = self.lock();
            if link.generation != generation {
                // disconnect() or a newer connect() owns the link now
                return;
            }
            link.outbound = None;
            link.session = None;

            if self.policy.allows(link.attempt) {
                let delay = self.policy.delay_for(link.attempt);
                link.attempt += 1;
                link.state = ConnectionState::Reconnecting;
                (Some(delay), link.attempt)
            } else {
                link.state = ConnectionState::Closed;
                (None, link.attempt)
            }
        };

        match retry_in {
            Some(delay) => warn!(
                code = code,
                reason = %reason,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Live channel lost, scheduling reconnect"
            ),
            None => error!(
                code = code,
                reason = %reason,
                attempts = attempts,
                "Live channel lost, reconnect attempts exhausted"
            ),
        }

        self.bus.emit(&ClientEvent::Disconnected(Disconnect {
            code,
            reason,
            retry_in,
        }));

        let Some(delay) = retry_in else {
            self.bus
                .emit(&ClientEvent::Error(ErrorEvent::ReconnectExhausted { attempts }));
            return;
        };

        let mut link = self.lock();
        if link.generation != generation || link.state != ConnectionState::Reconnecting {
            return;
        }
        let inner = Arc::clone(self);
        link.reconnect = Some(TimerHandle::schedule(delay, async move {
            inner.reconnect(generation).await;
        }));
    }

    /// Fired by the reconnect timer
    async fn reconnect(self: Arc<Self>, generation: u64) {
        {
            let mut link = self.lock();
            if link.generation != generation || link.state != ConnectionState::Reconnecting {
                return;
            }
            // This task is the timer; detach rather than abort ourselves
            link.reconnect = None;
            link.state = ConnectionState::Connecting;
        }

        // Failures are surfaced as events and rescheduled inside establish
        if let Err(e) = self.establish(generation).await {
            debug!(error = %e, "Reconnect attempt failed");
        }
    }
}

/// Next heartbeat tick; never resolves when heartbeats are disabled
async fn next_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
