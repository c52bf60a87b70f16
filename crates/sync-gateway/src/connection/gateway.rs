//! Gateway connection
//!
//! Owns at most one transport session. `connect` runs a bounded number of
//! fresh handshakes (Hello, Identify, READY); once one succeeds three tasks
//! take over:
//!
//! - **reader**: decodes every inbound frame and publishes the typed event on
//!   the bus, in receipt order, before reading the next frame
//! - **writer**: drains the outbound queue into the transport
//! - **heartbeat**: sends op 1 at the server-declared interval
//!
//! The connection never reconnects on its own. Closure is reported as
//! [`GatewayEvent::ConnectionClosed`] and the owner decides what to do.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use sync_cache::EventBus;
use sync_common::GatewayConfig;
use sync_core::{CredentialProvider, Snowflake};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval_at, timeout, Instant};

use super::{ConnectError, ConnectionState, GatewayCommands, GatewayError, HandshakeError};
use crate::events::{CloseReason, GatewayEvent, ReadyEvent};
use crate::protocol::{
    GatewayFrame, HelloPayload, IdentifyPayload, LazySubscribePayload, RequestMembersPayload,
};
use crate::subscription::RoomSubscription;
use crate::transport::{BoxedSink, BoxedStream, InboundFrame, Transport};

/// Upper bound on one handshake attempt
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `close` waits for the reader to observe the closure
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Normal closure
const CLIENT_CLOSE_CODE: u16 = 1000;

/// Closure after a missed heartbeat ACK; non-1000 so the server keeps the session
const ZOMBIE_CLOSE_CODE: u16 = 4000;

enum Outbound {
    Frame(String),
    Close(Option<u16>),
}

/// State shared between the handle and its tasks
struct Shared {
    state: RwLock<ConnectionState>,
    /// Last dispatch sequence; 0 until the first dispatch
    sequence: AtomicU64,
    session_id: RwLock<Option<String>>,
    outbound: RwLock<Option<mpsc::Sender<Outbound>>>,
    closing: AtomicBool,
    heartbeat_acked: AtomicBool,
    close_override: Mutex<Option<CloseReason>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            sequence: AtomicU64::new(0),
            session_id: RwLock::new(None),
            outbound: RwLock::new(None),
            closing: AtomicBool::new(false),
            heartbeat_acked: AtomicBool::new(true),
            close_override: Mutex::new(None),
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "Connection state changed");
        }
    }

    fn last_sequence(&self) -> Option<u64> {
        match self.sequence.load(Ordering::SeqCst) {
            0 => None,
            seq => Some(seq),
        }
    }

    /// Parse and decode one text frame. Malformed frames are logged and skipped.
    fn decode(&self, text: &str) -> Option<GatewayEvent> {
        let frame = match GatewayFrame::from_json(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed frame");
                return None;
            }
        };
        if let Some(seq) = frame.s {
            self.sequence.fetch_max(seq, Ordering::SeqCst);
        }
        match GatewayEvent::decode(&frame) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(frame = %frame, error = %e, "Skipping undecodable frame");
                None
            }
        }
    }

    fn send(&self, outbound: Outbound) -> Result<(), GatewayError> {
        let guard = self.outbound.read();
        let sender = guard.as_ref().ok_or(GatewayError::NotConnected)?;
        sender.try_send(outbound).map_err(|e| match e {
            TrySendError::Full(_) => GatewayError::OutboundFull,
            TrySendError::Closed(_) => GatewayError::NotConnected,
        })
    }

    fn send_frame(&self, frame: &GatewayFrame) -> Result<(), GatewayError> {
        self.send(Outbound::Frame(frame.to_json()?))
    }

    fn send_heartbeat(&self) -> Result<(), GatewayError> {
        self.send_frame(&GatewayFrame::heartbeat(self.last_sequence()))
    }
}

/// A successful handshake, ready to hand to the background tasks
struct Handshake {
    sink: BoxedSink,
    stream: BoxedStream,
    hello: HelloPayload,
    ready: ReadyEvent,
}

struct RunningTasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl RunningTasks {
    fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
        self.heartbeat.abort();
    }
}

/// Client side of the gateway session
pub struct GatewayConnection {
    config: GatewayConfig,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    bus: Arc<EventBus<GatewayEvent>>,
    shared: Arc<Shared>,
    tasks: Mutex<Option<RunningTasks>>,
}

impl GatewayConnection {
    pub fn new(
        config: GatewayConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialProvider>,
        bus: Arc<EventBus<GatewayEvent>>,
    ) -> Self {
        Self {
            config,
            transport,
            credentials,
            bus,
            shared: Arc::new(Shared::new()),
            tasks: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn new_shared(
        config: GatewayConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialProvider>,
        bus: Arc<EventBus<GatewayEvent>>,
    ) -> Arc<Self> {
        Arc::new(Self::new(config, transport, credentials, bus))
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn session_id(&self) -> Option<String> {
        self.shared.session_id.read().clone()
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.shared.last_sequence()
    }

    pub fn bus(&self) -> &Arc<EventBus<GatewayEvent>> {
        &self.bus
    }

    /// Connect with a bounded number of handshake attempts.
    ///
    /// Each attempt opens a fresh transport session; there is no backoff
    /// between attempts. An invalid session during the handshake is terminal
    /// and not retried.
    pub async fn connect(&self) -> Result<ReadyEvent, ConnectError> {
        if self.state().is_active() {
            return Err(ConnectError::AlreadyConnected);
        }
        let token = self
            .credentials
            .token()
            .await
            .ok_or(ConnectError::MissingCredential)?;

        self.shared.closing.store(false, Ordering::SeqCst);
        self.shared.sequence.store(0, Ordering::SeqCst);
        self.shared.close_override.lock().take();

        let attempts = self.config.connect_retries.max(1);
        let mut attempt = 0;
        let last = loop {
            attempt += 1;
            self.shared.set_state(if attempt == 1 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting
            });
            tracing::info!(attempt, attempts, url = %self.config.url, "Connecting to gateway");

            let result = timeout(HANDSHAKE_TIMEOUT, self.handshake(&token))
                .await
                .unwrap_or(Err(HandshakeError::Timeout));

            match result {
                Ok(handshake) => return Ok(self.start(handshake)),
                Err(HandshakeError::InvalidSession { resumable }) => {
                    invalidate(&self.shared, self.credentials.as_ref()).await;
                    self.bus.publish(&GatewayEvent::InvalidSession { resumable });
                    return Err(ConnectError::SessionInvalidated);
                }
                Err(e) => {
                    tracing::warn!(attempt, attempts, error = %e, "Gateway handshake failed");
                    if attempt >= attempts {
                        break e;
                    }
                }
            }
        };

        self.shared.set_state(ConnectionState::Disconnected);
        Err(ConnectError::Exhausted { attempts, last })
    }

    /// Read the next decodable event, publishing it before returning.
    /// An invalid session is returned unpublished; `connect` publishes it
    /// after the credential is gone.
    async fn next_event(&self, stream: &mut BoxedStream) -> Result<GatewayEvent, HandshakeError> {
        loop {
            match stream.next_frame().await {
                Some(Ok(InboundFrame::Text(text))) => {
                    if let Some(event) = self.shared.decode(&text) {
                        if !matches!(event, GatewayEvent::InvalidSession { .. }) {
                            self.bus.publish(&event);
                        }
                        return Ok(event);
                    }
                }
                Some(Ok(InboundFrame::Close { code, reason })) => {
                    return Err(HandshakeError::Closed(CloseReason::from_server(code, reason)));
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err(HandshakeError::Closed(CloseReason::lost("stream ended"))),
            }
        }
    }

    async fn handshake(&self, token: &str) -> Result<Handshake, HandshakeError> {
        let (mut sink, mut stream) = self.transport.connect(&self.config.url).await?;

        let hello = loop {
            match self.next_event(&mut stream).await? {
                GatewayEvent::Hello(hello) => break hello,
                GatewayEvent::InvalidSession { resumable } => {
                    return Err(HandshakeError::InvalidSession { resumable });
                }
                other => tracing::debug!(event = other.name(), "Ignoring event before Hello"),
            }
        };

        let identify = GatewayFrame::identify(&IdentifyPayload::new(token))?;
        sink.send(identify.to_json()?).await?;

        let ready = loop {
            match self.next_event(&mut stream).await? {
                GatewayEvent::Ready(ready) => break *ready,
                GatewayEvent::InvalidSession { resumable } => {
                    return Err(HandshakeError::InvalidSession { resumable });
                }
                GatewayEvent::HeartbeatRequested => {
                    let beat = GatewayFrame::heartbeat(self.shared.last_sequence());
                    sink.send(beat.to_json()?).await?;
                }
                _ => {}
            }
        };

        Ok(Handshake {
            sink,
            stream,
            hello,
            ready,
        })
    }

    fn start(&self, handshake: Handshake) -> ReadyEvent {
        let Handshake {
            sink,
            stream,
            hello,
            ready,
        } = handshake;

        let (tx, rx) = mpsc::channel(self.config.outbound_buffer.max(1));
        *self.shared.outbound.write() = Some(tx);
        *self.shared.session_id.write() = Some(ready.session_id.clone());
        self.shared.heartbeat_acked.store(true, Ordering::SeqCst);
        self.shared.set_state(ConnectionState::Connected);

        let period = Duration::from_millis(
            self.config
                .heartbeat_interval_ms
                .unwrap_or(hello.heartbeat_interval)
                .max(1),
        );

        let writer = tokio::spawn(run_writer(sink, rx));
        let heartbeat = tokio::spawn(run_heartbeat(self.shared.clone(), period));
        let reader = tokio::spawn(run_reader(
            self.shared.clone(),
            self.bus.clone(),
            self.credentials.clone(),
            stream,
            heartbeat.abort_handle(),
        ));

        if let Some(previous) = self.tasks.lock().replace(RunningTasks {
            reader,
            writer,
            heartbeat,
        }) {
            previous.abort();
        }

        tracing::info!(
            session_id = %ready.session_id,
            user_id = %ready.user.id,
            rooms = ready.rooms.len(),
            heartbeat_ms = period.as_millis() as u64,
            "Gateway session ready"
        );
        ready
    }

    /// Close the session. The reader publishes a client-initiated
    /// `ConnectionClosed` once the transport winds down.
    pub async fn close(&self) {
        self.shared.closing.store(true, Ordering::SeqCst);
        let _ = self.shared.send(Outbound::Close(Some(CLIENT_CLOSE_CODE)));

        let tasks = self.tasks.lock().take();
        let Some(mut tasks) = tasks else {
            self.shared.set_state(ConnectionState::Closed);
            return;
        };

        if timeout(CLOSE_GRACE, &mut tasks.reader).await.is_err() {
            tracing::warn!("Transport did not close in time, aborting");
            tasks.abort();
            self.shared.outbound.write().take();
            self.shared.set_state(ConnectionState::Closed);
            self.bus
                .publish(&GatewayEvent::ConnectionClosed(CloseReason::client()));
            return;
        }
        tasks.writer.abort();
        tasks.heartbeat.abort();
        self.shared.set_state(ConnectionState::Closed);
    }
}

impl GatewayCommands for GatewayConnection {
    fn update_subscription(
        &self,
        room_id: Snowflake,
        subscription: &RoomSubscription,
    ) -> Result<(), GatewayError> {
        let frame = GatewayFrame::lazy_subscribe(&LazySubscribePayload::new(room_id, subscription))?;
        self.shared.send_frame(&frame)?;
        tracing::debug!(
            room_id = %room_id,
            channels = subscription.channels.len(),
            "Queued roster subscription"
        );
        Ok(())
    }

    fn request_members(&self, request: &RequestMembersPayload) -> Result<(), GatewayError> {
        self.shared
            .send_frame(&GatewayFrame::request_members(request)?)?;
        tracing::debug!(
            rooms = request.room_ids.len(),
            users = request.user_ids.as_ref().map_or(0, Vec::len),
            "Queued member request"
        );
        Ok(())
    }
}

impl Drop for GatewayConnection {
    fn drop(&mut self) {
        if let Some(tasks) = self.tasks.get_mut().take() {
            tasks.abort();
        }
    }
}

impl std::fmt::Debug for GatewayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConnection")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .field("sequence", &self.last_sequence())
            .finish()
    }
}

async fn invalidate(shared: &Shared, credentials: &dyn CredentialProvider) {
    tracing::warn!("Session invalidated, discarding credential");
    credentials.discard().await;
    shared.set_state(ConnectionState::Invalidated);
}

async fn run_writer(mut sink: BoxedSink, mut rx: mpsc::Receiver<Outbound>) {
    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Frame(text) => {
                if let Err(e) = sink.send(text).await {
                    tracing::warn!(error = %e, "Failed to write frame");
                    break;
                }
            }
            Outbound::Close(code) => {
                if let Err(e) = sink.close(code).await {
                    tracing::debug!(error = %e, "Close frame not delivered");
                }
                return;
            }
        }
    }
    let _ = sink.close(None).await;
}

async fn run_heartbeat(shared: Arc<Shared>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        ticker.tick().await;

        if !shared.heartbeat_acked.swap(false, Ordering::SeqCst) {
            tracing::warn!("Heartbeat not acknowledged, closing zombied connection");
            *shared.close_override.lock() =
                Some(CloseReason::lost("heartbeat not acknowledged"));
            let _ = shared.send(Outbound::Close(Some(ZOMBIE_CLOSE_CODE)));
            return;
        }

        if let Err(e) = shared.send_heartbeat() {
            tracing::debug!(error = %e, "Heartbeat loop stopping");
            return;
        }
        tracing::trace!(sequence = ?shared.last_sequence(), "Heartbeat sent");
    }
}

async fn run_reader(
    shared: Arc<Shared>,
    bus: Arc<EventBus<GatewayEvent>>,
    credentials: Arc<dyn CredentialProvider>,
    mut stream: BoxedStream,
    heartbeat: AbortHandle,
) {
    let reason = loop {
        match stream.next_frame().await {
            Some(Ok(InboundFrame::Text(text))) => {
                let Some(event) = shared.decode(&text) else {
                    continue;
                };
                match event {
                    GatewayEvent::HeartbeatAck => {
                        shared.heartbeat_acked.store(true, Ordering::SeqCst);
                    }
                    GatewayEvent::HeartbeatRequested => {
                        if let Err(e) = shared.send_heartbeat() {
                            tracing::debug!(error = %e, "Requested heartbeat not sent");
                        }
                    }
                    GatewayEvent::InvalidSession { resumable } => {
                        tracing::debug!(resumable, "Invalid session received");
                        invalidate(&shared, credentials.as_ref()).await;
                        bus.publish(&event);
                        let _ = shared.send(Outbound::Close(Some(CLIENT_CLOSE_CODE)));
                        shared.outbound.write().take();
                        heartbeat.abort();
                        return;
                    }
                    _ => {}
                }
                bus.publish(&event);
            }
            Some(Ok(InboundFrame::Close { code, reason })) => {
                break CloseReason::from_server(code, reason);
            }
            Some(Err(e)) => break CloseReason::lost(e),
            None => break CloseReason::lost("stream ended"),
        }
    };

    heartbeat.abort();
    shared.outbound.write().take();

    let reason = if shared.closing.load(Ordering::SeqCst) {
        shared.set_state(ConnectionState::Closed);
        CloseReason::client()
    } else {
        shared.set_state(ConnectionState::Disconnected);
        shared.close_override.lock().take().unwrap_or(reason)
    };

    tracing::info!(
        reason = %reason,
        should_reconnect = reason.should_reconnect(),
        "Gateway connection closed"
    );
    bus.publish(&GatewayEvent::ConnectionClosed(reason));
}
