//! Transport connection: one live channel per session, with reconnect.
//!
//! [`LiveChannel`] is owned by the consumer that watches sessions. Opening a
//! session spawns one driver task that connects, decodes frames and invokes
//! the registered [`SessionSubscriber`] sequentially, in receipt order.
//!
//! The driver follows the [`ConnectionState`] machine:
//! `connecting → connected ⇄ reconnecting → disconnected`, with `closed`
//! reachable from anywhere through [`ChannelHandle::close`].
//!
//! Guarantees:
//! - once `close()` returns, no new frame is read from the connection; a
//!   frame the driver was already decoding or dispatching on another worker
//!   may still reach the subscriber, but nothing after it
//! - nothing is delivered or synthesized while reconnecting
//! - a frame handed to the subscriber is never handed again by the same
//!   connection instance
//! - after a completion event, losing the connection for any reason (peer
//!   close, idle timeout, failed ping) ends the channel instead of triggering
//!   a reconnect

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::connector::{Connection, Connector, Inbound, WsConnector};
use super::decoder::{Decoded, decode_frame};
use super::event::{Event, SessionId};
use super::state::ConnectionState;
use super::subscriber::SessionSubscriber;
use crate::errors::{OpenError, TransportError};

/// How long a best-effort close frame may take before the socket is dropped.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Reconnect policy: exponential backoff with a cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    /// Consecutive reconnect attempts allowed before giving up.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

/// Tunables for every channel opened by one [`LiveChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Bound on each connection attempt.
    pub connect_timeout: Duration,
    /// Ping cadence once connected; `None` disables heartbeats.
    pub heartbeat_interval: Option<Duration>,
    /// Silence after which a connection is treated as lost. Only checked on
    /// heartbeat ticks.
    pub idle_timeout: Duration,
    /// Send one ping right after connecting.
    pub probe_on_connect: bool,
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Some(Duration::from_secs(30)),
            idle_timeout: Duration::from_secs(90),
            probe_on_connect: true,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

struct HandleInner {
    session: SessionId,
    id: Uuid,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    done: CancellationToken,
    closed: AtomicBool,
}

impl HandleInner {
    /// Publish `next` if the state machine allows it from the current state.
    fn transition(&self, next: ConnectionState) -> bool {
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        })
    }
}

/// Handle to one open channel. Cheap to clone; all clones refer to the same
/// channel.
#[derive(Clone)]
pub struct ChannelHandle {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("session", &self.inner.session)
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

impl ChannelHandle {
    fn new(session: SessionId) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(HandleInner {
                session,
                id: Uuid::new_v4(),
                state,
                cancel: CancellationToken::new(),
                done: CancellationToken::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.inner.session
    }

    /// Unique id of this handle, distinct across re-opens of the same session.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Observable connection state, separate from session progress.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Whether the driver task is still running.
    pub fn is_active(&self) -> bool {
        !self.is_closed() && !self.inner.done.is_cancelled()
    }

    /// Close the channel. Always succeeds; later calls are no-ops.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.cancel.cancel();
        self.inner.transition(ConnectionState::Closed);
        debug!(session = %self.inner.session, handle = %self.inner.id, "channel closed");
    }

    /// Wait until the driver task has exited.
    pub async fn wait(&self) {
        self.inner.done.cancelled().await;
    }
}

/// Consumer-owned registry of live channels, at most one per session id.
pub struct LiveChannel {
    connector: Arc<dyn Connector>,
    settings: ConnectionSettings,
    channels: HashMap<SessionId, ChannelHandle>,
}

impl LiveChannel {
    pub fn new(connector: impl Connector, settings: ConnectionSettings) -> Self {
        Self {
            connector: Arc::new(connector),
            settings,
            channels: HashMap::new(),
        }
    }

    /// Channel over WebSockets addressed by `url_template` (see [`WsConnector`]).
    pub fn websocket(url_template: impl Into<String>, settings: ConnectionSettings) -> Self {
        Self::new(WsConnector::new(url_template), settings)
    }

    /// Open a channel for `session_id`, registering `subscriber` for its
    /// events. If an active channel already exists for the id, its handle
    /// is returned and `subscriber` is dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        &mut self,
        session_id: &str,
        subscriber: impl SessionSubscriber,
    ) -> Result<ChannelHandle, OpenError> {
        let session = SessionId::new(session_id)?;
        self.open_session(session, subscriber)
    }

    pub fn open_session(
        &mut self,
        session: SessionId,
        subscriber: impl SessionSubscriber,
    ) -> Result<ChannelHandle, OpenError> {
        if let Some(existing) = self.channels.get(&session)
            && existing.is_active()
        {
            debug!(session = %session, handle = %existing.id(), "channel already open, reusing handle");
            return Ok(existing.clone());
        }

        self.connector
            .validate(&session)
            .map_err(|e| OpenError::InvalidEndpoint {
                session: session.to_string(),
                message: e.to_string(),
            })?;

        let handle = ChannelHandle::new(session.clone());
        handle.inner.transition(ConnectionState::Connecting);

        let driver = Driver {
            handle: handle.inner.clone(),
            connector: self.connector.clone(),
            settings: self.settings.clone(),
            subscriber: Box::new(subscriber),
            finished: false,
        };
        tokio::spawn(driver.run());

        info!(session = %session, handle = %handle.id(), endpoint = %self.connector.endpoint(&session), "opening live channel");
        if let Some(stale) = self.channels.insert(session, handle.clone()) {
            stale.close();
        }
        Ok(handle)
    }

    /// Close `handle` and forget it. Safe to call repeatedly.
    pub fn close(&mut self, handle: &ChannelHandle) {
        handle.close();
        let registered = self
            .channels
            .get(handle.session_id())
            .is_some_and(|h| h.id() == handle.id());
        if registered {
            self.channels.remove(handle.session_id());
        }
    }

    /// Close every registered channel.
    pub fn close_all(&mut self) {
        for (_, handle) in self.channels.drain() {
            handle.close();
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.close_all();
    }
}

// ── Driver ───────────────────────────────────────────────────────────

enum Attempt {
    Connected(Box<dyn Connection>),
    Failed(TransportError),
    Cancelled,
}

enum PumpEnd {
    Cancelled,
    /// Peer closed after a completion event was delivered.
    Finished,
    Lost(TransportError),
}

struct Driver {
    handle: Arc<HandleInner>,
    connector: Arc<dyn Connector>,
    settings: ConnectionSettings,
    subscriber: Box<dyn SessionSubscriber>,
    /// A completion event has been delivered.
    finished: bool,
}

impl Driver {
    async fn run(mut self) {
        let _done = self.handle.done.clone().drop_guard();
        let session = self.handle.session.clone();

        if self.cancelled() {
            return;
        }
        self.subscriber.on_connection_state(ConnectionState::Connecting);

        let mut failures: u32 = 0;
        let mut retries: u32 = 0;

        loop {
            match self.connect().await {
                Attempt::Cancelled => return,
                Attempt::Failed(err) => {
                    failures += 1;
                    warn!(session = %session, attempt = failures, error = %err, "connection attempt failed");
                    self.report(&err);
                    if err.is_final() || !self.settings.reconnect.enabled {
                        self.transition(ConnectionState::Disconnected);
                        return;
                    }
                }
                Attempt::Connected(conn) => {
                    failures = 0;
                    retries = 0;
                    self.transition(ConnectionState::Connected);
                    match self.pump(conn).await {
                        PumpEnd::Cancelled => return,
                        PumpEnd::Finished => {
                            info!(session = %session, "channel ended after completion");
                            self.transition(ConnectionState::Disconnected);
                            return;
                        }
                        PumpEnd::Lost(err) => {
                            warn!(session = %session, error = %err, "live connection lost");
                            if !self.settings.reconnect.enabled {
                                self.report(&err);
                                self.transition(ConnectionState::Disconnected);
                                return;
                            }
                        }
                    }
                }
            }

            let policy = self.settings.reconnect.clone();
            if !policy.enabled || retries >= policy.max_attempts {
                let err = TransportError::RetriesExhausted { attempts: failures };
                warn!(session = %session, attempts = failures, "giving up on live channel");
                self.report(&err);
                self.transition(ConnectionState::Disconnected);
                return;
            }

            retries += 1;
            let delay = policy.delay_for(retries);
            self.transition(ConnectionState::Reconnecting);
            debug!(session = %session, retry = retries, delay_ms = delay.as_millis() as u64, "scheduling reconnect");

            tokio::select! {
                biased;
                _ = self.handle.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn cancelled(&self) -> bool {
        self.handle.cancel.is_cancelled()
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.cancelled() {
            return;
        }
        if self.handle.transition(next) {
            self.subscriber.on_connection_state(next);
        }
    }

    fn report(&mut self, err: &TransportError) {
        if !self.cancelled() {
            self.subscriber.on_transport_error(err);
        }
    }

    async fn connect(&mut self) -> Attempt {
        let session = &self.handle.session;
        let timeout = self.settings.connect_timeout;
        tokio::select! {
            biased;
            _ = self.handle.cancel.cancelled() => Attempt::Cancelled,
            result = tokio::time::timeout(timeout, self.connector.connect(session)) => match result {
                Ok(Ok(conn)) => Attempt::Connected(conn),
                Ok(Err(err)) => Attempt::Failed(err),
                Err(_) => Attempt::Failed(TransportError::ConnectTimeout {
                    endpoint: self.connector.endpoint(session),
                    timeout,
                }),
            }
        }
    }

    async fn pump(&mut self, mut conn: Box<dyn Connection>) -> PumpEnd {
        let session = self.handle.session.clone();
        let instance = Uuid::new_v4();
        let mut delivered: u64 = 0;
        debug!(session = %session, connection = %instance, "connected");

        if self.settings.probe_on_connect {
            if let Err(err) = conn.ping().await {
                return PumpEnd::Lost(err);
            }
        }

        let mut heartbeat = self
            .settings
            .heartbeat_interval
            .filter(|period| !period.is_zero())
            .map(|period| tokio::time::interval_at(Instant::now() + period, period));
        let idle_timeout = self.settings.idle_timeout;
        let mut last_seen = Instant::now();

        let end = loop {
            tokio::select! {
                biased;
                _ = self.handle.cancel.cancelled() => break PumpEnd::Cancelled,
                _ = tick(&mut heartbeat) => {
                    if last_seen.elapsed() >= idle_timeout {
                        break PumpEnd::Lost(TransportError::IdleTimeout(idle_timeout));
                    }
                    if let Err(err) = conn.ping().await {
                        break PumpEnd::Lost(err);
                    }
                }
                inbound = conn.recv() => match inbound {
                    Ok(Inbound::Frame(raw)) => {
                        last_seen = Instant::now();
                        if self.cancelled() {
                            break PumpEnd::Cancelled;
                        }
                        delivered += 1;
                        self.deliver(&raw, instance, delivered);
                    }
                    Ok(Inbound::Keepalive) => last_seen = Instant::now(),
                    Ok(Inbound::Closed) if self.finished => break PumpEnd::Finished,
                    Ok(Inbound::Closed) => {
                        break PumpEnd::Lost(TransportError::ConnectionLost(
                            "closed by backend".to_string(),
                        ));
                    }
                    Err(_) if self.finished => break PumpEnd::Finished,
                    Err(err) => break PumpEnd::Lost(err),
                }
            }
        };

        let _ = tokio::time::timeout(CLOSE_GRACE, conn.close()).await;
        debug!(session = %session, connection = %instance, frames = delivered, "connection instance ended");
        match end {
            PumpEnd::Lost(err) if self.finished => {
                debug!(session = %session, error = %err, "connection dropped after completion");
                PumpEnd::Finished
            }
            other => other,
        }
    }

    fn deliver(&mut self, raw: &str, instance: Uuid, seq: u64) {
        match decode_frame(raw) {
            Decoded::Event(event) => self.dispatch(&event),
            Decoded::Malformed(frame) => {
                warn!(
                    session = %self.handle.session,
                    connection = %instance,
                    seq,
                    reason = %frame.reason,
                    frame = %frame.excerpt,
                    "dropping malformed frame"
                );
            }
        }
    }

    fn dispatch(&mut self, event: &Event) {
        if self.cancelled() {
            return;
        }
        match event {
            Event::Progress(progress) => self.subscriber.on_progress(progress),
            Event::Log(line) => self.subscriber.on_log(line),
            Event::Error(error) => self.subscriber.on_error(error),
            Event::Completion(completion) => {
                self.finished = true;
                self.subscriber.on_completion(completion);
            }
        }
    }
}

/// Next heartbeat tick, or never when heartbeats are disabled.
async fn tick(heartbeat: &mut Option<tokio::time::Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
