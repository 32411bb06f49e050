//! Connection manager and the background driver that owns the transport.
//!
//! The manager is the only writer of [`ConnectionState`]. Its driver task
//! runs one connect cycle at a time:
//!
//! 1. up to `reconnection_attempts` transport attempts, `reconnection_delay`
//!    apart; each failure dispatches `connect_error` and, while attempts
//!    remain, moves to `Reconnecting`;
//! 2. after the last failed attempt the state becomes `Failed`,
//!    `reconnect_failed` is dispatched and the driver exits;
//! 3. once connected, inbound frames are decoded and dispatched in arrival
//!    order; losing the transport dispatches `disconnect` and starts a new
//!    cycle (which waits one delay before its first attempt).
//!
//! `disconnect()` is the only cancellation primitive: it interrupts any
//! pending attempt or delay and closes an open transport.

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use serde_json::{Value, json};
use tokio::{
    runtime::Handle,
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
};

use lobby_shared::protocol::{Envelope, PlayerRecord, events};

use crate::{config::ConnectionConfig, error::ConnectionError};

use super::{
    dispatch::Subscribers,
    state::ConnectionState,
    transport::{Connection, Connector, WebSocketConnector},
};

const TRANSITION_CAPACITY: usize = 64;

/// How long `disconnect()` waits for the driver to close the transport.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// State shared between the manager and its driver task.
struct Shared {
    state: watch::Sender<ConnectionState>,
    transitions: broadcast::Sender<ConnectionState>,
    subscribers: Subscribers,
    /// Bumped whenever a driver is started or released. A driver only
    /// writes state while its own epoch is current.
    epoch: AtomicU64,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        self.notify(previous, next);
    }

    /// Retire the current driver and move to `next` in one step.
    fn begin_epoch(&self, next: ConnectionState) -> u64 {
        let mut epoch = 0;
        let mut previous = next;
        self.state.send_modify(|state| {
            epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            previous = std::mem::replace(state, next);
        });
        self.notify(previous, next);
        epoch
    }

    /// Move to `next` only if `epoch` is still current.
    fn advance(&self, epoch: u64, next: ConnectionState) -> bool {
        let mut previous = None;
        self.state.send_if_modified(|state| {
            if !self.is_current(epoch) {
                return false;
            }
            previous = Some(std::mem::replace(state, next));
            true
        });
        match previous {
            Some(previous) => {
                self.notify(previous, next);
                true
            }
            None => false,
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn notify(&self, previous: ConnectionState, next: ConnectionState) {
        // nobody listening for transitions is fine
        let _ = self.transitions.send(next);
        tracing::debug!("Connection state: {} -> {}", previous, next);
    }

    fn emit(&self, event: &str, data: Option<Value>) {
        self.subscribers.dispatch(event, data.as_ref());
    }
}

/// Handle on a running driver task.
struct DriverHandle {
    task: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
    outbound: mpsc::UnboundedSender<String>,
}

/// Owns one logical connection to the server.
///
/// Failures never escape: they are logged and reflected in [`ConnectionState`].
/// Dropping the manager stops its driver and closes the transport.
///
/// # Example
///
/// ```ignore
/// let manager = ConnectionManager::websocket(ConnectionConfig::new("ws://127.0.0.1:5000/ws"));
/// manager.on_player_update(|record| println!("{} joined", record.display_name));
/// manager.connect();
/// // ...
/// manager.disconnect().await;
/// ```
pub struct ConnectionManager {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    driver: Mutex<Option<DriverHandle>>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            config,
            connector,
            shared: Arc::new(Shared {
                state,
                transitions,
                subscribers: Subscribers::default(),
                epoch: AtomicU64::new(0),
            }),
            driver: Mutex::new(None),
        }
    }

    /// Manager backed by the production WebSocket transport.
    pub fn websocket(config: ConnectionConfig) -> Self {
        Self::new(config, Arc::new(WebSocketConnector))
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Current state, updated on every transition (intermediate values may coalesce).
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Every transition from now on, including repeated `Reconnecting`.
    pub fn transitions(&self) -> broadcast::Receiver<ConnectionState> {
        self.shared.transitions.subscribe()
    }

    /// Start a connect cycle.
    ///
    /// No-op while a cycle is running (`Connecting`, `Connected`,
    /// `Reconnecting`). From `Disconnected` or `Failed` a fresh cycle starts
    /// in `Connecting`. Requires a tokio runtime; without one the manager
    /// logs the error and moves to `Failed`.
    pub fn connect(&self) {
        let mut driver = self.lock_driver();

        let current = self.shared.state();
        if current.is_active() {
            tracing::debug!("connect() ignored: connection is already {}", current);
            return;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                let err = ConnectionError::Runtime(e.to_string());
                tracing::error!("Failed to initialize connection to {}: {}", self.config.url, err);
                self.shared.set_state(ConnectionState::Failed);
                return;
            }
        };

        // a driver that ended in Failed has already exited
        if let Some(previous) = driver.take() {
            previous.task.abort();
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let epoch = self.shared.begin_epoch(ConnectionState::Connecting);

        let task = runtime.spawn(
            Driver {
                epoch,
                url: self.config.url.clone(),
                max_attempts: self.config.reconnection_attempts.max(1),
                delay: self.config.reconnection_delay,
                connector: self.connector.clone(),
                shared: self.shared.clone(),
                outbound: outbound_rx,
                shutdown: shutdown_rx,
            }
            .run(),
        );

        *driver = Some(DriverHandle {
            task,
            shutdown: shutdown_tx,
            outbound: outbound_tx,
        });
    }

    /// Stop reconnecting, close the transport and move to `Disconnected`.
    ///
    /// The state reads `Disconnected` as soon as the call starts, while the
    /// old transport may still be closing. A `connect()` issued in that
    /// window starts a fresh cycle that the closing driver cannot overwrite.
    /// Calling it while already disconnected only logs a warning.
    pub async fn disconnect(&self) {
        let handle = {
            let mut driver = self.lock_driver();
            let handle = driver.take();
            if handle.is_some() {
                self.shared.begin_epoch(ConnectionState::Disconnected);
            }
            handle
        };

        let Some(DriverHandle {
            mut task, shutdown, ..
        }) = handle
        else {
            if self.state() == ConnectionState::Failed {
                self.shared.set_state(ConnectionState::Disconnected);
                tracing::info!("Released failed connection to {}", self.config.url);
            } else {
                tracing::warn!("Connection is already disconnected");
            }
            return;
        };

        // the driver may already have exited after exhausting its attempts
        let _ = shutdown.send(());
        match tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Connection driver ended abnormally: {}", e),
            Err(_) => {
                tracing::warn!(
                    "Connection driver did not stop within {:?}; aborting it",
                    CLOSE_TIMEOUT
                );
                task.abort();
            }
        }

        tracing::info!("Disconnected from {}", self.config.url);
    }

    /// Register `handler` for every occurrence of `event`.
    ///
    /// Handlers of the same event run in registration order. Lifecycle
    /// events (`connect`, `connect_error`, `disconnect`, `reconnect`,
    /// `reconnect_failed`) are dispatched by the manager itself; all other
    /// names come from the server. Subscriptions survive reconnects.
    pub fn subscribe<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        let event = event.into();
        tracing::debug!("Listener added for event '{}'", event);
        self.shared.subscribers.add(event, Arc::new(handler));
    }

    /// Typed subscription to `player-update`.
    ///
    /// Payloads that fail validation are dropped with a warning and never
    /// reach `handler`.
    pub fn on_player_update<F>(&self, handler: F)
    where
        F: Fn(PlayerRecord) + Send + Sync + 'static,
    {
        self.subscribe(events::PLAYER_UPDATE, move |data| {
            match PlayerRecord::from_payload(data) {
                Ok(record) => {
                    tracing::debug!("Player update received for '{}'", record.connection_id);
                    handler(record);
                }
                Err(e) => tracing::warn!("Dropping malformed player update: {}", e),
            }
        });
    }

    /// Number of handlers registered for `event`.
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.shared.subscribers.count(event)
    }

    /// Send `event` with an optional payload.
    ///
    /// Only sends while `Connected`; otherwise the message is dropped with a
    /// warning (no queue, no retry). Returns whether the message was handed
    /// to the transport.
    pub fn publish(&self, event: &str, payload: Option<Value>) -> bool {
        let state = self.state();
        if state != ConnectionState::Connected {
            tracing::warn!(
                "Event '{}' was not sent because the connection is {}",
                event,
                state
            );
            return false;
        }

        let frame = match Envelope::new(event, payload).to_json() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Failed to encode event '{}': {}", event, e);
                return false;
            }
        };

        let driver = self.lock_driver();
        match driver.as_ref() {
            Some(handle) if handle.outbound.send(frame).is_ok() => {
                tracing::debug!("Publishing event '{}'", event);
                true
            }
            _ => {
                tracing::warn!("Event '{}' was not sent because the connection closed", event);
                false
            }
        }
    }

    /// Publish `record` as a `player-update`, with the same connected-only guard.
    pub fn publish_player_update(&self, record: &PlayerRecord) -> bool {
        match record.to_payload() {
            Ok(payload) => self.publish(events::PLAYER_UPDATE, Some(payload)),
            Err(e) => {
                tracing::error!("Failed to encode player update: {}", e);
                false
            }
        }
    }

    fn lock_driver(&self) -> MutexGuard<'_, Option<DriverHandle>> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Why a connected session ended.
enum SessionEnd {
    Shutdown,
    Lost(String),
}

/// Background task owning the transport for one `connect()` call.
struct Driver {
    epoch: u64,
    url: String,
    max_attempts: u32,
    delay: Duration,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedReceiver<String>,
    shutdown: oneshot::Receiver<()>,
}

impl Driver {
    async fn run(mut self) {
        let mut lost_before = false;

        loop {
            let Some((connection, attempt)) = self.establish(lost_before).await else {
                return;
            };

            if !self.advance(ConnectionState::Connected) {
                tracing::debug!("Dropping transport opened after disconnect()");
                return;
            }
            tracing::info!("Connected to WebSocket server at {}", self.url);
            self.shared.emit(events::CONNECT, None);
            if lost_before {
                tracing::info!("Reconnected to WebSocket server, attempt {}", attempt);
                self.shared.emit(events::RECONNECT, Some(json!(attempt)));
            }

            match self.pump(connection).await {
                SessionEnd::Shutdown => return,
                SessionEnd::Lost(reason) => {
                    tracing::warn!("Disconnected from WebSocket server: {}", reason);
                    self.discard_pending();
                    if !self.advance(ConnectionState::Reconnecting) {
                        return;
                    }
                    self.shared.emit(events::DISCONNECT, Some(json!(reason)));
                    lost_before = true;
                }
            }
        }
    }

    /// One bounded connect cycle. `None` on shutdown or when attempts run out.
    async fn establish(&mut self, after_loss: bool) -> Option<(Connection, u32)> {
        for attempt in 1..=self.max_attempts {
            if (after_loss || attempt > 1) && !self.pause().await {
                return None;
            }

            tracing::info!(
                "Connecting to {} (attempt {}/{})",
                self.url,
                attempt,
                self.max_attempts
            );
            let result = tokio::select! {
                biased;
                _ = &mut self.shutdown => return None,
                result = self.connector.connect(&self.url) => result,
            };

            match result {
                Ok(connection) => return Some((connection, attempt)),
                Err(e) => {
                    if !self.shared.is_current(self.epoch) {
                        return None;
                    }
                    tracing::error!(
                        "Connection error (attempt {}/{}): {}",
                        attempt,
                        self.max_attempts,
                        e
                    );
                    self.shared
                        .emit(events::CONNECT_ERROR, Some(json!(e.to_string())));
                    if attempt < self.max_attempts {
                        self.advance(ConnectionState::Reconnecting);
                        tracing::info!("Retrying in {:?}", self.delay);
                    }
                }
            }
        }

        tracing::error!(
            "Failed to reconnect to {} after {} attempts",
            self.url,
            self.max_attempts
        );
        if self.advance(ConnectionState::Failed) {
            self.shared.emit(events::RECONNECT_FAILED, None);
        }
        None
    }

    fn advance(&self, next: ConnectionState) -> bool {
        self.shared.advance(self.epoch, next)
    }

    /// Wait out the reconnect delay; `false` if shutdown came first.
    async fn pause(&mut self) -> bool {
        tokio::select! {
            biased;
            _ = &mut self.shutdown => false,
            _ = tokio::time::sleep(self.delay) => true,
        }
    }

    async fn pump(&mut self, connection: Connection) -> SessionEnd {
        let Connection {
            mut reader,
            mut writer,
        } = connection;

        loop {
            tokio::select! {
                biased;
                _ = &mut self.shutdown => {
                    // frames accepted by publish() before disconnect() still go out
                    while let Ok(frame) = self.outbound.try_recv() {
                        if let Err(e) = writer.send_frame(frame).await {
                            tracing::debug!("Failed to flush frame on close: {}", e);
                            break;
                        }
                    }
                    if let Err(e) = writer.close().await {
                        tracing::debug!("Close handshake failed: {}", e);
                    }
                    return SessionEnd::Shutdown;
                }
                frame = reader.next_frame() => match frame {
                    Some(Ok(text)) => dispatch_frame(&self.shared, &text),
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                    None => return SessionEnd::Lost("transport closed".to_string()),
                },
                Some(frame) = self.outbound.recv() => {
                    if let Err(e) = writer.send_frame(frame).await {
                        return SessionEnd::Lost(e.to_string());
                    }
                }
            }
        }
    }

    /// Frames published on a connection that was lost are not replayed.
    fn discard_pending(&mut self) {
        let mut dropped = 0;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!("Discarded {} unsent frame(s) from the lost connection", dropped);
        }
    }
}

fn dispatch_frame(shared: &Shared, text: &str) {
    let envelope = match Envelope::from_json(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Dropping malformed frame: {}", e);
            return;
        }
    };

    if events::is_lifecycle(&envelope.event) {
        tracing::warn!(
            "Dropping server frame with reserved event name '{}'",
            envelope.event
        );
        return;
    }

    tracing::debug!("Received event '{}'", envelope.event);
    if shared
        .subscribers
        .dispatch(&envelope.event, envelope.data.as_ref())
        == 0
    {
        tracing::debug!("No listener for event '{}'", envelope.event);
    }
}
