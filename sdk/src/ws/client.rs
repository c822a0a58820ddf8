//! Watch client implementation.
//!
//! A single task owns the watchlist, the update flags, the panel state, the
//! connection session, the socket and the reconnect timer. Callers talk to it
//! through a cloneable [`WatchHandle`] and observe it through
//! [`WatchSnapshot`]s published on a `tokio::sync::watch` channel.

use std::collections::{BTreeSet, VecDeque};
use std::future;
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::config::WatchConfig;
use super::error::WsError;
use super::messages::{ClientMessage, SubscribedResource};
use super::session::{ConnectionSession, ConnectionState, Effect, SessionEvent};
use crate::error::SdkError;
use crate::flags::UpdateFlags;
use crate::metrics::WatchMetrics;
use crate::panel::{Notification, PanelState};
use crate::storage::Storage;
use crate::types::{ResourceDescriptor, ResourceKey, WatchedResource};
use crate::watchlist::{UpdateOutcome, Watchlist};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 1000;

/// What consumers see of the watch client.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchSnapshot {
    /// Pinned resources in pin order.
    pub resources: Vec<WatchedResource>,
    /// Keys flagged as recently updated.
    pub updating: BTreeSet<ResourceKey>,
    /// Whether the panel is collapsed.
    pub collapsed: bool,
    /// Listed notifications.
    pub notifications: Vec<Notification>,
    /// Connection state.
    pub connection: ConnectionState,
}

impl WatchSnapshot {
    /// Returns the entry for a key.
    #[must_use]
    pub fn get(&self, key: &ResourceKey) -> Option<&WatchedResource> {
        self.resources.iter().find(|r| &r.key == key)
    }
}

enum Command {
    Add(ResourceDescriptor, oneshot::Sender<bool>),
    Remove(ResourceKey, oneshot::Sender<()>),
    ClearAll(oneshot::Sender<()>),
    SetUser(Option<String>, oneshot::Sender<()>),
    SetContext(Option<String>, oneshot::Sender<()>),
    ToggleCollapse(oneshot::Sender<bool>),
    RemoveNotification(String, oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

enum SocketEvent {
    Opened { generation: u64, sink: WsSink },
    Frame { generation: u64, text: String },
    Closed { generation: u64 },
    ReconnectElapsed { timer: u64 },
}

/// Entry point for starting the watch client.
#[derive(Debug)]
pub struct WatchClient;

impl WatchClient {
    /// Loads persisted state and spawns the client task.
    ///
    /// Must be called from within a tokio runtime. The task stops when
    /// [`WatchHandle::shutdown`] is called or every handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn spawn(config: WatchConfig, storage: Arc<dyn Storage>) -> Result<WatchHandle, WsError> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let metrics = Arc::new(WatchMetrics::new());

        let watchlist = Watchlist::load(Arc::clone(&storage));
        let panel = PanelState::load(storage, config.notifications);
        let mut session = ConnectionSession::new(config.reconnect_delay);
        // No user or context yet, so this only seeds the snapshot.
        session.handle(SessionEvent::WatchlistChanged(watchlist.subscriptions()));

        let mut actor = Actor {
            flags: UpdateFlags::new(config.flash_window),
            config,
            watchlist,
            panel,
            session,
            metrics: Arc::clone(&metrics),
            snapshots: watch::Sender::new(WatchSnapshot {
                resources: Vec::new(),
                updating: BTreeSet::new(),
                collapsed: false,
                notifications: Vec::new(),
                connection: ConnectionState::Closed,
            }),
            event_tx,
            sink: None,
            socket_task: None,
            timer: None,
            timer_seq: 0,
            connected_at: None,
        };
        actor.publish();
        let snapshots = actor.snapshots.subscribe();

        tokio::spawn(actor.run(command_rx, event_rx));

        Ok(WatchHandle {
            commands: command_tx,
            snapshots,
            metrics,
        })
    }
}

/// Cloneable handle to a running watch client.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<WatchSnapshot>,
    metrics: Arc<WatchMetrics>,
}

impl WatchHandle {
    /// Pins a resource. Returns false if it is invalid or already pinned.
    ///
    /// # Errors
    ///
    /// Returns an error if the client has stopped.
    pub async fn add(&self, descriptor: impl Into<ResourceDescriptor>) -> Result<bool, SdkError> {
        let descriptor = descriptor.into();
        self.request(|reply| Command::Add(descriptor, reply)).await
    }

    /// Unpins a resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the client has stopped.
    pub async fn remove(&self, key: ResourceKey) -> Result<(), SdkError> {
        self.request(|reply| Command::Remove(key, reply)).await
    }

    /// Unpins everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the client has stopped.
    pub async fn clear_all(&self) -> Result<(), SdkError> {
        self.request(Command::ClearAll).await
    }

    /// Sets or clears the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns an error if the client has stopped.
    pub async fn set_user(&self, user: Option<String>) -> Result<(), SdkError> {
        self.request(|reply| Command::SetUser(user, reply)).await
    }

    /// Sets or clears the selected context.
    ///
    /// # Errors
    ///
    /// Returns an error if the client has stopped.
    pub async fn set_context(&self, context: Option<String>) -> Result<(), SdkError> {
        self.request(|reply| Command::SetContext(context, reply)).await
    }

    /// Flips the panel collapse flag. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the client has stopped.
    pub async fn toggle_collapse(&self) -> Result<bool, SdkError> {
        self.request(Command::ToggleCollapse).await
    }

    /// Dismisses a notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the client has stopped.
    pub async fn remove_notification(&self, id: impl Into<String>) -> Result<(), SdkError> {
        let id = id.into();
        self.request(|reply| Command::RemoveNotification(id, reply))
            .await
    }

    /// Closes the connection and stops the client task.
    ///
    /// # Errors
    ///
    /// Returns an error if the client had already stopped.
    pub async fn shutdown(&self) -> Result<(), SdkError> {
        self.request(Command::Shutdown).await
    }

    /// Returns the latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> WatchSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Returns a receiver notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WatchSnapshot> {
        self.snapshots.clone()
    }

    /// Returns the client metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<WatchMetrics> {
        Arc::clone(&self.metrics)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SdkError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SdkError::ClientStopped)?;
        response.await.map_err(|_| SdkError::ClientStopped)
    }
}

struct Actor {
    config: WatchConfig,
    watchlist: Watchlist,
    flags: UpdateFlags,
    panel: PanelState,
    session: ConnectionSession,
    metrics: Arc<WatchMetrics>,
    snapshots: watch::Sender<WatchSnapshot>,
    event_tx: mpsc::Sender<SocketEvent>,
    sink: Option<WsSink>,
    socket_task: Option<JoinHandle<()>>,
    timer: Option<(u64, JoinHandle<()>)>,
    timer_seq: u64,
    connected_at: Option<Instant>,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::Receiver<SocketEvent>,
    ) {
        loop {
            let flag_deadline = self.flags.next_deadline();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown(reply)) => {
                        self.stop().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.on_command(command).await,
                    None => {
                        self.stop().await;
                        break;
                    }
                },
                Some(event) = events.recv() => self.on_socket_event(event).await,
                () = until(flag_deadline) => {
                    self.flags.prune(Instant::now());
                }
            }

            self.publish();
        }

        debug!("Watch client stopped");
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Add(descriptor, reply) => {
                let added = self.watchlist.add(descriptor);
                if added {
                    self.watchlist_changed().await;
                }
                let _ = reply.send(added);
            }
            Command::Remove(key, reply) => {
                if self.watchlist.remove(&key) {
                    self.watchlist_changed().await;
                }
                let _ = reply.send(());
            }
            Command::ClearAll(reply) => {
                let had_entries = !self.watchlist.is_empty();
                self.watchlist.clear_all();
                if had_entries {
                    self.watchlist_changed().await;
                }
                let _ = reply.send(());
            }
            Command::SetUser(user, reply) => {
                self.feed(SessionEvent::UserChanged(user)).await;
                let _ = reply.send(());
            }
            Command::SetContext(context, reply) => {
                self.feed(SessionEvent::ContextChanged(context)).await;
                let _ = reply.send(());
            }
            Command::ToggleCollapse(reply) => {
                let _ = reply.send(self.panel.toggle_collapse());
            }
            Command::RemoveNotification(id, reply) => {
                self.panel.remove_notification(&id);
                let _ = reply.send(());
            }
            // Handled by the run loop.
            Command::Shutdown(reply) => {
                let _ = reply.send(());
            }
        }
    }

    async fn on_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Opened { generation, sink } => {
                if generation != self.session.generation()
                    || self.session.state() != ConnectionState::Connecting
                {
                    debug!(generation, "Closing socket from superseded connection");
                    close_sink(sink);
                    return;
                }
                self.sink = Some(sink);
                self.connected_at = Some(Instant::now());
                self.metrics.record_connected();
                self.feed(SessionEvent::Opened(generation)).await;
            }
            SocketEvent::Frame { generation, text } => {
                self.feed(SessionEvent::Message(generation, text)).await;
            }
            SocketEvent::Closed { generation } => {
                if generation == self.session.generation() {
                    self.sink = None;
                    self.connected_at = None;
                    self.socket_task = None;
                }
                self.feed(SessionEvent::Closed(generation)).await;
            }
            SocketEvent::ReconnectElapsed { timer } => {
                if self.timer.as_ref().map(|(id, _)| *id) != Some(timer) {
                    return;
                }
                self.timer = None;
                self.feed(SessionEvent::ReconnectElapsed).await;
            }
        }
    }

    async fn watchlist_changed(&mut self) {
        let snapshot = self.watchlist.subscriptions();
        self.feed(SessionEvent::WatchlistChanged(snapshot)).await;
    }

    /// Feeds an event to the session and carries out the effects, including
    /// any follow-up events those effects produce.
    async fn feed(&mut self, event: SessionEvent) {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            for effect in self.session.handle(event) {
                if let Some(follow_up) = self.apply(effect).await {
                    pending.push_back(follow_up);
                }
            }
        }
    }

    async fn apply(&mut self, effect: Effect) -> Option<SessionEvent> {
        match effect {
            Effect::Connect {
                generation,
                context,
            } => return self.connect(generation, &context),
            Effect::Disconnect => self.disconnect(),
            Effect::SendSubscribe(resources) => {
                if let Err(err) = self.send_subscribe(resources).await {
                    // The reader sees the broken socket and reports the close.
                    warn!(error = %err, "Failed to send subscribe message");
                }
            }
            Effect::ScheduleReconnect(delay) => self.schedule_reconnect(delay),
            Effect::CancelReconnect => self.cancel_reconnect(),
            Effect::ApplyUpdate { key, document } => self.apply_update(key, document),
            Effect::ApplyDelete { key } => {
                if self.watchlist.apply_delete(&key) {
                    self.metrics.record_delete();
                    return Some(SessionEvent::WatchlistChanged(
                        self.watchlist.subscriptions(),
                    ));
                }
            }
            Effect::ProtocolError => self.metrics.record_protocol_error(),
            Effect::ServerError(_) => self.metrics.record_server_error(),
        }
        None
    }

    fn connect(&mut self, generation: u64, context: &str) -> Option<SessionEvent> {
        self.metrics.record_connect_attempt();

        let url = match self.config.watch_url(context) {
            Ok(url) => url,
            Err(err) => {
                warn!(error = %err, "Cannot build watch URL");
                return Some(SessionEvent::Closed(generation));
            }
        };

        if let Some(task) = self.socket_task.take() {
            task.abort();
        }

        info!(url = %url, generation, "Connecting to watch endpoint");
        let tx = self.event_tx.clone();
        self.socket_task = Some(tokio::spawn(run_socket(url, generation, tx)));
        None
    }

    fn disconnect(&mut self) {
        if let Some(task) = self.socket_task.take() {
            task.abort();
        }
        if let Some(sink) = self.sink.take() {
            close_sink(sink);
        }
        self.connected_at = None;
    }

    async fn send_subscribe(&mut self, resources: Vec<SubscribedResource>) -> Result<(), WsError> {
        let count = resources.len();
        let json = serde_json::to_string(&ClientMessage::Subscribe { resources })
            .map_err(|e| WsError::Serialization(e.to_string()))?;

        let sink = self.sink.as_mut().ok_or(WsError::NotConnected)?;
        sink.send(Message::Text(json.into()))
            .await
            .map_err(|e| WsError::SendFailed(e.to_string()))?;

        self.metrics.record_subscribe();
        debug!(count, "Subscribe message sent");
        Ok(())
    }

    fn schedule_reconnect(&mut self, delay: std::time::Duration) {
        self.cancel_reconnect();
        self.metrics.record_reconnect_scheduled();

        self.timer_seq += 1;
        let timer = self.timer_seq;
        let tx = self.event_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SocketEvent::ReconnectElapsed { timer }).await;
        });
        self.timer = Some((timer, task));
    }

    fn cancel_reconnect(&mut self) {
        if let Some((_, task)) = self.timer.take() {
            task.abort();
        }
    }

    fn apply_update(&mut self, key: ResourceKey, document: serde_json::Value) {
        match self.watchlist.apply_update(&key, document) {
            UpdateOutcome::Applied => {
                self.metrics.record_update();
                let now = Instant::now();
                self.flags.mark(key.clone(), now);

                let name = self
                    .watchlist
                    .get(&key)
                    .map(WatchedResource::display_name)
                    .unwrap_or_else(|| key.to_string());
                self.panel.on_update(&key, &name, self.connected_at, now);
            }
            UpdateOutcome::Stale => self.metrics.record_stale_update(),
        }
    }

    async fn stop(&mut self) {
        let effects = self.session.shutdown();
        for effect in effects {
            self.apply(effect).await;
        }
        self.cancel_reconnect();
        self.disconnect();
        info!("Watch client shut down");
    }

    fn snapshot(&self) -> WatchSnapshot {
        WatchSnapshot {
            resources: self.watchlist.entries().to_vec(),
            updating: self.flags.active(Instant::now()),
            collapsed: self.panel.is_collapsed(),
            notifications: self.panel.notifications().to_vec(),
            connection: self.session.state(),
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

/// Connects, announces the sink, then forwards frames until the socket ends.
async fn run_socket(url: String, generation: u64, tx: mpsc::Sender<SocketEvent>) {
    let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(err) => {
            let err = WsError::Connection(err.to_string());
            warn!(error = %err, generation, "Watch connection failed");
            let _ = tx.send(SocketEvent::Closed { generation }).await;
            return;
        }
    };

    let (sink, mut source) = stream.split();
    if tx.send(SocketEvent::Opened { generation, sink }).await.is_err() {
        return;
    }

    while let Some(result) = source.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let event = SocketEvent::Frame {
                    generation,
                    text: text.as_str().to_owned(),
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            Ok(Message::Close(frame)) => {
                debug!(generation, ?frame, "Watch connection closed by server");
                break;
            }
            Err(err) => {
                let err = WsError::from(err);
                debug!(error = %err, generation, "Watch connection dropped");
                break;
            }
            _ => {}
        }
    }

    let _ = tx.send(SocketEvent::Closed { generation }).await;
}

fn close_sink(mut sink: WsSink) {
    tokio::spawn(async move {
        let _ = sink.send(Message::Close(None)).await;
        let _ = sink.close().await;
    });
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}
