//! Connection session state machine.
//!
//! Decides when the watch connection must exist, what goes over it and when
//! to reconnect. It owns no socket and no timer: every input is a
//! [`SessionEvent`] and every output is a list of [`Effect`]s that the driver
//! carries out in order. Socket callbacks carry the generation of the
//! connection attempt that produced them; anything from an older generation
//! is ignored.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::error::WsError;
use super::messages::{ServerMessage, SubscribedResource};
use crate::types::ResourceKey;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket and nothing scheduled.
    Closed,
    /// Socket requested, not yet open.
    Connecting,
    /// Socket open and subscribed.
    Open,
    /// Socket lost; a reconnect is scheduled.
    ReconnectPending,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::ReconnectPending => write!(f, "reconnect-pending"),
        }
    }
}

/// Inputs to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The authenticated user changed; `None` means logged out.
    UserChanged(Option<String>),
    /// The selected context changed; `None` means no context.
    ContextChanged(Option<String>),
    /// The watchlist changed; carries the full new subscribe snapshot.
    WatchlistChanged(Vec<SubscribedResource>),
    /// The socket of the given generation opened.
    Opened(u64),
    /// The socket of the given generation closed, failed or never opened.
    Closed(u64),
    /// A text frame arrived on the socket of the given generation.
    Message(u64, String),
    /// The scheduled reconnect delay elapsed.
    ReconnectElapsed,
}

/// Outputs of the session, to be carried out in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open a socket to the watch endpoint of `context`.
    Connect {
        /// Generation tag for callbacks of this attempt.
        generation: u64,
        /// Context to watch.
        context: String,
    },
    /// Close the current socket.
    Disconnect,
    /// Send a full subscribe snapshot.
    SendSubscribe(Vec<SubscribedResource>),
    /// Arm the reconnect timer.
    ScheduleReconnect(Duration),
    /// Disarm the reconnect timer.
    CancelReconnect,
    /// Replace the state of a watched resource.
    ApplyUpdate {
        /// Resource key.
        key: ResourceKey,
        /// Pushed document.
        document: Value,
    },
    /// Drop a watched resource.
    ApplyDelete {
        /// Resource key.
        key: ResourceKey,
    },
    /// A frame was discarded as unparseable. Already logged.
    ProtocolError,
    /// The server reported an error. Already logged; nothing to undo.
    ServerError(String),
}

/// Watch connection session for one (user, context) pair at a time.
#[derive(Debug, Clone)]
pub struct ConnectionSession {
    reconnect_delay: Duration,
    user: Option<String>,
    context: Option<String>,
    watched: Vec<SubscribedResource>,
    state: ConnectionState,
    generation: u64,
}

impl ConnectionSession {
    /// Creates a closed session.
    #[must_use]
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            reconnect_delay,
            user: None,
            context: None,
            watched: Vec::new(),
            state: ConnectionState::Closed,
            generation: 0,
        }
    }

    /// Returns the connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the generation of the latest connection attempt.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the selected context.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns true if a connection must exist: user set, context set and
    /// something watched.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.user.is_some() && self.context.is_some() && !self.watched.is_empty()
    }

    /// Feeds one event and returns the effects to carry out.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        match event {
            SessionEvent::UserChanged(user) => {
                if self.user == user {
                    return Vec::new();
                }
                self.user = user;
                self.restart()
            }
            SessionEvent::ContextChanged(context) => {
                if self.context == context {
                    return Vec::new();
                }
                self.context = context;
                self.restart()
            }
            SessionEvent::WatchlistChanged(snapshot) => self.on_watchlist(snapshot),
            SessionEvent::Opened(generation) => self.on_opened(generation),
            SessionEvent::Closed(generation) => self.on_closed(generation),
            SessionEvent::Message(generation, text) => self.on_message(generation, &text),
            SessionEvent::ReconnectElapsed => self.on_reconnect_elapsed(),
        }
    }

    /// Closes everything regardless of activation, e.g. on shutdown.
    pub fn shutdown(&mut self) -> Vec<Effect> {
        self.teardown()
    }

    /// The (user, context) pair changed: the old session ends and a new one
    /// starts if the activation rule still holds.
    fn restart(&mut self) -> Vec<Effect> {
        let mut effects = self.teardown();
        if self.is_active() {
            effects.extend(self.connect());
        }
        effects
    }

    fn on_watchlist(&mut self, snapshot: Vec<SubscribedResource>) -> Vec<Effect> {
        self.watched = snapshot;

        if !self.is_active() {
            return self.teardown();
        }

        match self.state {
            ConnectionState::Open => {
                debug!(
                    count = self.watched.len(),
                    "Sending subscribe message (connection already open)"
                );
                vec![Effect::SendSubscribe(self.watched.clone())]
            }
            ConnectionState::Closed => self.connect(),
            // The snapshot goes out on open; a pending reconnect keeps its timer.
            ConnectionState::Connecting | ConnectionState::ReconnectPending => Vec::new(),
        }
    }

    fn on_opened(&mut self, generation: u64) -> Vec<Effect> {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            debug!(generation, "Ignoring open from superseded connection");
            return Vec::new();
        }

        info!(generation, "Watch connection opened");
        self.state = ConnectionState::Open;

        let mut effects = vec![Effect::CancelReconnect];
        if self.watched.is_empty() {
            debug!("No resources to subscribe to");
        } else {
            debug!(count = self.watched.len(), "Sending subscribe message");
            effects.push(Effect::SendSubscribe(self.watched.clone()));
        }
        effects
    }

    fn on_closed(&mut self, generation: u64) -> Vec<Effect> {
        if generation != self.generation
            || !matches!(self.state, ConnectionState::Connecting | ConnectionState::Open)
        {
            debug!(generation, "Ignoring close from superseded connection");
            return Vec::new();
        }

        self.state = ConnectionState::Closed;
        if !self.is_active() {
            info!(generation, "Watch connection closed");
            return Vec::new();
        }

        info!(
            generation,
            delay_ms = self.reconnect_delay.as_millis() as u64,
            "Watch connection lost, scheduling reconnect"
        );
        self.state = ConnectionState::ReconnectPending;
        vec![
            Effect::CancelReconnect,
            Effect::ScheduleReconnect(self.reconnect_delay),
        ]
    }

    fn on_reconnect_elapsed(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::ReconnectPending {
            return Vec::new();
        }

        self.state = ConnectionState::Closed;
        if self.is_active() {
            self.connect()
        } else {
            Vec::new()
        }
    }

    fn on_message(&mut self, generation: u64, text: &str) -> Vec<Effect> {
        if generation != self.generation || self.state != ConnectionState::Open {
            debug!(generation, "Dropping frame from superseded connection");
            return Vec::new();
        }

        let message = match ServerMessage::parse(text) {
            Ok(message) => message,
            Err(err) => {
                let err = WsError::Deserialization(err.to_string());
                warn!(error = %err, frame = %text, "Failed to parse watch message");
                return vec![Effect::ProtocolError];
            }
        };

        match message {
            ServerMessage::Updated { resource } => {
                let key = ResourceKey::of(&resource);
                debug!(key = %key, "Resource updated");
                vec![Effect::ApplyUpdate {
                    key,
                    document: resource,
                }]
            }
            ServerMessage::Deleted { resource } => {
                let key = ResourceKey::of(&resource);
                info!(key = %key, "Resource deleted, removing from watch list");
                vec![Effect::ApplyDelete { key }]
            }
            ServerMessage::Error { error } => {
                let err = WsError::Server(error.clone());
                error!(error = %err, "Watch endpoint reported an error");
                vec![Effect::ServerError(error)]
            }
        }
    }

    fn connect(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::Closed {
            return Vec::new();
        }
        let Some(context) = self.context.clone() else {
            return Vec::new();
        };

        self.generation += 1;
        self.state = ConnectionState::Connecting;
        debug!(generation = self.generation, context = %context, "Opening watch connection");
        vec![Effect::Connect {
            generation: self.generation,
            context,
        }]
    }

    fn teardown(&mut self) -> Vec<Effect> {
        let effects = match self.state {
            ConnectionState::Closed => Vec::new(),
            ConnectionState::Connecting | ConnectionState::Open => vec![Effect::Disconnect],
            ConnectionState::ReconnectPending => vec![Effect::CancelReconnect],
        };
        if !effects.is_empty() {
            info!(state = %self.state, "Tearing down watch connection");
        }
        self.state = ConnectionState::Closed;
        effects
    }
}
