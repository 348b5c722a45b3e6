// Auth event bus
//
// Decouples the session core from UI code: the token manager and session
// state publish lifecycle events, interested components subscribe. Backed by
// a broadcast channel, so emission never blocks and never fails the emitting
// operation, even with zero subscribers.

use tokio::sync::broadcast;

/// Event name carried by the session-ended signal.
pub const REFRESH_FAILED_EVENT: &str = "auth:refresh-failed";

/// Event name fired when sign-in state changes.
pub const STATUS_CHANGED_EVENT: &str = "authStatusChanged";

const EVENT_BUS_CAPACITY: usize = 64;

/// Auth lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// The refresh exchange failed and the session is over. Emitted exactly
    /// once per failed refresh cycle.
    RefreshFailed { reason: String },

    /// Sign-in state changed: a sign-in was persisted or auth data was
    /// cleared.
    StatusChanged,

    /// A session key changed in another browsing context. Consumed by
    /// `SessionState` to re-derive auth state; produced externally.
    StorageChanged { key: String },
}

impl AuthEvent {
    /// Wire name of the event, for logging and UI dispatch.
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::RefreshFailed { .. } => REFRESH_FAILED_EVENT,
            AuthEvent::StatusChanged => STATUS_CHANGED_EVENT,
            AuthEvent::StorageChanged { .. } => "storage",
        }
    }
}

/// Broadcast bus for auth lifecycle events.
#[derive(Clone)]
pub struct AuthEventBus {
    tx: broadcast::Sender<AuthEvent>,
}

impl AuthEventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { tx }
    }

    /// Get a receiver for all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: AuthEvent) {
        let name = event.name();
        let receivers = self.tx.send(event).unwrap_or(0);
        tracing::debug!(event = name, receivers, "auth event emitted");
    }
}

impl Default for AuthEventBus {
    fn default() -> Self {
        Self::new()
    }
}
