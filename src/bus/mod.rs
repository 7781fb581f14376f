use crate::store::{AppliedChange, ResyncSummary};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error};


/// Event names consumers can register for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    LiveUpdate,
    Resync,
    Connected,
    Disconnected,
    Error,
}

/// Live channel closed underneath us (or by us)
#[derive(Clone, Debug, PartialEq)]
pub struct Disconnect {
    pub code: u16,
    pub reason: String,
    /// Delay until the next scheduled reconnect; `None` means no retry
    pub retry_in: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ErrorEvent {
    /// Connect failure, timeout or send failure
    Transport { message: String },
    /// `{"type":"error"}` frame from the server
    Server { message: String },
    /// Reconnect budget spent; the connection stays Closed until `connect()`
    ReconnectExhausted { attempts: u32 },
}

/// Everything the client publishes to consumers
#[derive(Clone, Debug)]
pub enum ClientEvent {
    LiveUpdate(AppliedChange),
    Resync(ResyncSummary),
    Connected,
    Disconnected(Disconnect),
    Error(ErrorEvent),
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::LiveUpdate(_) => EventKind::LiveUpdate,
            ClientEvent::Resync(_) => EventKind::Resync,
            ClientEvent::Connected => EventKind::Connected,
            ClientEvent::Disconnected(_) => EventKind::Disconnected,
            ClientEvent::Error(_) => EventKind::Error,
        }
    }
}

/// Handle returned by `on`, used to remove that listener again
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// Typed event bus.
///
/// Listeners run synchronously on the emitting task, in registration order.
/// A panicking listener is logged and skipped; the rest still run.
/// Async consumers can `subscribe()` to a broadcast channel instead.
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
    event_tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);

        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            event_tx,
        }
    }

    /// Register a listener for one event kind
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove one listener, or every listener for `kind` when `id` is `None`.
    ///
    /// Returns how many listeners were removed.
    pub fn off(&self, kind: EventKind, id: Option<ListenerId>) -> usize {
        let mut listeners = self.lock();

        match id {
            Some(id) => {
                let Some(list) = listeners.get_mut(&kind) else {
                    return 0;
                };
                let before = list.len();
                list.retain(|(existing, _)| *existing != id);
                before - list.len()
            }
            None => listeners.remove(&kind).map(|list| list.len()).unwrap_or(0),
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Subscribe to every event as an async stream
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.event_tx.subscribe()
    }

    /// Deliver an event to the listeners of its kind, then to broadcast subscribers
    pub fn emit(&self, event: &ClientEvent) {
        let kind = event.kind();

        // Snapshot so listeners may call on/off without deadlocking
        let targets: Vec<(ListenerId, Listener)> =
            self.lock().get(&kind).cloned().unwrap_or_default();

        for (id, listener) in targets {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                error!(
                    event = ?kind,
                    listener = id.0,
                    panic = %panic_message(panic.as_ref()),
                    "Event listener panicked"
                );
            }
        }

        // No subscribers is fine
        if self.event_tx.send(event.clone()).is_err() {
            debug!(event = ?kind, "No broadcast subscribers");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<EventKind, Vec<(ListenerId, Listener)>>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
