use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

/// Name of the push event carrying a freshly stored message.
pub const NEW_MESSAGE_EVENT: &str = "newMessage";

pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Persistent bidirectional event channel keyed by the authenticated identity.
///
/// Handshake and reconnection belong to the implementation; the client only
/// registers handlers and emits events.
pub trait Channel: Send + Sync {
    /// Register `handler` for `event`. Registering twice delivers twice.
    fn on(&self, event: &str, handler: EventHandler);
    /// Remove every handler registered for `event`.
    fn off(&self, event: &str);
    fn emit(&self, event: &str, payload: Value);
}

/// Capability handing out the channel of the current session, if connected.
pub trait ChannelSource: Send + Sync {
    fn current_channel(&self) -> Option<Arc<dyn Channel>>;
}

/// Source for clients that run without a realtime channel.
pub struct NoChannel;

impl ChannelSource for NoChannel {
    fn current_channel(&self) -> Option<Arc<dyn Channel>> {
        None
    }
}

/// Slot an auth layer fills on connect and clears on logout.
#[derive(Default)]
pub struct SharedChannelSource {
    slot: RwLock<Option<Arc<dyn Channel>>>,
}

impl SharedChannelSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, channel: Arc<dyn Channel>) {
        *self.slot.write() = Some(channel);
    }

    pub fn disconnect(&self) -> Option<Arc<dyn Channel>> {
        self.slot.write().take()
    }
}

impl ChannelSource for SharedChannelSource {
    fn current_channel(&self) -> Option<Arc<dyn Channel>> {
        self.slot.read().clone()
    }
}

/// In-process channel: `emit` calls the registered handlers synchronously.
#[derive(Default)]
pub struct LocalChannel {
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.handlers.lock().get(event).map_or(0, Vec::len)
    }
}

impl Channel for LocalChannel {
    fn on(&self, event: &str, handler: EventHandler) {
        self.handlers
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    fn off(&self, event: &str) {
        self.handlers.lock().remove(event);
    }

    fn emit(&self, event: &str, payload: Value) {
        // Snapshot so a handler may call `on`/`off` without deadlocking.
        let handlers = self.handlers.lock().get(event).cloned().unwrap_or_default();
        if handlers.is_empty() {
            log::debug!("No listener for `{event}`; dropping payload");
        }
        for handler in handlers {
            handler(payload.clone());
        }
    }
}
