use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::executor::CallbackExecutor;

/// A connection lifecycle event, delivered to registered listeners on the
/// callback executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The transport came up; the handshake has not necessarily completed yet.
    Connected,
    /// The transport went away, or dialing failed. Reconnect may follow.
    Disconnected,
    /// The `CONNECT` handshake completed; user traffic may flow.
    ServerReady,
}

pub(crate) type Listener = Arc<dyn Fn(ConnectionEvent) + Send + Sync>;

/// A handle returned by [`Client::add_listener`](crate::Client::add_listener).
///
/// Mirrors the cancel-handle idiom used by [`Subscription::close`] and
/// [`Registration::remove`](crate::periodic::Registration::remove): dropping
/// it does nothing on its own, `remove` is the only way to unregister.
///
/// [`Subscription::close`]: crate::Subscription::close
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListenerHandle(u64);

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("next_id", &self.next_id)
            .field("len", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl ListenerRegistry {
    pub(crate) fn add(&mut self, listener: Listener) -> ListenerHandle {
        self.next_id += 1;
        self.listeners.insert(self.next_id, listener);
        ListenerHandle(self.next_id)
    }

    pub(crate) fn remove(&mut self, handle: ListenerHandle) {
        self.listeners.remove(&handle.0);
    }

    pub(crate) fn notify(&self, event: ConnectionEvent, executor: &CallbackExecutor) {
        for listener in self.listeners.values() {
            let listener = Arc::clone(listener);
            executor.submit_listener(Box::new(move || listener(event)));
        }
    }
}
