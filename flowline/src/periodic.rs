use std::sync::{atomic::{AtomicBool, Ordering}, Arc};

/// A handle returned by a periodic publish registration.
///
/// The periodic task itself lives outside the connection engine (spawned by
/// [`Client::publish_periodic`](crate::Client::publish_periodic)); `remove`
/// just flips a shared flag the task checks each tick, so cancellation never
/// has to round-trip through the engine's command channel.
#[derive(Debug, Clone)]
pub struct Registration {
    cancelled: Arc<AtomicBool>,
}

impl Registration {
    pub(crate) fn new() -> (Self, Arc<AtomicBool>) {
        let cancelled = Arc::new(AtomicBool::new(false));
        (
            Self {
                cancelled: Arc::clone(&cancelled),
            },
            cancelled,
        )
    }

    /// Cancel the periodic publish. Silent if already cancelled or the
    /// client is closed.
    pub fn remove(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
