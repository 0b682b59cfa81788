use std::collections::VecDeque;

use bytes::Bytes;
use flowline_proto::Subject;

/// A publish waiting for the connection to reach `SERVER_READY`.
///
/// Immutable after creation.
#[derive(Debug, Clone)]
pub(crate) struct PendingPublish {
    pub(crate) subject: Subject,
    pub(crate) body: Bytes,
    pub(crate) reply_to: Option<Subject>,
}

/// FIFO of [`PendingPublish`] buffered while the engine is not `SERVER_READY`.
///
/// Owned exclusively by the connection engine task; `enqueue` and `drain`
/// are both O(1)/O(n) on the underlying `VecDeque` with no extra locking,
/// since routing all mutation through one task already serializes every
/// access.
#[derive(Debug, Default)]
pub(crate) struct OutboundQueue {
    queue: VecDeque<PendingPublish>,
}

impl OutboundQueue {
    pub(crate) fn enqueue(&mut self, publish: PendingPublish) {
        self.queue.push_back(publish);
    }

    /// Drains every pending publish in insertion order, emptying the queue.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = PendingPublish> + '_ {
        self.queue.drain(..)
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}
