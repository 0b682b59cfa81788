use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use flowline_proto::{QueueGroup, Subject, SubscriptionId};
use tokio::sync::mpsc;

use crate::{engine::EngineCommand, message::Message};

/// A user-supplied callback invoked once per delivered [`Message`].
pub type Handler = Arc<dyn Fn(Message) + Send + Sync>;

pub(crate) enum Delivery {
    /// Drop the message: the subscription is closed, or `max_messages` was
    /// already reached before this delivery.
    Drop,
    /// Deliver the message. `auto_close` is set when this delivery brought
    /// `received_count` up to `max_messages`.
    Deliver { auto_close: bool },
}

#[derive(Debug)]
struct Inner {
    id: SubscriptionId,
    subject: Subject,
    queue_group: Option<QueueGroup>,
    max_messages: Option<u64>,
    received_count: AtomicU64,
    closed: AtomicBool,
    commands: mpsc::UnboundedSender<EngineCommand>,
}

/// A handle to a live subject subscription.
///
/// Shared between the subscription registry (which holds it to dispatch
/// inbound messages) and user code. Dropping the last clone unsubscribes,
/// the same lazy-unsubscribe idiom a pull-based subscription handle would
/// use, adapted here to a handle with no `Stream` implementation of its own
/// since delivery is push-based onto the callback executor.
#[derive(Debug, Clone)]
pub struct Subscription(Arc<Inner>);

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        subject: Subject,
        queue_group: Option<QueueGroup>,
        max_messages: Option<u64>,
        commands: mpsc::UnboundedSender<EngineCommand>,
    ) -> Self {
        Self(Arc::new(Inner {
            id,
            subject,
            queue_group,
            max_messages,
            received_count: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            commands,
        }))
    }

    /// The subscription id, stringified as the `sid` on the wire.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.0.id
    }

    /// The subject this subscription was created on.
    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.0.subject
    }

    /// The queue group this subscription was created with, if any.
    #[must_use]
    pub fn queue_group(&self) -> Option<&QueueGroup> {
        self.0.queue_group.as_ref()
    }

    /// The delivery cap this subscription was created with, if any.
    #[must_use]
    pub fn max_messages(&self) -> Option<u64> {
        self.0.max_messages
    }

    /// How many messages have been delivered to this subscription so far.
    ///
    /// Monotonic; survives reconnects.
    #[must_use]
    pub fn received_count(&self) -> u64 {
        self.0.received_count.load(Ordering::Acquire)
    }

    /// True once this subscription has been closed, either explicitly or by
    /// reaching `max_messages`.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::Acquire)
    }

    /// Close the subscription. Idempotent.
    pub fn close(&self) {
        if !self.0.closed.swap(true, Ordering::AcqRel) {
            let _ = self.0.commands.send(EngineCommand::Unsubscribe { id: self.0.id });
        }
    }

    /// Record a delivery, enforcing `max_messages`. Called by the
    /// subscription registry under the engine task, never concurrently.
    pub(crate) fn record_delivery(&self) -> Delivery {
        if self.0.closed.load(Ordering::Acquire) {
            return Delivery::Drop;
        }

        let count = self.0.received_count.fetch_add(1, Ordering::AcqRel) + 1;
        match self.0.max_messages {
            Some(max) if count > max => Delivery::Drop,
            Some(max) if count == max => Delivery::Deliver { auto_close: true },
            _ => Delivery::Deliver { auto_close: false },
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.commands.send(EngineCommand::Unsubscribe { id: self.id });
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::{Delivery, Subscription};
    use flowline_proto::Subject;

    fn subscription(max_messages: Option<u64>) -> (Subscription, mpsc::UnboundedReceiver<crate::engine::EngineCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = Subscription::new(1.into(), Subject::from_static("x"), None, max_messages, tx);
        (sub, rx)
    }

    #[test]
    fn auto_closes_at_max_messages() {
        let (sub, _rx) = subscription(Some(2));

        assert!(matches!(
            sub.record_delivery(),
            Delivery::Deliver { auto_close: false }
        ));
        assert!(!sub.is_closed());

        assert!(matches!(
            sub.record_delivery(),
            Delivery::Deliver { auto_close: true }
        ));
    }

    #[test]
    fn drops_once_closed() {
        let (sub, mut rx) = subscription(None);
        sub.close();
        assert!(matches!(sub.record_delivery(), Delivery::Drop));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn drop_sends_unsubscribe_once() {
        let (sub, mut rx) = subscription(None);
        drop(sub);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
