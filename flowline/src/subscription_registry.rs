use std::{collections::BTreeMap, fmt};

use bytes::Bytes;
use flowline_proto::{QueueGroup, Subject, SubscriptionId};
use tokio::sync::mpsc;

use crate::{
    engine::EngineCommand,
    executor::CallbackExecutor,
    message::{Message, Replier},
    subscription::{Delivery, Handler, Subscription},
};

/// Subject subscriptions, keyed by id. Survives reconnects: the engine
/// re-sends every live entry's `SUB` frame after each handshake instead of
/// clearing this map.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    next_id: u64,
    subscriptions: BTreeMap<u64, (Subscription, Handler)>,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("next_id", &self.next_id)
            .field("len", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}

impl SubscriptionRegistry {
    pub(crate) fn create(
        &mut self,
        subject: Subject,
        queue_group: Option<QueueGroup>,
        max_messages: Option<u64>,
        handler: Handler,
        commands: mpsc::UnboundedSender<EngineCommand>,
    ) -> Subscription {
        self.next_id += 1;
        let id = SubscriptionId::from(self.next_id);
        let subscription = Subscription::new(id, subject, queue_group, max_messages, commands);
        self.subscriptions
            .insert(self.next_id, (subscription.clone(), handler));
        subscription
    }

    pub(crate) fn by_id(&self, id: SubscriptionId) -> Option<&Subscription> {
        self.subscriptions.get(&u64::from(id)).map(|(s, _)| s)
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> Option<Subscription> {
        self.subscriptions.remove(&u64::from(id)).map(|(s, _)| s)
    }

    /// Live subscriptions, in no particular order, used to re-send `SUB`
    /// frames after a reconnect.
    pub(crate) fn snapshot(&self) -> Vec<Subscription> {
        self.subscriptions.values().map(|(s, _)| s.clone()).collect()
    }

    /// Dispatch an inbound `MSG` frame. Logs and drops on an unknown id: a
    /// legitimate race with a subscription the user just closed.
    pub(crate) fn dispatch(
        &mut self,
        id: SubscriptionId,
        subject: Subject,
        reply_to: Option<Subject>,
        body: Bytes,
        replier: Replier,
        executor: &CallbackExecutor,
    ) {
        let Some((subscription, handler)) = self.subscriptions.get(&u64::from(id)) else {
            log::debug!("dropping message for unknown subscription {id}");
            return;
        };

        match subscription.record_delivery() {
            Delivery::Drop => {
                log::debug!("dropping message past max_messages for subscription {id}");
            }
            Delivery::Deliver { auto_close } => {
                let queue_group = subscription.queue_group().cloned();
                let message = Message::new(subject, body, queue_group, reply_to, replier);
                let handler = Handler::clone(handler);
                executor.submit(id, Box::new(move || handler(message)));

                if auto_close {
                    subscription.close();
                    self.subscriptions.remove(&u64::from(id));
                    executor.remove_lane(id);
                }
            }
        }
    }
}
