use std::time::Duration;

use bytes::Bytes;
use flowline_proto::{QueueGroup, Subject};
use tokio::sync::mpsc;

use crate::engine::EngineCommand;

/// A handle used by [`Message::reply`] to publish back to the requester
/// without going through [`Client`](crate::Client) or blocking the engine.
#[derive(Debug, Clone)]
pub(crate) struct Replier {
    commands: mpsc::UnboundedSender<EngineCommand>,
}

impl Replier {
    pub(crate) fn new(commands: mpsc::UnboundedSender<EngineCommand>) -> Self {
        Self { commands }
    }

    fn publish(&self, subject: Subject, body: Bytes) {
        let _ = self.commands.send(EngineCommand::Publish {
            subject,
            body,
            reply_to: None,
        });
    }
}

/// A message delivered to a subscription's handler.
#[derive(Debug, Clone)]
pub struct Message {
    subject: Subject,
    body: Bytes,
    queue_group: Option<QueueGroup>,
    reply_to: Option<Subject>,
    replier: Replier,
}

impl Message {
    pub(crate) fn new(
        subject: Subject,
        body: Bytes,
        queue_group: Option<QueueGroup>,
        reply_to: Option<Subject>,
        replier: Replier,
    ) -> Self {
        Self {
            subject,
            body,
            queue_group,
            reply_to,
            replier,
        }
    }

    /// The subject the message was published to.
    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// The message payload, owned by user code from this point on: the
    /// library will not mutate it after hand-off.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The queue group the delivering subscription was created with, if any.
    #[must_use]
    pub fn queue_group(&self) -> Option<&QueueGroup> {
        self.queue_group.as_ref()
    }

    /// True iff this message carries a reply subject, in which case
    /// [`Message::reply`] is a valid operation.
    #[must_use]
    pub fn is_request(&self) -> bool {
        self.reply_to.is_some()
    }

    /// The reply subject, if any.
    #[must_use]
    pub fn reply_to(&self) -> Option<&Subject> {
        self.reply_to.as_ref()
    }

    /// Publish `body` back to the requester's reply subject.
    ///
    /// A no-op if this message isn't a request.
    pub fn reply(&self, body: impl Into<Bytes>) {
        self.reply_after(body, Duration::ZERO);
    }

    /// Like [`Message::reply`], but the publish is delayed by `delay`.
    pub fn reply_after(&self, body: impl Into<Bytes>, delay: Duration) {
        let Some(reply_to) = self.reply_to.clone() else {
            return;
        };

        let body = body.into();
        if delay.is_zero() {
            self.replier.publish(reply_to, body);
        } else {
            let replier = self.replier.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                replier.publish(reply_to, body);
            });
        }
    }
}
