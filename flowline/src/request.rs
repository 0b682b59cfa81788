use flowline_proto::Subject;
use rand::RngCore;

use crate::subscription::Subscription;

const INBOX_PREFIX: &str = "_INBOX";

/// Generate a fresh, collision-resistant inbox subject: `_INBOX.` followed
/// by the hex digits of a 128-bit random integer, no fixed width.
pub(crate) fn create_inbox_subject() -> Subject {
    let mut suffix = [0_u8; 16];
    rand::thread_rng().fill_bytes(&mut suffix);

    let subject = format!("{INBOX_PREFIX}.{:x}", u128::from_ne_bytes(suffix));
    Subject::try_from(subject).expect("generated inbox subject is always valid")
}

/// A handle to an in-flight request/reply exchange.
///
/// Built on top of a plain subscription to the generated inbox subject: the
/// subscription's `max_messages` is `max_replies`, and a one-shot timer
/// (owned by whoever constructs this, see [`Client::request`]) closes it
/// after the configured timeout regardless of whether any reply arrived.
///
/// [`Client::request`]: crate::Client::request
#[derive(Debug, Clone)]
pub struct Request {
    subscription: Subscription,
}

impl Request {
    pub(crate) fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    /// The inbox subject this request listens for replies on.
    #[must_use]
    pub fn subject(&self) -> &Subject {
        self.subscription.subject()
    }

    /// How many replies have been received so far.
    #[must_use]
    pub fn received_replies(&self) -> u64 {
        self.subscription.received_count()
    }

    /// The cap on replies this request was created with, if any.
    #[must_use]
    pub fn max_replies(&self) -> Option<u64> {
        self.subscription.max_messages()
    }

    /// Close the request's inbox subscription early. Idempotent; a no-op if
    /// the timeout already fired or the request was already closed.
    pub fn close(&self) {
        self.subscription.close();
    }
}
