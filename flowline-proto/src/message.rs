use bytes::Bytes;

use crate::{subscription_id::SubscriptionId, Subject};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBase {
    pub subject: Subject,
    pub reply_subject: Option<Subject>,
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMessage {
    pub subscription_id: SubscriptionId,
    pub base: MessageBase,
}
