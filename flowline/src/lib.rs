//! High level client for a text-line pub/sub message broker.
//!
//! A [`Client`] owns one background task that dials the configured
//! endpoints, performs the `CONNECT` handshake, and keeps every publish,
//! subscription and listener alive across reconnects. Handlers are never
//! invoked inline: every subscription and listener has its own dispatch
//! lane on the callback executor, so a slow handler only stalls its own
//! subscription.

pub use flowline_proto::{
    error::ServerAddrError, Host, QueueGroup, ServerAddr, Subject, SubscriptionId,
};

pub use self::{
    client::{Client, ClientBuilder},
    error::{ArgumentError, ClientClosedError, TryCommandError},
    listener::{ConnectionEvent, ListenerHandle},
    message::Message,
    periodic::Registration,
    request::Request,
    server_list::Endpoint,
    subscription::{Handler, Subscription},
};

mod client;
mod engine;
mod error;
mod executor;
mod listener;
mod message;
mod outbound_queue;
mod periodic;
mod request;
mod server_list;
mod subscription;
mod subscription_registry;
