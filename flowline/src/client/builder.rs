use std::time::Duration;

use flowline_proto::ServerAddr;

use crate::{
    engine::EngineConfig,
    error::ArgumentError,
    listener::{ConnectionEvent, Listener},
    Client,
};

const DEFAULT_RECONNECT_WAIT: Duration = Duration::from_secs(2);
const DEFAULT_MAX_FRAME_SIZE: u32 = 1024 * 1024;

/// A builder for [`Client`]
///
/// Obtained from [`Client::builder`].
#[derive(Debug)]
pub struct ClientBuilder {
    hosts: Vec<ServerAddr>,
    automatic_reconnect: bool,
    reconnect_wait_time: Duration,
    pedantic: bool,
    max_frame_size: u32,
    event_loop_group: Option<tokio::runtime::Handle>,
    callback_executor: Option<tokio::runtime::Handle>,
    listeners: Vec<Listener>,
}

impl ClientBuilder {
    pub(super) fn new() -> Self {
        Self {
            hosts: Vec::new(),
            automatic_reconnect: true,
            reconnect_wait_time: DEFAULT_RECONNECT_WAIT,
            pedantic: false,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            event_loop_group: None,
            callback_executor: None,
            listeners: Vec::new(),
        }
    }

    /// Set the ordered list of broker endpoints to connect to.
    ///
    /// Required: [`ClientBuilder::connect`] fails if this is never called, or
    /// is called with an empty list.
    #[must_use]
    pub fn hosts(mut self, hosts: impl IntoIterator<Item = ServerAddr>) -> Self {
        self.hosts = hosts.into_iter().collect();
        self
    }

    /// Whether the reconnect loop keeps running until [`Client::close`].
    ///
    /// Default: `true`.
    #[must_use]
    pub fn automatic_reconnect(mut self, automatic_reconnect: bool) -> Self {
        self.automatic_reconnect = automatic_reconnect;
        self
    }

    /// Delay between reconnect attempts.
    ///
    /// Default: 2 seconds.
    #[must_use]
    pub fn reconnect_wait_time(mut self, reconnect_wait_time: Duration) -> Self {
        self.reconnect_wait_time = reconnect_wait_time;
        self
    }

    /// Value sent in the `CONNECT` frame asking the broker for strict
    /// subject validation.
    ///
    /// Default: `false`.
    #[must_use]
    pub fn pedantic(mut self, pedantic: bool) -> Self {
        self.pedantic = pedantic;
        self
    }

    /// Upper bound on a single decoded message payload, enforced by the
    /// engine after each `MSG` frame is decoded.
    ///
    /// Default: 1 MiB.
    #[must_use]
    pub fn max_frame_size(mut self, max_frame_size: u32) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Supply the reactor the engine task is spawned on, along with every
    /// background task it owns (reconnect timers, periodic publishes,
    /// request timeouts).
    ///
    /// Default: the runtime calling [`ClientBuilder::connect`] (equivalent
    /// to the "null to create+own" case: there is nothing separate to own,
    /// since the ambient tokio runtime already fills that role).
    #[must_use]
    pub fn event_loop_group(mut self, handle: tokio::runtime::Handle) -> Self {
        self.event_loop_group = Some(handle);
        self
    }

    /// Supply the thread pool user handlers and connection-state listeners
    /// are invoked on.
    ///
    /// Default: the runtime calling [`ClientBuilder::connect`].
    #[must_use]
    pub fn callback_executor(mut self, handle: tokio::runtime::Handle) -> Self {
        self.callback_executor = Some(handle);
        self
    }

    /// Register an initial connection-state listener.
    ///
    /// Equivalent to calling [`Client::add_listener`] immediately after
    /// [`ClientBuilder::connect`], but guarantees no event is missed between
    /// construction and the first `add_listener` call.
    #[must_use]
    pub fn add_listener(
        mut self,
        listener: impl Fn(ConnectionEvent) + Send + Sync + 'static,
    ) -> Self {
        self.listeners.push(std::sync::Arc::new(listener));
        self
    }

    /// Build the [`Client`].
    ///
    /// The client starts in the `DISCONNECTED` state and begins dialing the
    /// first configured host immediately in the background; this call does
    /// not wait for the connection to come up.
    ///
    /// # Errors
    ///
    /// Returns an error if [`ClientBuilder::hosts`] was never called, or was
    /// called with an empty list.
    pub fn connect(self) -> Result<Client, ArgumentError> {
        if self.hosts.is_empty() {
            return Err(ArgumentError::EmptyHosts);
        }

        let event_loop_group = self
            .event_loop_group
            .unwrap_or_else(tokio::runtime::Handle::current);
        let callback_executor = self
            .callback_executor
            .unwrap_or_else(tokio::runtime::Handle::current);

        let config = EngineConfig {
            hosts: self.hosts,
            automatic_reconnect: self.automatic_reconnect,
            reconnect_wait: self.reconnect_wait_time,
            pedantic: self.pedantic,
            max_frame_size: self.max_frame_size,
            event_loop_group,
            callback_executor,
            listeners: self.listeners,
        };

        Ok(Client::spawn(config))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
