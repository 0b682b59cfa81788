/// Returned by any public operation once [`close`] has run to completion.
///
/// [`close`]: crate::Client::close
#[derive(Debug, Clone, Copy, Default, thiserror::Error)]
#[error("the client is closed")]
pub struct ClientClosedError(());

impl ClientClosedError {
    pub(crate) fn new() -> Self {
        Self(())
    }
}

/// A caller-supplied argument was invalid, independent of connection state.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ArgumentError {
    /// [`ClientBuilder::hosts`](crate::ClientBuilder::hosts) was never called, or was called
    /// with an empty list.
    #[error("the client was built without any hosts to connect to")]
    EmptyHosts,
    /// [`Client::request`](crate::Client::request) was called with no body.
    #[error("request body must not be empty")]
    EmptyRequestBody,
}

/// Failure surfaced by an operation submitted to the connection engine.
#[derive(Debug, thiserror::Error)]
pub enum TryCommandError {
    /// The client is closed.
    #[error(transparent)]
    Closed(#[from] ClientClosedError),
    /// An argument was invalid.
    #[error(transparent)]
    Argument(#[from] ArgumentError),
}
