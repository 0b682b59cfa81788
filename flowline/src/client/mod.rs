use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use bytes::Bytes;
use flowline_proto::{QueueGroup, Subject};
use tokio::sync::{mpsc, oneshot};

pub use self::builder::ClientBuilder;
use crate::{
    engine::{self, EngineCommand, EngineConfig},
    error::{ArgumentError, ClientClosedError, TryCommandError},
    listener::{ConnectionEvent, ListenerHandle},
    message::Message,
    periodic::Registration,
    request::{create_inbox_subject, Request},
    server_list::Endpoint,
    subscription::Subscription,
};

mod builder;

/// A connection to a broker, backed by a single background task that owns
/// the transport, the outbound queue and the subscription registry.
///
/// Cloning a [`Client`] is cheap: every clone shares the same engine task
/// and fails the same way once [`Client::close`] completes.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    commands: mpsc::UnboundedSender<EngineCommand>,
    closed: AtomicBool,
    engine: tokio::task::JoinHandle<()>,
    /// The reactor background tasks owned by this client (periodic
    /// publishes, request timeouts) are spawned on — the same
    /// `eventLoopGroup` the engine task itself runs on.
    event_loop_group: tokio::runtime::Handle,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        // Best-effort cleanup for a `Client` that was dropped without ever
        // calling `close`; `close` itself makes this a no-op.
        self.engine.abort();
    }
}

impl Client {
    /// Start building a [`Client`].
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn spawn(config: EngineConfig) -> Self {
        let event_loop_group = config.event_loop_group.clone();
        let (commands, engine) = engine::spawn(config);
        Self {
            inner: Arc::new(ClientInner {
                commands,
                closed: AtomicBool::new(false),
                engine,
                event_loop_group,
            }),
        }
    }

    fn check_closed(&self) -> Result<(), ClientClosedError> {
        if self.inner.closed.load(Ordering::Acquire) {
            Err(ClientClosedError::new())
        } else {
            Ok(())
        }
    }

    fn send(&self, command: EngineCommand) -> Result<(), ClientClosedError> {
        self.inner
            .commands
            .send(command)
            .map_err(|_| ClientClosedError::new())
    }

    /// Publish `body` to `subject`, fire-and-forget.
    ///
    /// Buffered if the connection isn't `SERVER_READY`; flushed to the wire
    /// in program order once it is.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is closed.
    pub fn publish(&self, subject: Subject, body: impl Into<Bytes>) -> Result<(), ClientClosedError> {
        self.publish_with_reply(subject, body, None)
    }

    /// Like [`Client::publish`], but carries an explicit reply subject
    /// instead of firing a plain publish.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is closed.
    pub fn publish_with_reply(
        &self,
        subject: Subject,
        body: impl Into<Bytes>,
        reply_to: Option<Subject>,
    ) -> Result<(), ClientClosedError> {
        self.check_closed()?;
        self.send(EngineCommand::Publish {
            subject,
            body: body.into(),
            reply_to,
        })
    }

    /// Publish `body` to `subject` at a fixed rate, starting immediately.
    ///
    /// Ticks are skipped (not buffered) while the connection isn't
    /// `SERVER_READY`, to avoid an unbounded backlog across a long outage.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is closed.
    pub fn publish_periodic(
        &self,
        subject: Subject,
        body: impl Into<Bytes>,
        period: Duration,
    ) -> Result<Registration, ClientClosedError> {
        self.publish_periodic_with_reply(subject, body, None, period)
    }

    /// Like [`Client::publish_periodic`], but carries an explicit reply
    /// subject on every tick instead of firing a plain publish.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is closed.
    pub fn publish_periodic_with_reply(
        &self,
        subject: Subject,
        body: impl Into<Bytes>,
        reply_to: Option<Subject>,
        period: Duration,
    ) -> Result<Registration, ClientClosedError> {
        self.check_closed()?;

        let (registration, cancelled) = Registration::new();
        let commands = self.inner.commands.clone();
        let body = body.into();

        self.inner.event_loop_group.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if cancelled.load(Ordering::Acquire) {
                    return;
                }
                let sent = commands.send(EngineCommand::PublishPeriodic {
                    subject: subject.clone(),
                    body: body.clone(),
                    reply_to: reply_to.clone(),
                });
                if sent.is_err() {
                    return;
                }
            }
        });

        Ok(registration)
    }

    /// Subscribe to `subject`, optionally sharing delivery across a queue
    /// group and capping delivery at `max_messages`.
    ///
    /// Registered immediately regardless of connection state; the `SUB`
    /// frame is written right away if `SERVER_READY`, or on the next
    /// handshake otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is closed.
    pub async fn subscribe(
        &self,
        subject: Subject,
        queue_group: Option<QueueGroup>,
        max_messages: Option<u64>,
        handler: impl Fn(Message) + Send + Sync + 'static,
    ) -> Result<Subscription, ClientClosedError> {
        self.check_closed()?;

        let (reply, reply_rx) = oneshot::channel();
        self.send(EngineCommand::Subscribe {
            subject,
            queue_group,
            max_messages,
            handler: Arc::new(handler),
            reply,
        })?;
        reply_rx.await.map_err(|_| ClientClosedError::new())
    }

    /// Publish `body` to `subject` with a generated inbox as the reply
    /// subject, and return a handle tracking replies until `timeout`
    /// elapses.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is closed, or if `body` is empty.
    pub async fn request(
        &self,
        subject: Subject,
        body: impl Into<Bytes>,
        timeout: Duration,
        max_replies: Option<u64>,
        handler: impl Fn(Message) + Send + Sync + 'static,
    ) -> Result<Request, TryCommandError> {
        self.check_closed()?;

        let body = body.into();
        if body.is_empty() {
            return Err(TryCommandError::Argument(ArgumentError::EmptyRequestBody));
        }

        let inbox = create_inbox_subject();
        let subscription = self
            .subscribe(inbox.clone(), None, max_replies, handler)
            .await?;

        let timeout_subscription = subscription.clone();
        self.inner.event_loop_group.spawn(async move {
            tokio::time::sleep(timeout).await;
            timeout_subscription.close();
        });

        self.publish_with_reply(subject, body, Some(inbox))?;

        Ok(Request::new(subscription))
    }

    /// Close the client. Idempotent: subsequent calls return immediately.
    ///
    /// Shuts down the transport, stops the engine task, and closes every
    /// live subscription. After this completes, [`Client::is_closed`] is
    /// true forever and every other operation fails fast.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let (ack, ack_rx) = oneshot::channel();
        if self.inner.commands.send(EngineCommand::Close { ack }).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// True once [`Client::close`] has run to completion.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// True iff the engine currently holds a `SERVER_READY` connection.
    pub async fn is_connected(&self) -> bool {
        if self.is_closed() {
            return false;
        }

        let (reply, reply_rx) = oneshot::channel();
        if self.send(EngineCommand::IsConnected { reply }).is_err() {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// A diagnostic snapshot of every configured endpoint, in rotation
    /// order, with the success/failure counters accumulated so far.
    ///
    /// Returns an empty list once the client is closed.
    pub async fn endpoints(&self) -> Vec<Endpoint> {
        if self.is_closed() {
            return Vec::new();
        }

        let (reply, reply_rx) = oneshot::channel();
        if self.send(EngineCommand::Endpoints { reply }).is_err() {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    /// Register a connection-state listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is closed.
    pub async fn add_listener(
        &self,
        listener: impl Fn(ConnectionEvent) + Send + Sync + 'static,
    ) -> Result<ListenerHandle, ClientClosedError> {
        self.check_closed()?;

        let (reply, reply_rx) = oneshot::channel();
        self.send(EngineCommand::AddListener {
            listener: Arc::new(listener),
            reply,
        })?;
        reply_rx.await.map_err(|_| ClientClosedError::new())
    }

    /// Unregister a listener previously returned by [`Client::add_listener`].
    ///
    /// Silent if the client is already closed or the handle is stale.
    pub fn remove_listener(&self, handle: ListenerHandle) {
        let _ = self.send(EngineCommand::RemoveListener { handle });
    }
}
