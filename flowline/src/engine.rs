use std::time::Duration;

use bytes::Bytes;
use flowline_proto::{
    proto::{ClientOp, ServerOp},
    Connect, Host, QueueGroup, ServerAddr, Subject, SubscriptionId,
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
    time::Instant,
};

use crate::{
    executor::CallbackExecutor,
    listener::{ConnectionEvent, Listener, ListenerHandle, ListenerRegistry},
    message::Replier,
    outbound_queue::{OutboundQueue, PendingPublish},
    server_list::{Endpoint, ServerList},
    subscription::{Handler, Subscription},
    subscription_registry::SubscriptionRegistry,
};

/// Everything a [`ClientBuilder`](crate::ClientBuilder) collects, handed
/// once to the engine at spawn time.
pub(crate) struct EngineConfig {
    pub(crate) hosts: Vec<ServerAddr>,
    pub(crate) automatic_reconnect: bool,
    pub(crate) reconnect_wait: Duration,
    pub(crate) pedantic: bool,
    pub(crate) max_frame_size: u32,
    /// The reactor the engine task (and thus every dial, timer and
    /// transport read/write it drives) is spawned on.
    pub(crate) event_loop_group: tokio::runtime::Handle,
    /// The thread pool user handlers and listeners are dispatched on.
    pub(crate) callback_executor: tokio::runtime::Handle,
    pub(crate) listeners: Vec<Listener>,
}

/// Commands sent from [`Client`](crate::Client) handles to the single task
/// that owns all mutable engine state. Serializing every mutation through
/// one task gives the same guarantee as a lock around a shared struct,
/// without needing one.
pub(crate) enum EngineCommand {
    Publish {
        subject: Subject,
        body: Bytes,
        reply_to: Option<Subject>,
    },
    /// Like `Publish`, but dropped rather than queued while not `SERVER_READY`.
    PublishPeriodic {
        subject: Subject,
        body: Bytes,
        reply_to: Option<Subject>,
    },
    Subscribe {
        subject: Subject,
        queue_group: Option<QueueGroup>,
        max_messages: Option<u64>,
        handler: Handler,
        reply: oneshot::Sender<Subscription>,
    },
    Unsubscribe {
        id: SubscriptionId,
    },
    AddListener {
        listener: Listener,
        reply: oneshot::Sender<ListenerHandle>,
    },
    RemoveListener {
        handle: ListenerHandle,
    },
    IsConnected {
        reply: oneshot::Sender<bool>,
    },
    /// A diagnostic snapshot of every configured endpoint's rotation
    /// position and success/failure counters (spec.md §3).
    Endpoints {
        reply: oneshot::Sender<Vec<Endpoint>>,
    },
    Close {
        ack: oneshot::Sender<()>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ServerReady,
    Closed,
}

pub(crate) fn spawn(
    config: EngineConfig,
) -> (mpsc::UnboundedSender<EngineCommand>, tokio::task::JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let mut engine = Engine {
        state: ConnectionState::Disconnected,
        servers: ServerList::new(config.hosts).expect("ClientBuilder rejects an empty host list"),
        outbound: OutboundQueue::default(),
        registry: SubscriptionRegistry::default(),
        listeners: ListenerRegistry::default(),
        executor: CallbackExecutor::new(config.callback_executor),
        conn: None,
        pedantic: config.pedantic,
        automatic_reconnect: config.automatic_reconnect,
        reconnect_wait: config.reconnect_wait,
        max_frame_size: config.max_frame_size,
        reconnect_at: None,
        commands_tx: commands_tx.clone(),
    };

    for listener in config.listeners {
        engine.listeners.add(listener);
    }

    let handle = config.event_loop_group.spawn(engine.run(commands_rx));
    (commands_tx, handle)
}

struct Engine {
    state: ConnectionState,
    servers: ServerList,
    outbound: OutboundQueue,
    registry: SubscriptionRegistry,
    listeners: ListenerRegistry,
    executor: CallbackExecutor,
    conn: Option<flowline_net::StreamingConnection<TcpStream>>,
    pedantic: bool,
    automatic_reconnect: bool,
    reconnect_wait: Duration,
    max_frame_size: u32,
    reconnect_at: Option<Instant>,
    commands_tx: mpsc::UnboundedSender<EngineCommand>,
}

impl Engine {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<EngineCommand>) {
        self.try_connect().await;

        loop {
            let reconnect_at = self.reconnect_at;
            let conn_is_some = self.conn.is_some();

            tokio::select! {
                biased;

                cmd = commands.recv() => match cmd {
                    Some(EngineCommand::Close { ack }) => {
                        self.close().await;
                        let _ = ack.send(());
                        return;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        // Every `Client` handle (and its clones) was dropped.
                        self.close().await;
                        return;
                    }
                },

                () = sleep_until_opt(reconnect_at), if reconnect_at.is_some() => {
                    self.reconnect_at = None;
                    self.try_connect().await;
                }

                result = read_next_opt(&mut self.conn), if conn_is_some => {
                    self.handle_read(result).await;
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Publish {
                subject,
                body,
                reply_to,
            } => self.publish(subject, body, reply_to).await,

            EngineCommand::PublishPeriodic {
                subject,
                body,
                reply_to,
            } => {
                if self.state == ConnectionState::ServerReady {
                    self.write_publish(subject, body, reply_to).await;
                } else {
                    log::debug!("skipping periodic publish tick on {subject} while disconnected");
                }
            }

            EngineCommand::Subscribe {
                subject,
                queue_group,
                max_messages,
                handler,
                reply,
            } => {
                let subscription = self.registry.create(
                    subject,
                    queue_group,
                    max_messages,
                    handler,
                    self.commands_tx.clone(),
                );
                if self.state == ConnectionState::ServerReady {
                    self.write_subscribe(&subscription).await;
                }
                let _ = reply.send(subscription);
            }

            EngineCommand::Unsubscribe { id } => {
                if self.registry.remove(id).is_some() {
                    self.executor.remove_lane(id);
                    if self.state == ConnectionState::ServerReady {
                        if let Some(conn) = self.conn.as_mut() {
                            conn.enqueue_write_op(&ClientOp::Unsubscribe {
                                id,
                                max_messages: None,
                            });
                            if conn.write_and_flush().await.is_err() {
                                self.handle_transport_down().await;
                            }
                        }
                    }
                }
            }

            EngineCommand::AddListener { listener, reply } => {
                let handle = self.listeners.add(listener);
                let _ = reply.send(handle);
            }

            EngineCommand::RemoveListener { handle } => {
                self.listeners.remove(handle);
            }

            EngineCommand::IsConnected { reply } => {
                let _ = reply.send(self.state == ConnectionState::ServerReady);
            }

            EngineCommand::Endpoints { reply } => {
                let _ = reply.send(self.servers.endpoints().to_vec());
            }

            EngineCommand::Close { ack } => {
                // Handled directly in `run` so we can return right after.
                let _ = ack.send(());
            }
        }
    }

    async fn publish(&mut self, subject: Subject, body: Bytes, reply_to: Option<Subject>) {
        if self.state == ConnectionState::ServerReady {
            self.write_publish(subject, body, reply_to).await;
        } else {
            self.outbound.enqueue(PendingPublish {
                subject,
                body,
                reply_to,
            });
        }
    }

    async fn write_publish(&mut self, subject: Subject, body: Bytes, reply_to: Option<Subject>) {
        let Some(conn) = self.conn.as_mut() else {
            return;
        };

        conn.enqueue_write_op(&ClientOp::Publish {
            message: flowline_proto::MessageBase {
                subject,
                reply_subject: reply_to,
                payload: body,
            },
        });
        if conn.write_and_flush().await.is_err() {
            self.handle_transport_down().await;
        }
    }

    async fn write_subscribe(&mut self, subscription: &Subscription) {
        let Some(conn) = self.conn.as_mut() else {
            return;
        };

        conn.enqueue_write_op(&ClientOp::Subscribe {
            id: subscription.id(),
            subject: subscription.subject().clone(),
            queue_group: subscription.queue_group().cloned(),
        });
        if conn.write_and_flush().await.is_err() {
            self.handle_transport_down().await;
        }
    }

    async fn try_connect(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }

        self.state = ConnectionState::Connecting;
        let address = self.servers.next_server().address().clone();

        let socket = match TcpStream::connect(dial_target(&address)).await {
            Ok(socket) => socket,
            Err(err) => {
                log::warn!("dialing {address} failed: {err}");
                self.servers.current_server_mut().record_failure();
                self.enter_disconnected();
                return;
            }
        };

        self.state = ConnectionState::Connected;
        self.listeners.notify(ConnectionEvent::Connected, &self.executor);

        let mut conn = flowline_net::StreamingConnection::new(socket);
        let connect = Connect {
            verbose: false,
            pedantic: self.pedantic,
            username: address.username().map(ToOwned::to_owned),
            password: address.password().map(ToOwned::to_owned),
        };

        let info = match flowline_net::proto_connect(&mut conn, connect).await {
            Ok(info) => info,
            Err(err) => {
                log::warn!("handshake with {address} failed: {err}");
                self.servers.current_server_mut().record_failure();
                self.enter_disconnected();
                return;
            }
        };
        log::debug!(
            "connected to {address} (server {}, {} known peer urls, not mined for cluster discovery)",
            info.id,
            info.connect_urls.len()
        );

        self.servers.current_server_mut().record_success();
        self.conn = Some(conn);
        self.state = ConnectionState::ServerReady;

        for subscription in self.registry.snapshot() {
            self.write_subscribe(&subscription).await;
        }

        let pending: Vec<_> = self.outbound.drain().collect();
        for publish in pending {
            self.write_publish(publish.subject, publish.body, publish.reply_to)
                .await;
        }

        if self.state == ConnectionState::ServerReady {
            self.listeners.notify(ConnectionEvent::ServerReady, &self.executor);
        }
    }

    async fn handle_read(&mut self, result: Result<ServerOp, flowline_net::error::StreamingReadError>) {
        match result {
            Ok(ServerOp::Ping) => {
                let Some(conn) = self.conn.as_mut() else {
                    return;
                };
                conn.enqueue_write_op(&ClientOp::Pong);
                if conn.write_and_flush().await.is_err() {
                    self.handle_transport_down().await;
                }
            }
            Ok(ServerOp::Pong | ServerOp::Success | ServerOp::Info { .. }) => {}
            Ok(ServerOp::Error { error }) => {
                log::warn!("broker reported an error: {error}");
                if error.is_fatal().unwrap_or(true) {
                    self.handle_transport_down().await;
                }
            }
            Ok(ServerOp::Message { message }) => {
                if message.base.payload.len() > self.max_frame_size as usize {
                    log::warn!(
                        "dropping connection after a {} byte frame exceeded max_frame_size",
                        message.base.payload.len()
                    );
                    self.handle_transport_down().await;
                    return;
                }

                let replier = Replier::new(self.commands_tx.clone());
                self.registry.dispatch(
                    message.subscription_id,
                    message.base.subject,
                    message.base.reply_subject,
                    message.base.payload,
                    replier,
                    &self.executor,
                );
            }
            Err(err) => {
                log::warn!("connection lost: {err}");
                self.handle_transport_down().await;
            }
        }
    }

    async fn handle_transport_down(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }

        self.conn = None;
        self.enter_disconnected();
    }

    fn enter_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.listeners.notify(ConnectionEvent::Disconnected, &self.executor);
        if self.automatic_reconnect {
            self.reconnect_at = Some(Instant::now() + self.reconnect_wait);
        }
    }

    async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }

        let was_up = matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::ServerReady
        );
        self.state = ConnectionState::Closed;
        self.reconnect_at = None;

        if let Some(mut conn) = self.conn.take() {
            let _ = conn.shutdown().await;
        }

        if was_up {
            self.listeners.notify(ConnectionEvent::Disconnected, &self.executor);
        }

        for subscription in self.registry.snapshot() {
            subscription.close();
        }
    }
}

async fn read_next_opt(
    conn: &mut Option<flowline_net::StreamingConnection<TcpStream>>,
) -> Result<ServerOp, flowline_net::error::StreamingReadError> {
    match conn {
        Some(conn) => conn.read_next().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn dial_target(address: &ServerAddr) -> String {
    match address.host() {
        Host::Ip(ip) => format!("{ip}:{}", address.port()),
        Host::Dns(name) => format!("{name}:{}", address.port()),
    }
}
