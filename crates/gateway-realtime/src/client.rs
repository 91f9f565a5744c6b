//! The per-connection client actor.
//!
//! Each client runs a reader task (inbound frames, routing, read deadline)
//! and a writer task (egress, heartbeat probes). Either task may start the
//! close; the shutdown signal is sent once and both tasks, plus the
//! publisher's forwarder, wind down on it.

use std::fmt;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use gateway_auth::ActiveSessionRegistry;
use gateway_core::config::realtime::RealtimeConfig;
use gateway_core::types::{PrincipalId, SessionId};

use crate::error::RealtimeError;
use crate::error_handler::ErrorHandler;
use crate::heartbeat::{HeartbeatSettings, ReadDeadline};
use crate::keywords::KeywordSet;
use crate::message::{Frame, InboundEnvelope, OutboundMessage};
use crate::publisher::{Egress, Publisher};
use crate::router::{HandlerContext, Router};

/// Upper bound on the close handshake once a connection is shutting down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

const CONNECTING: u8 = 0;
const LIVE: u8 = 1;
const CLOSING: u8 = 2;
const CLOSED: u8 = 3;

/// Lifecycle of a client. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClientState {
    Connecting,
    Live,
    Closing,
    Closed,
}

impl ClientState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            CONNECTING => Self::Connecting,
            LIVE => Self::Live,
            CLOSING => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Why a connection was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the transport or sent a close frame.
    PeerClosed,
    /// Reading or writing the transport failed.
    Transport,
    /// Nothing was received within the read deadline.
    ReadTimeout,
    /// A handler reported a fatal error.
    HandlerFatal,
    /// The hub removed the client, usually because its session ended.
    Evicted,
    /// The server is shutting down.
    Shutdown,
    /// The client never went live.
    Rejected,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::Transport => "transport",
            Self::ReadTimeout => "read_timeout",
            Self::HandlerFatal => "handler_fatal",
            Self::Evicted => "evicted",
            Self::Shutdown => "shutdown",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live (or closing) realtime connection bound to one session.
#[derive(Debug)]
pub struct Client {
    context: HandlerContext,
    keywords: KeywordSet,
    publisher: Publisher,
    control: mpsc::Sender<Egress>,
    deadline: ReadDeadline,
    state: AtomicU8,
    shutdown: watch::Sender<bool>,
    finished: watch::Sender<bool>,
    probes: AtomicU64,
}

/// Channel ends handed to the tasks that serve a client.
#[derive(Debug)]
pub(crate) struct ClientParts {
    egress: mpsc::Receiver<Egress>,
    forwarder: JoinHandle<()>,
}

/// Shared collaborators of the reader task.
#[derive(Clone)]
pub(crate) struct Services {
    pub(crate) router: Arc<Router>,
    pub(crate) errors: Arc<dyn ErrorHandler>,
    pub(crate) registry: Arc<ActiveSessionRegistry>,
    pub(crate) heartbeat: HeartbeatSettings,
}

impl Client {
    /// Build a client in the `Connecting` state and start its publisher.
    pub(crate) fn new(
        context: HandlerContext,
        keywords: KeywordSet,
        config: &RealtimeConfig,
    ) -> (Arc<Self>, ClientParts) {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (finished, _) = watch::channel(false);
        let (egress_tx, egress_rx) = mpsc::channel(config.egress_capacity.max(1));
        let (publisher, forwarder) = Publisher::spawn(
            context.session_id,
            config.publisher_capacity,
            egress_tx.clone(),
            shutdown_rx,
        );

        let client = Arc::new(Self {
            context,
            keywords,
            publisher,
            control: egress_tx,
            deadline: ReadDeadline::new(config.read_deadline()),
            state: AtomicU8::new(CONNECTING),
            shutdown,
            finished,
            probes: AtomicU64::new(0),
        });
        let parts = ClientParts {
            egress: egress_rx,
            forwarder,
        };
        (client, parts)
    }

    pub fn session_id(&self) -> SessionId {
        self.context.session_id
    }

    pub fn principal_id(&self) -> &PrincipalId {
        &self.context.principal_id
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    pub fn state(&self) -> ClientState {
        ClientState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Heartbeat probes sent so far.
    pub fn probes_sent(&self) -> u64 {
        self.probes.load(Ordering::Relaxed)
    }

    /// Queue a message for this client. Never blocks; `false` if dropped.
    pub fn publish(&self, message: OutboundMessage) -> bool {
        if self.state() >= ClientState::Closing {
            return false;
        }
        self.publisher.publish(message)
    }

    /// Start closing the connection.
    ///
    /// Idempotent: only the first call signals shutdown and returns `true`.
    pub fn close(&self, reason: CloseReason) -> bool {
        let first = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                (s < CLOSING).then_some(CLOSING)
            })
            .is_ok();
        if first {
            info!(
                session_id = %self.context.session_id,
                principal_id = %self.context.principal_id,
                %reason,
                "Closing realtime connection"
            );
            self.shutdown.send_replace(true);
        }
        first
    }

    /// Wait until the connection has been fully torn down.
    pub async fn closed(&self) {
        let mut finished = self.finished.subscribe();
        let _ = finished.wait_for(|done| *done).await;
    }

    pub(crate) fn mark_live(&self) {
        let _ = self
            .state
            .compare_exchange(CONNECTING, LIVE, Ordering::AcqRel, Ordering::Acquire);
    }

    pub(crate) fn mark_closed(&self) {
        self.state.store(CLOSED, Ordering::Release);
        self.finished.send_replace(true);
    }

    pub(crate) fn context(&self) -> &HandlerContext {
        &self.context
    }
}

/// Resolves once `shutdown` reads `true` or its sender is gone.
pub(crate) async fn closing(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closing| *closing).await;
}

/// Run a client's reader, writer and forwarder until all have stopped.
pub(crate) async fn serve<S, R, SE, RE>(
    client: Arc<Client>,
    parts: ClientParts,
    sink: S,
    stream: R,
    services: Services,
) where
    S: Sink<Frame, Error = SE> + Unpin + Send + 'static,
    SE: Display + Send + 'static,
    R: Stream<Item = Result<Frame, RE>> + Unpin + Send + 'static,
    RE: Display + Send + 'static,
{
    let interval = services.heartbeat.interval;
    let writer = tokio::spawn(write_loop(Arc::clone(&client), sink, parts.egress, interval));
    let reader = tokio::spawn(read_loop(Arc::clone(&client), stream, services));
    client.mark_live();

    let (writer, reader, forwarder) = tokio::join!(writer, reader, parts.forwarder);
    for (task, result) in [("writer", writer), ("reader", reader), ("forwarder", forwarder)] {
        if let Err(e) = result {
            error!(session_id = %client.session_id(), task, error = %e, "Realtime task failed");
        }
    }
    client.close(CloseReason::Transport);
}

async fn write_loop<S, E>(
    client: Arc<Client>,
    mut sink: S,
    mut egress: mpsc::Receiver<Egress>,
    interval: Duration,
) where
    S: Sink<Frame, Error = E> + Unpin,
    E: Display,
{
    let session_id = client.session_id();
    let mut shutdown = client.shutdown.subscribe();
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Set when a message went out since the last tick. A tick that finds it
    // set renews the deadline in place of a heartbeat ping.
    let mut busy = false;

    let reason = loop {
        let frame = tokio::select! {
            biased;
            () = closing(&mut shutdown) => break None,
            item = egress.recv() => match item {
                Some(Egress::Message(message)) => match message.encode() {
                    Ok(frame) => {
                        busy = true;
                        frame
                    }
                    Err(e) => {
                        error!(%session_id, message_type = %message.kind, error = %e, "Failed to encode outbound message");
                        continue;
                    }
                },
                Some(Egress::Frame(frame)) => frame,
                None => break None,
            },
            _ = ticker.tick() => {
                if client.deadline.expired() {
                    break Some(CloseReason::ReadTimeout);
                }
                if std::mem::take(&mut busy) {
                    client.deadline.renew();
                    continue;
                }
                client.probes.fetch_add(1, Ordering::Relaxed);
                debug!(%session_id, "Sending heartbeat probe");
                Frame::Ping(Vec::new())
            }
        };

        let sent = tokio::select! {
            biased;
            () = closing(&mut shutdown) => break None,
            sent = sink.send(frame) => sent,
        };
        if let Err(e) = sent {
            warn!(%session_id, error = %e, "Realtime write failed");
            break Some(CloseReason::Transport);
        }
    };

    if let Some(reason) = reason {
        client.close(reason);
    }

    let _ = time::timeout(CLOSE_TIMEOUT, async {
        let _ = sink.send(Frame::Close).await;
        let _ = sink.close().await;
    })
    .await;
    debug!(%session_id, "Realtime writer stopped");
}

async fn read_loop<R, E>(client: Arc<Client>, mut stream: R, services: Services)
where
    R: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    let session_id = client.session_id();
    let mut shutdown = client.shutdown.subscribe();

    let reason = loop {
        let deadline = client.deadline.get();
        let next = tokio::select! {
            biased;
            () = closing(&mut shutdown) => break None,
            next = stream.next() => next,
            () = time::sleep_until(deadline) => {
                if client.deadline.expired() {
                    warn!(%session_id, "Read deadline passed, closing connection");
                    break Some(CloseReason::ReadTimeout);
                }
                continue;
            }
        };

        let frame = match next {
            None => break Some(CloseReason::PeerClosed),
            Some(Err(e)) => {
                debug!(%session_id, error = %e, "Realtime read failed");
                break Some(CloseReason::Transport);
            }
            Some(Ok(frame)) => frame,
        };

        client.deadline.renew();
        services.registry.touch(&session_id, Utc::now()).await;

        match frame {
            Frame::Close => break Some(CloseReason::PeerClosed),
            Frame::Pong(_) => {}
            Frame::Ping(data) => {
                if client.control.send(Egress::Frame(Frame::Pong(data))).await.is_err() {
                    break None;
                }
            }
            Frame::Text(_) | Frame::Binary(_) => {
                if let Err(error) = handle_data(&client, &services.router, &frame).await {
                    if let Some(event) = services.errors.handle(session_id, &error) {
                        client.publish(event);
                    }
                    if error.is_fatal() {
                        break Some(CloseReason::HandlerFatal);
                    }
                }
            }
        }
    };

    if let Some(reason) = reason {
        client.close(reason);
    }
    debug!(%session_id, "Realtime reader stopped");
}

async fn handle_data(client: &Client, router: &Router, frame: &Frame) -> Result<(), RealtimeError> {
    let envelope = InboundEnvelope::decode(frame)?;
    if let Some(reply) = router.dispatch(client.context(), envelope).await? {
        client.publish(reply);
    }
    Ok(())
}
