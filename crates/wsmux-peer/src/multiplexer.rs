use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use wsmux_proto::{decode_message, encode_message, ChannelId, Message, Tid, MAX_TID};
use wsmux_transport::{Transport, TransportError, TransportFrame};

use crate::config::{MuxConfig, Parity, StreamConfig};
use crate::error::{ChannelError, Result};
use crate::shim::{Completion, Responder, ShimSink, ShimSource};
use crate::stream::MuxStream;

/// A channel opened by the remote peer and accepted locally.
#[derive(Debug)]
pub struct IncomingChannel {
    pub channel: ChannelId,
    /// Metadata the remote peer attached to its Create request.
    pub metadata: Bytes,
    pub stream: MuxStream,
}

/// Accepted inbound channels, in the order their Create requests arrived.
///
/// Ends once the transport is gone.
#[derive(Debug)]
pub struct Incoming {
    rx: mpsc::UnboundedReceiver<IncomingChannel>,
}

impl Incoming {
    pub async fn next(&mut self) -> Option<IncomingChannel> {
        self.rx.recv().await
    }
}

impl Stream for Incoming {
    type Item = IncomingChannel;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Decides whether an inbound Create is accepted.
///
/// `on_create` must answer through `respond` exactly once, now or later.
/// Dropping the responder rejects the request.
pub trait AcceptPolicy: Send + Sync + 'static {
    fn on_create(&self, metadata: &Bytes, respond: CreateResponder);
}

impl<F> AcceptPolicy for F
where
    F: Fn(&Bytes) -> std::result::Result<(), String> + Send + Sync + 'static,
{
    fn on_create(&self, metadata: &Bytes, respond: CreateResponder) {
        match self(metadata) {
            Ok(()) => respond.accept(),
            Err(reason) => respond.reject(reason),
        }
    }
}

/// Answer to one inbound Create request.
pub struct CreateResponder {
    inner: Weak<MuxInner>,
    tid: Tid,
    channel: ChannelId,
    metadata: Bytes,
    answered: bool,
}

impl CreateResponder {
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Accept the channel. The new stream is delivered through [`Incoming`].
    pub fn accept(mut self) {
        self.answered = true;
        if let Some(inner) = self.inner.upgrade() {
            let metadata = std::mem::take(&mut self.metadata);
            inner.accept_channel(self.tid, self.channel, metadata);
        }
    }

    /// Reject the channel; `reason` is sent to the remote peer.
    pub fn reject(mut self, reason: impl Into<String>) {
        self.answered = true;
        self.send_reject(reason.into());
    }

    fn send_reject(&self, reason: String) {
        if let Some(inner) = self.inner.upgrade() {
            debug!(channel = self.channel, reason = %reason, "rejecting channel");
            inner.respond(self.tid, Err(ChannelError::Rejected(reason)));
        }
    }
}

impl Drop for CreateResponder {
    fn drop(&mut self) {
        if !self.answered {
            self.send_reject("channel request dropped".to_string());
        }
    }
}

impl fmt::Debug for CreateResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateResponder")
            .field("tid", &self.tid)
            .field("channel", &self.channel)
            .finish()
    }
}

enum ChannelEntry {
    Live(Arc<dyn ShimSource>),
    /// Closed; kept so late messages can be told apart from unknown channels.
    Closed,
}

struct MuxState {
    channels: HashMap<ChannelId, ChannelEntry>,
    outstanding: HashMap<Tid, Completion>,
    next_tid: Tid,
    next_channel: ChannelId,
    closed: Option<String>,
    incoming: Option<mpsc::UnboundedSender<IncomingChannel>>,
}

impl MuxState {
    fn new(parity: Parity, incoming: mpsc::UnboundedSender<IncomingChannel>) -> Self {
        Self {
            channels: HashMap::new(),
            outstanding: HashMap::new(),
            next_tid: parity.first_tid(),
            next_channel: parity.first_id(),
            closed: None,
            incoming: Some(incoming),
        }
    }

    fn allocate_tid(&mut self, parity: Parity) -> Tid {
        let tid = self.next_tid;
        self.next_tid = if tid >= MAX_TID {
            parity.first_tid()
        } else {
            tid + 1
        };
        tid
    }

    fn allocate_channel(&mut self) -> ChannelId {
        let channel = self.next_channel;
        self.next_channel += 2;
        channel
    }

    fn check_open(&self) -> std::result::Result<(), ChannelError> {
        match &self.closed {
            Some(reason) => Err(ChannelError::TransportClosed(reason.clone())),
            None => Ok(()),
        }
    }
}

struct MuxInner {
    this: Weak<MuxInner>,
    config: MuxConfig,
    policy: Option<Arc<dyn AcceptPolicy>>,
    state: Mutex<MuxState>,
    outbound: mpsc::UnboundedSender<Bytes>,
    shutdown: CancellationToken,
    writer: Mutex<Option<JoinHandle<()>>>,
}

enum Lookup {
    Live(Arc<dyn ShimSource>),
    Closed,
    Missing,
}

impl MuxInner {
    fn lock(&self) -> MutexGuard<'_, MuxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, msg: &Message) -> std::result::Result<(), ChannelError> {
        let frame = encode_message(msg).map_err(|err| ChannelError::Protocol(err.to_string()))?;
        trace!(
            kind = msg.kind().name(),
            tid = msg.tid(),
            channel = ?msg.channel(),
            len = frame.len(),
            "sending message"
        );
        self.outbound
            .send(frame)
            .map_err(|_| ChannelError::TransportClosed("writer stopped".to_string()))
    }

    /// Allocate a tid, record `done` against it and queue the message.
    fn send_request(&self, done: Option<Completion>, build: impl FnOnce(Tid) -> Message) {
        let failed = {
            let mut state = self.lock();
            match state.check_open() {
                Err(err) => Some(err),
                Ok(()) => {
                    let tid = state.allocate_tid(self.config.parity);
                    match self.enqueue(&build(tid)) {
                        Ok(()) => {
                            if let Some(done) = done {
                                state.outstanding.insert(tid, done);
                            }
                            return;
                        }
                        Err(err) => Some(err),
                    }
                }
            }
        };
        if let (Some(err), Some(done)) = (failed, done) {
            done(Err(err));
        }
    }

    fn send_create(&self, channel: ChannelId, metadata: Bytes, done: Completion) {
        self.send_request(Some(done), |tid| Message::Create {
            tid,
            channel,
            metadata,
        });
    }

    fn send_data(&self, channel: ChannelId, payload: Option<Bytes>, done: Option<Completion>) {
        self.send_request(done, |tid| Message::Data {
            tid,
            channel,
            payload,
        });
    }

    fn send_close(&self, channel: ChannelId, reason: Option<String>, done: Option<Completion>) {
        debug!(channel, reason = ?reason, "closing channel");
        self.send_request(done, |tid| Message::Close {
            tid,
            channel,
            reason,
        });
    }

    /// Answer a request the remote peer sent, using its tid.
    fn respond(&self, tid: Tid, result: std::result::Result<(), ChannelError>) {
        let msg = match result {
            Ok(()) => Message::ack(tid),
            Err(err) => Message::nack(tid, err.to_string()),
        };
        if let Err(err) = self.enqueue(&msg) {
            debug!(tid, error = %err, "dropping response");
        }
    }

    fn responder(&self, tid: Tid) -> Responder {
        let inner = self.this.clone();
        Responder::new(move |result| {
            if let Some(inner) = inner.upgrade() {
                inner.respond(tid, result);
            }
        })
    }

    fn lookup(&self, channel: ChannelId) -> Lookup {
        match self.lock().channels.get(&channel) {
            Some(ChannelEntry::Live(source)) => Lookup::Live(Arc::clone(source)),
            Some(ChannelEntry::Closed) => Lookup::Closed,
            None => Lookup::Missing,
        }
    }

    /// Register `channel` and bind a stream to it.
    ///
    /// Fails if the id already has a registry entry, live or closed; the
    /// existing entry is left untouched.
    fn open_channel(&self, channel: ChannelId) -> std::result::Result<MuxStream, ChannelError> {
        let (stream, source, closed) = {
            let mut state = self.lock();
            if state.channels.contains_key(&channel) {
                return Err(ChannelError::AlreadyExists);
            }
            let shim = Arc::new(MuxShim {
                channel,
                inner: self.this.clone(),
            });
            let (stream, source) = MuxStream::new(shim, &self.config.stream);
            state
                .channels
                .insert(channel, ChannelEntry::Live(Arc::clone(&source)));
            (stream, source, state.closed.clone())
        };
        if let Some(reason) = closed {
            source.receive_close(
                Some(ChannelError::TransportClosed(reason).to_string()),
                Responder::detached(),
            );
        }
        Ok(stream)
    }

    fn release(&self, channel: ChannelId) {
        debug!(channel, "channel released");
        self.lock().channels.insert(channel, ChannelEntry::Closed);
    }

    fn resolve(&self, tid: Tid, result: std::result::Result<(), ChannelError>) {
        let done = self.lock().outstanding.remove(&tid);
        match done {
            Some(done) => done(result),
            None => trace!(tid, "ignoring response to unknown transaction"),
        }
    }

    fn handle_frame(&self, frame: TransportFrame) {
        if let TransportFrame::Text(text) = &frame {
            warn!(len = text.len(), "ignoring text frame");
            return;
        }
        for payload in frame.into_payloads() {
            match decode_message(&payload) {
                Ok(msg) => self.handle_message(msg),
                Err(err) => warn!(error = %err, len = payload.len(), "dropping malformed frame"),
            }
        }
    }

    fn handle_message(&self, msg: Message) {
        trace!(kind = msg.kind().name(), tid = msg.tid(), channel = ?msg.channel(), "received message");
        match msg {
            Message::Ack { tid } => self.resolve(tid, Ok(())),
            Message::Nack { tid, error } => self.resolve(tid, Err(ChannelError::Rejected(error))),
            Message::Create {
                tid,
                channel,
                metadata,
            } => self.handle_create(tid, channel, metadata),
            Message::Data {
                tid,
                channel,
                payload,
            } => match self.lookup(channel) {
                // A stream destroyed locally stays live until its Close is
                // acknowledged and answers "stream is closed" until then; the
                // tombstone left afterwards answers "stream closed".
                Lookup::Live(source) => source.receive(payload, self.responder(tid)),
                Lookup::Closed => self.respond(tid, Err(ChannelError::Closed)),
                Lookup::Missing => self.respond(tid, Err(ChannelError::NotFound)),
            },
            Message::Close {
                tid,
                channel,
                reason,
            } => match self.lookup(channel) {
                Lookup::Live(source) => {
                    debug!(channel, reason = ?reason, "remote closed channel");
                    source.receive_close(reason, self.responder(tid));
                }
                Lookup::Closed => self.respond(tid, Ok(())),
                Lookup::Missing => self.respond(tid, Err(ChannelError::NotFound)),
            },
        }
    }

    fn handle_create(&self, tid: Tid, channel: ChannelId, metadata: Bytes) {
        let parity = self.config.parity;
        if parity.owns_channel(channel) {
            warn!(
                channel,
                expected = ?parity.opposite(),
                "remote opened a channel outside its id range"
            );
            self.respond(tid, Err(ChannelError::ForeignChannelId));
            return;
        }
        let Some(policy) = self.policy.clone() else {
            debug!(channel, "no accept policy, refusing channel");
            self.respond(tid, Err(ChannelError::CreateUnsupported));
            return;
        };
        if self.lock().channels.contains_key(&channel) {
            warn!(channel, "remote reused a channel id");
            self.respond(tid, Err(ChannelError::AlreadyExists));
            return;
        }

        let respond = CreateResponder {
            inner: self.this.clone(),
            tid,
            channel,
            metadata: metadata.clone(),
            answered: false,
        };
        policy.on_create(&metadata, respond);
    }

    fn accept_channel(&self, tid: Tid, channel: ChannelId, metadata: Bytes) {
        if self.lock().closed.is_some() {
            return;
        }

        // Registered before the Ack goes out so the first Data finds it.
        let stream = match self.open_channel(channel) {
            Ok(stream) => stream,
            Err(err) => {
                self.respond(tid, Err(err));
                return;
            }
        };
        self.respond(tid, Ok(()));
        debug!(channel, "accepted channel");

        let incoming = self.lock().incoming.clone();
        if let Some(incoming) = incoming {
            if incoming
                .send(IncomingChannel {
                    channel,
                    metadata,
                    stream,
                })
                .is_err()
            {
                debug!(channel, "no listener for inbound channel");
            }
        }
    }

    /// Tear everything down after the transport is gone.
    fn fail(&self, reason: String) {
        let (outstanding, sources) = {
            let mut state = self.lock();
            if state.closed.is_some() {
                return;
            }
            state.closed = Some(reason.clone());
            state.incoming = None;
            let outstanding: Vec<Completion> =
                state.outstanding.drain().map(|(_, done)| done).collect();
            let sources: Vec<Arc<dyn ShimSource>> = state
                .channels
                .values_mut()
                .filter_map(|entry| match std::mem::replace(entry, ChannelEntry::Closed) {
                    ChannelEntry::Live(source) => Some(source),
                    ChannelEntry::Closed => None,
                })
                .collect();
            (outstanding, sources)
        };
        self.shutdown.cancel();

        warn!(
            reason = %reason,
            channels = sources.len(),
            outstanding = outstanding.len(),
            "multiplexer stopped"
        );
        let err = ChannelError::TransportClosed(reason);
        for done in outstanding {
            done(Err(err.clone()));
        }
        for source in sources {
            source.receive_close(Some(err.to_string()), Responder::detached());
        }
    }
}

/// Outbound half of one channel.
struct MuxShim {
    channel: ChannelId,
    inner: Weak<MuxInner>,
}

impl MuxShim {
    fn gone(done: Completion) {
        done(Err(ChannelError::TransportClosed(
            "multiplexer dropped".to_string(),
        )));
    }
}

impl ShimSink for MuxShim {
    fn write(&self, payload: Option<Bytes>, done: Completion) {
        match self.inner.upgrade() {
            Some(inner) => inner.send_data(self.channel, payload, Some(done)),
            None => Self::gone(done),
        }
    }

    fn send_close(&self, reason: Option<String>, done: Completion) {
        match self.inner.upgrade() {
            Some(inner) => inner.send_close(self.channel, reason, Some(done)),
            None => Self::gone(done),
        }
    }

    fn release(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.release(self.channel);
        }
    }
}

async fn read_loop<S>(inner: Arc<MuxInner>, mut source: S)
where
    S: Stream<Item = wsmux_transport::Result<TransportFrame>> + Unpin,
{
    let reason = loop {
        let next = tokio::select! {
            _ = inner.shutdown.cancelled() => break "multiplexer closed".to_string(),
            next = source.next() => next,
        };
        match next {
            Some(Ok(frame)) => inner.handle_frame(frame),
            Some(Err(err)) => break err.to_string(),
            None => break "connection ended".to_string(),
        }
    };
    inner.fail(reason);
}

async fn write_loop<K>(
    inner: Weak<MuxInner>,
    mut sink: K,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    shutdown: CancellationToken,
) where
    K: Sink<Bytes, Error = TransportError> + Unpin,
{
    let result: std::result::Result<(), TransportError> = async {
        loop {
            tokio::select! {
                biased;
                frame = outbound.recv() => match frame {
                    Some(frame) => {
                        sink.feed(frame).await?;
                        while let Ok(frame) = outbound.try_recv() {
                            sink.feed(frame).await?;
                        }
                        sink.flush().await?;
                    }
                    None => break,
                },
                _ = shutdown.cancelled() => break,
            }
        }
        while let Ok(frame) = outbound.try_recv() {
            sink.feed(frame).await?;
        }
        sink.close().await
    }
    .await;

    if let Err(err) = result {
        warn!(error = %err, "transport write failed");
        if let Some(inner) = inner.upgrade() {
            inner.fail(err.to_string());
        }
    }
}

/// Configures and starts a [`Multiplexer`].
#[derive(Default)]
pub struct MultiplexerBuilder {
    config: MuxConfig,
    policy: Option<Arc<dyn AcceptPolicy>>,
}

impl MultiplexerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: MuxConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.config.parity = parity;
        self
    }

    pub fn with_stream_config(mut self, stream: StreamConfig) -> Self {
        self.config.stream = stream;
        self
    }

    /// Accept inbound channels. Without a policy every inbound Create is
    /// refused with "unable to create connections".
    pub fn with_accept_policy(mut self, policy: impl AcceptPolicy) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    /// Take ownership of `transport` and start the reader and writer tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<T: Transport>(self, transport: T) -> (Multiplexer, Incoming) {
        let (sink, source) = transport.split();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let parity = self.config.parity;

        let inner = Arc::new_cyclic(|this| MuxInner {
            this: this.clone(),
            config: self.config,
            policy: self.policy,
            state: Mutex::new(MuxState::new(parity, in_tx)),
            outbound: out_tx,
            shutdown: shutdown.clone(),
            writer: Mutex::new(None),
        });

        let writer = tokio::spawn(write_loop(Arc::downgrade(&inner), sink, out_rx, shutdown));
        *inner.writer.lock().unwrap_or_else(PoisonError::into_inner) = Some(writer);
        tokio::spawn(read_loop(Arc::clone(&inner), source));
        debug!(parity = ?parity, "multiplexer started");

        (Multiplexer { inner }, Incoming { rx: in_rx })
    }
}

impl fmt::Debug for MultiplexerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiplexerBuilder")
            .field("config", &self.config)
            .field("accepts", &self.policy.is_some())
            .finish()
    }
}

/// Many channels over one transport connection.
///
/// Cloning yields another handle to the same connection. The connection stays
/// up while the transport does, even if every handle is dropped; use
/// [`close`](Self::close) to end it.
#[derive(Clone)]
pub struct Multiplexer {
    inner: Arc<MuxInner>,
}

impl Multiplexer {
    /// Start a multiplexer that refuses inbound channels.
    pub fn spawn<T: Transport>(transport: T, config: MuxConfig) -> (Self, Incoming) {
        MultiplexerBuilder::new().with_config(config).spawn(transport)
    }

    pub fn builder() -> MultiplexerBuilder {
        MultiplexerBuilder::new()
    }

    /// Open a channel. Resolves once the remote peer accepts it.
    pub async fn create_channel(&self, metadata: impl Into<Bytes>) -> Result<MuxStream> {
        let metadata = metadata.into();
        let channel = {
            let mut state = self.inner.lock();
            state.check_open()?;
            state.allocate_channel()
        };

        let (tx, rx) = oneshot::channel();
        let inner = Arc::downgrade(&self.inner);
        self.inner.send_create(
            channel,
            metadata,
            Box::new(move |result| {
                // Runs on the reader task, so the channel is registered before
                // any message that follows the Ack is dispatched.
                let outcome = result.and_then(|()| match inner.upgrade() {
                    Some(inner) => inner.open_channel(channel).inspect_err(|err| {
                        warn!(channel, "acknowledged channel id is already in use");
                        inner.send_close(channel, Some(err.to_string()), None);
                    }),
                    None => Err(ChannelError::TransportClosed(
                        "multiplexer dropped".to_string(),
                    )),
                });
                let _ = tx.send(outcome);
            }),
        );

        let stream = rx.await.map_err(|_| {
            ChannelError::TransportClosed("multiplexer dropped".to_string())
        })??;
        debug!(channel, "channel created");
        Ok(stream)
    }

    pub fn parity(&self) -> Parity {
        self.inner.config.parity
    }

    /// Why the multiplexer stopped, once it has.
    pub fn closed_reason(&self) -> Option<String> {
        self.inner.lock().closed.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed.is_some()
    }

    /// Number of channels currently open.
    pub fn live_channels(&self) -> usize {
        self.inner
            .lock()
            .channels
            .values()
            .filter(|entry| matches!(entry, ChannelEntry::Live(_)))
            .count()
    }

    /// Close the connection.
    ///
    /// Frames already queued are written first, then the transport is closed.
    /// Every open channel is destroyed and every pending request fails.
    pub async fn close(&self) {
        self.inner.fail("multiplexer closed".to_string());
        let writer = self
            .inner
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(writer) = writer {
            let _ = writer.await;
        }
    }
}

impl fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Multiplexer")
            .field("parity", &self.inner.config.parity)
            .field("channels", &state.channels.len())
            .field("outstanding", &state.outstanding.len())
            .field("closed", &state.closed)
            .finish()
    }
}
