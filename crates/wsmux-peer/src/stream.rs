use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::oneshot;

use crate::config::StreamConfig;
use crate::error::ChannelError;
use crate::shim::{Completion, Responder, ShimSink, ShimSource};
use crate::window::WriteWindow;

/// One channel presented as a duplex byte stream.
///
/// Reads pull from a receive queue fed by the multiplexer. Each queued payload
/// is acknowledged to the remote peer only when it moves into the read buffer.
/// A new stream fills that buffer up to `read_buffer_size` bytes on its own;
/// past that, payloads stay queued and unacknowledged until the application
/// reads. Writes go straight to the channel; once more
/// than `write_max_outstanding` bytes are unacknowledged, the write that
/// crossed the limit stays pending until the remote catches up.
///
/// `poll_shutdown` sends the end-of-stream marker and completes once the remote
/// acknowledged it. Dropping the stream destroys it cleanly.
pub struct MuxStream {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<StreamState>,
    sink: Arc<dyn ShimSink>,
    read_buffer_size: usize,
}

struct DeferredWrite {
    len: usize,
    waker: Waker,
}

enum Finish {
    Open,
    Sending(Option<Waker>),
    Done(Result<(), ChannelError>),
}

struct StreamState {
    receive_queue: VecDeque<(Option<Bytes>, Responder)>,
    readable: VecDeque<Bytes>,
    readable_len: usize,
    reading: bool,
    read_ended: bool,
    read_waker: Option<Waker>,
    window: WriteWindow<DeferredWrite>,
    released_write: Option<usize>,
    write_error: Option<ChannelError>,
    finish: Finish,
    /// `Some(None)` after a clean destroy, `Some(Some(reason))` after an error.
    destroyed: Option<Option<String>>,
}

/// Acknowledgements and wakeups collected under the lock, run after it is released.
#[derive(Default)]
struct Effects {
    acks: Vec<(Responder, Result<(), ChannelError>)>,
    wakers: Vec<Waker>,
}

impl Effects {
    fn run(self) {
        for (ack, result) in self.acks {
            ack.respond(result);
        }
        for waker in self.wakers {
            waker.wake();
        }
    }
}

impl StreamState {
    fn new(config: &StreamConfig) -> Self {
        Self {
            receive_queue: VecDeque::new(),
            readable: VecDeque::new(),
            readable_len: 0,
            reading: true,
            read_ended: false,
            read_waker: None,
            window: WriteWindow::new(config.write_max_outstanding),
            released_write: None,
            write_error: None,
            finish: Finish::Open,
            destroyed: None,
        }
    }

    /// Move queued payloads into the read buffer, acknowledging each one.
    ///
    /// Once destroyed, every queued entry is failed instead, whether or not
    /// the application is reading.
    fn drain(&mut self, read_buffer_size: usize, fx: &mut Effects) {
        if self.destroyed.is_some() {
            for (_, ack) in self.receive_queue.drain(..) {
                fx.acks.push((ack, Err(ChannelError::StreamClosed)));
            }
            return;
        }
        if !self.reading || self.read_ended {
            return;
        }

        let mut delivered = false;
        while let Some((payload, ack)) = self.receive_queue.pop_front() {
            fx.acks.push((ack, Ok(())));
            delivered = true;
            if !self.deliver(payload, read_buffer_size) {
                self.reading = false;
                break;
            }
        }
        if delivered {
            fx.wakers.extend(self.read_waker.take());
        }
    }

    /// Returns false when the application should stop being fed.
    fn deliver(&mut self, payload: Option<Bytes>, read_buffer_size: usize) -> bool {
        match payload {
            Some(chunk) => {
                self.readable_len += chunk.len();
                if !chunk.is_empty() {
                    self.readable.push_back(chunk);
                }
                self.readable_len < read_buffer_size
            }
            None => {
                self.read_ended = true;
                false
            }
        }
    }

    /// Copy buffered bytes into `buf`. Returns true if anything was copied.
    fn copy_into(&mut self, buf: &mut ReadBuf<'_>) -> bool {
        let mut copied = false;
        while buf.remaining() > 0 {
            let Some(front) = self.readable.front_mut() else {
                break;
            };
            let n = front.len().min(buf.remaining());
            buf.put_slice(&front[..n]);
            front.advance(n);
            if front.is_empty() {
                self.readable.pop_front();
            }
            self.readable_len -= n;
            copied = true;
        }
        copied
    }

    fn write_error(&self) -> Option<ChannelError> {
        if let Some(err) = &self.write_error {
            return Some(err.clone());
        }
        if self.destroyed.is_some() || !matches!(self.finish, Finish::Open) {
            return Some(ChannelError::StreamClosed);
        }
        None
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn receive(&self, payload: Option<Bytes>, ack: Responder) {
        let mut fx = Effects::default();
        {
            let mut state = self.lock();
            state.receive_queue.push_back((payload, ack));
            state.drain(self.read_buffer_size, &mut fx);
        }
        fx.run();
    }

    fn on_write_done(&self, len: usize, result: Result<(), ChannelError>) {
        let mut fx = Effects::default();
        {
            let mut state = self.lock();
            let failed = result.is_err();
            if let Err(err) = result {
                state.write_error.get_or_insert(err);
            }
            let mut released = state.window.finish(len);
            if released.is_none() && failed {
                released = state.window.take_deferred();
            }
            if let Some(deferred) = released {
                state.released_write = Some(deferred.len);
                fx.wakers.push(deferred.waker);
            }
        }
        fx.run();
    }

    fn on_end_sent(&self, result: Result<(), ChannelError>) {
        let waker = {
            let mut state = self.lock();
            match std::mem::replace(&mut state.finish, Finish::Done(result)) {
                Finish::Sending(waker) => waker,
                _ => None,
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Destroy the stream: fail pending receives, wake every waiter and send
    /// Close. `after` fires once the Close is answered, or immediately if the
    /// stream was already destroyed.
    fn destroy(&self, reason: Option<String>, after: Option<Completion>) {
        let mut fx = Effects::default();
        {
            let mut state = self.lock();
            if state.destroyed.is_some() {
                drop(state);
                if let Some(after) = after {
                    after(Ok(()));
                }
                return;
            }
            state.destroyed = Some(reason.clone());
            state.drain(self.read_buffer_size, &mut fx);
            fx.wakers.extend(state.read_waker.take());
            if let Some(deferred) = state.window.take_deferred() {
                fx.wakers.push(deferred.waker);
            }
        }
        fx.run();

        let sink = Arc::clone(&self.sink);
        self.sink.send_close(
            reason,
            Box::new(move |result| {
                sink.release();
                if let Some(after) = after {
                    after(result);
                }
            }),
        );
    }
}

/// Inbound half handed to the multiplexer.
struct StreamSource {
    shared: Arc<Shared>,
}

impl ShimSource for StreamSource {
    fn receive(&self, payload: Option<Bytes>, ack: Responder) {
        self.shared.receive(payload, ack);
    }

    fn receive_close(&self, reason: Option<String>, ack: Responder) {
        self.shared
            .destroy(reason, Some(Box::new(move |result| ack.respond(result))));
    }
}

impl MuxStream {
    /// Bind a stream to a channel's outbound half.
    ///
    /// Returns the stream and the inbound half, which the owner of the channel
    /// uses to deliver Data and Close messages.
    pub fn new(sink: Arc<dyn ShimSink>, config: &StreamConfig) -> (Self, Arc<dyn ShimSource>) {
        let shared = Arc::new(Shared {
            state: Mutex::new(StreamState::new(config)),
            sink,
            read_buffer_size: config.read_buffer_size,
        });
        let source = Arc::new(StreamSource {
            shared: Arc::clone(&shared),
        });
        (Self { shared }, source)
    }

    /// Destroy the stream. `None` is a clean close; `Some(reason)` is
    /// reported to the remote peer as an error.
    pub fn destroy(&self, reason: Option<&str>) {
        self.shared.destroy(reason.map(str::to_owned), None);
    }

    /// Destroy the stream and wait until the remote peer answers the Close.
    pub async fn close(self, reason: Option<&str>) -> Result<(), ChannelError> {
        let (tx, rx) = oneshot::channel();
        self.shared.destroy(
            reason.map(str::to_owned),
            Some(Box::new(move |result| {
                let _ = tx.send(result);
            })),
        );
        rx.await.unwrap_or(Err(ChannelError::StreamClosed))
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.lock().destroyed.is_some()
    }

    /// The error the stream was destroyed with, if any.
    pub fn destroy_reason(&self) -> Option<String> {
        self.shared.lock().destroyed.clone().flatten()
    }

    /// Bytes written but not yet acknowledged by the remote peer.
    pub fn open_send_size(&self) -> usize {
        self.shared.lock().window.open_send_size()
    }
}

impl AsyncRead for MuxStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let shared = &self.shared;
        let mut fx = Effects::default();
        let poll = {
            let mut state = shared.lock();
            if let Some(Some(reason)) = &state.destroyed {
                Poll::Ready(Err(ChannelError::Destroyed(reason.clone()).into()))
            } else {
                state.reading = true;
                state.drain(shared.read_buffer_size, &mut fx);
                if state.copy_into(buf) || state.read_ended || state.destroyed.is_some() {
                    Poll::Ready(Ok(()))
                } else {
                    state.read_waker = Some(cx.waker().clone());
                    Poll::Pending
                }
            }
        };
        fx.run();
        poll
    }
}

impl AsyncWrite for MuxStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let shared = &self.shared;
        let len = buf.len();
        let deferred = {
            let mut state = shared.lock();
            if let Some(done) = state.released_write.take() {
                return Poll::Ready(Ok(done));
            }
            if let Some(deferred) = state.window.deferred_mut() {
                deferred.waker.clone_from(cx.waker());
                return Poll::Pending;
            }
            if let Some(err) = state.write_error() {
                return Poll::Ready(Err(err.into()));
            }
            if len == 0 {
                return Poll::Ready(Ok(0));
            }
            let deferred = state.window.begin(len);
            if deferred {
                state.window.defer(DeferredWrite {
                    len,
                    waker: cx.waker().clone(),
                });
            }
            deferred
        };

        let done = Arc::clone(shared);
        shared.sink.write(
            Some(Bytes::copy_from_slice(buf)),
            Box::new(move |result| done.on_write_done(len, result)),
        );

        if deferred {
            Poll::Pending
        } else {
            Poll::Ready(Ok(len))
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // Chunks go to the channel as soon as they are written.
        match self.shared.lock().write_error.clone() {
            Some(err) => Poll::Ready(Err(err.into())),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let shared = &self.shared;
        {
            let mut state = shared.lock();
            match &mut state.finish {
                Finish::Done(result) => return Poll::Ready(result.clone().map_err(Into::into)),
                Finish::Sending(waker) => {
                    *waker = Some(cx.waker().clone());
                    return Poll::Pending;
                }
                Finish::Open => {}
            }
            if let Some(err) = state.write_error() {
                return Poll::Ready(Err(err.into()));
            }
            state.finish = Finish::Sending(Some(cx.waker().clone()));
        }

        let done = Arc::clone(shared);
        shared
            .sink
            .write(None, Box::new(move |result| done.on_end_sent(result)));
        Poll::Pending
    }
}

impl Drop for MuxStream {
    fn drop(&mut self) {
        self.shared.destroy(None, None);
    }
}

impl fmt::Debug for MuxStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("MuxStream")
            .field("queued", &state.receive_queue.len())
            .field("readable", &state.readable_len)
            .field("open_send_size", &state.window.open_send_size())
            .field("read_ended", &state.read_ended)
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures_util::task::noop_waker_ref;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Data(Option<Bytes>),
        Close(Option<String>),
        Release,
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<Sent>>,
        pending: Mutex<VecDeque<Completion>>,
        auto_ack: bool,
    }

    impl RecordingSink {
        fn manual() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn auto() -> Arc<Self> {
            Arc::new(Self {
                auto_ack: true,
                ..Self::default()
            })
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn record(&self, sent: Sent, done: Completion) {
            self.sent.lock().unwrap().push(sent);
            if self.auto_ack {
                done(Ok(()));
            } else {
                self.pending.lock().unwrap().push_back(done);
            }
        }

        /// Answer the oldest unanswered request.
        fn answer(&self, result: Result<(), ChannelError>) {
            let done = self.pending.lock().unwrap().pop_front().unwrap();
            done(result);
        }
    }

    impl ShimSink for RecordingSink {
        fn write(&self, payload: Option<Bytes>, done: Completion) {
            self.record(Sent::Data(payload), done);
        }

        fn send_close(&self, reason: Option<String>, done: Completion) {
            self.record(Sent::Close(reason), done);
        }

        fn release(&self) {
            self.sent.lock().unwrap().push(Sent::Release);
        }
    }

    type Acks = Arc<Mutex<Vec<Result<(), ChannelError>>>>;

    fn responder(acks: &Acks) -> Responder {
        let acks = Arc::clone(acks);
        Responder::new(move |res| acks.lock().unwrap().push(res))
    }

    fn small_window() -> StreamConfig {
        StreamConfig::default()
            .with_write_max_outstanding(8)
            .with_read_buffer_size(4)
    }

    fn poll_write(stream: &mut MuxStream, data: &[u8]) -> Poll<io::Result<usize>> {
        let mut cx = Context::from_waker(noop_waker_ref());
        Pin::new(stream).poll_write(&mut cx, data)
    }

    fn poll_read(stream: &mut MuxStream, out: &mut [u8]) -> Poll<io::Result<usize>> {
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut buf = ReadBuf::new(out);
        match Pin::new(stream).poll_read(&mut cx, &mut buf) {
            Poll::Ready(Ok(())) => Poll::Ready(Ok(buf.filled().len())),
            Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
            Poll::Pending => Poll::Pending,
        }
    }

    #[test]
    fn writes_under_threshold_complete_immediately() {
        let sink = RecordingSink::manual();
        let (mut stream, _source) = MuxStream::new(sink.clone(), &small_window());

        assert!(matches!(poll_write(&mut stream, b"abcd"), Poll::Ready(Ok(4))));
        assert!(matches!(poll_write(&mut stream, b"efgh"), Poll::Ready(Ok(4))));
        assert_eq!(stream.open_send_size(), 8);

        sink.answer(Ok(()));
        sink.answer(Ok(()));
        assert_eq!(stream.open_send_size(), 0);
    }

    #[test]
    fn write_over_threshold_waits_for_credit() {
        let sink = RecordingSink::manual();
        let (mut stream, _source) = MuxStream::new(sink.clone(), &small_window());

        assert!(matches!(poll_write(&mut stream, b"abcdef"), Poll::Ready(Ok(6))));
        assert!(poll_write(&mut stream, b"ghij").is_pending());
        assert_eq!(stream.open_send_size(), 10);

        // Retrying while deferred neither resends nor completes.
        assert!(poll_write(&mut stream, b"ghij").is_pending());
        assert_eq!(sink.sent().len(), 2);

        sink.answer(Ok(()));
        assert!(matches!(poll_write(&mut stream, b"ghij"), Poll::Ready(Ok(4))));
        assert_eq!(sink.sent().len(), 2);
        assert_eq!(stream.open_send_size(), 4);
    }

    #[test]
    fn failed_write_surfaces_on_next_write() {
        let sink = RecordingSink::manual();
        let (mut stream, _source) = MuxStream::new(sink.clone(), &small_window());

        assert!(matches!(poll_write(&mut stream, b"ab"), Poll::Ready(Ok(2))));
        sink.answer(Err(ChannelError::Closed));

        match poll_write(&mut stream, b"cd") {
            Poll::Ready(Err(err)) => assert_eq!(err.to_string(), "stream closed"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn acks_stop_once_read_buffer_is_full() {
        let sink = RecordingSink::manual();
        let (mut stream, source) = MuxStream::new(sink, &small_window());
        let acks = Acks::default();

        source.receive(Some(Bytes::from_static(b"abcd")), responder(&acks));
        assert_eq!(acks.lock().unwrap().len(), 1);
        source.receive(Some(Bytes::from_static(b"efgh")), responder(&acks));
        assert_eq!(acks.lock().unwrap().len(), 1);

        let mut out = [0u8; 16];
        assert!(matches!(poll_read(&mut stream, &mut out), Poll::Ready(Ok(8))));
        assert_eq!(&out[..8], b"abcdefgh");
        assert_eq!(*acks.lock().unwrap(), vec![Ok(()), Ok(())]);
    }

    #[test]
    fn partial_reads_resume_draining() {
        let sink = RecordingSink::manual();
        let (mut stream, source) = MuxStream::new(sink, &small_window());
        let acks = Acks::default();

        for chunk in [&b"abcd"[..], b"ef", b"gh"] {
            source.receive(Some(Bytes::copy_from_slice(chunk)), responder(&acks));
        }
        assert_eq!(acks.lock().unwrap().len(), 1);

        let mut out = [0u8; 3];
        assert!(matches!(poll_read(&mut stream, &mut out), Poll::Ready(Ok(3))));
        assert_eq!(&out, b"abc");
        assert_eq!(acks.lock().unwrap().len(), 2);

        let mut out = [0u8; 8];
        assert!(matches!(poll_read(&mut stream, &mut out), Poll::Ready(Ok(5))));
        assert_eq!(&out[..5], b"defgh");
        assert_eq!(acks.lock().unwrap().len(), 3);
        assert!(poll_read(&mut stream, &mut out).is_pending());
    }

    #[test]
    fn end_of_stream_reads_as_eof() {
        let sink = RecordingSink::manual();
        let (mut stream, source) = MuxStream::new(sink, &StreamConfig::default());
        let acks = Acks::default();

        source.receive(Some(Bytes::from_static(b"x")), responder(&acks));
        source.receive(None, responder(&acks));

        let mut out = [0u8; 4];
        assert!(matches!(poll_read(&mut stream, &mut out), Poll::Ready(Ok(1))));
        assert!(matches!(poll_read(&mut stream, &mut out), Poll::Ready(Ok(0))));
        assert_eq!(*acks.lock().unwrap(), vec![Ok(()), Ok(())]);
    }

    #[test]
    fn destroy_fails_every_queued_receive() {
        let sink = RecordingSink::manual();
        let (stream, source) = MuxStream::new(sink.clone(), &small_window());
        let acks = Acks::default();

        for chunk in [&b"full"[..], b"a", b"b", b"c"] {
            source.receive(Some(Bytes::copy_from_slice(chunk)), responder(&acks));
        }
        assert_eq!(*acks.lock().unwrap(), vec![Ok(())]);

        stream.destroy(Some("boom"));
        assert_eq!(
            *acks.lock().unwrap(),
            vec![
                Ok(()),
                Err(ChannelError::StreamClosed),
                Err(ChannelError::StreamClosed),
                Err(ChannelError::StreamClosed),
            ]
        );
        assert_eq!(sink.sent(), vec![Sent::Close(Some("boom".into()))]);

        source.receive(Some(Bytes::from_static(b"late")), responder(&acks));
        assert_eq!(acks.lock().unwrap().len(), 5);
        assert_eq!(acks.lock().unwrap()[4], Err(ChannelError::StreamClosed));
    }

    #[test]
    fn release_follows_close_answer() {
        let sink = RecordingSink::manual();
        let (stream, _source) = MuxStream::new(sink.clone(), &StreamConfig::default());

        stream.destroy(None);
        assert_eq!(sink.sent(), vec![Sent::Close(None)]);

        sink.answer(Ok(()));
        assert_eq!(sink.sent(), vec![Sent::Close(None), Sent::Release]);

        drop(stream);
        assert_eq!(sink.sent().len(), 2);
    }

    #[test]
    fn remote_close_acks_after_close_answer() {
        let sink = RecordingSink::manual();
        let (mut stream, source) = MuxStream::new(sink.clone(), &StreamConfig::default());
        let acks = Acks::default();

        source.receive_close(Some("boom".into()), responder(&acks));
        assert!(acks.lock().unwrap().is_empty());
        sink.answer(Ok(()));
        assert_eq!(*acks.lock().unwrap(), vec![Ok(())]);

        assert_eq!(stream.destroy_reason().as_deref(), Some("boom"));
        let mut out = [0u8; 4];
        match poll_read(&mut stream, &mut out) {
            Poll::Ready(Err(err)) => assert_eq!(err.to_string(), "boom"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn remote_close_on_destroyed_stream_acks_immediately() {
        let sink = RecordingSink::manual();
        let (stream, source) = MuxStream::new(sink.clone(), &StreamConfig::default());
        let acks = Acks::default();

        stream.destroy(None);
        source.receive_close(None, responder(&acks));
        assert_eq!(*acks.lock().unwrap(), vec![Ok(())]);
        assert_eq!(sink.sent(), vec![Sent::Close(None)]);
    }

    #[test]
    fn clean_destroy_keeps_buffered_data_then_eof() {
        let sink = RecordingSink::manual();
        let (mut stream, source) = MuxStream::new(sink, &StreamConfig::default());
        let acks = Acks::default();

        let mut out = [0u8; 4];
        assert!(poll_read(&mut stream, &mut out).is_pending());
        source.receive(Some(Bytes::from_static(b"hi")), responder(&acks));
        stream.destroy(None);

        assert!(matches!(poll_read(&mut stream, &mut out), Poll::Ready(Ok(2))));
        assert!(matches!(poll_read(&mut stream, &mut out), Poll::Ready(Ok(0))));
    }

    #[test]
    fn write_after_destroy_fails() {
        let sink = RecordingSink::manual();
        let (mut stream, _source) = MuxStream::new(sink, &StreamConfig::default());

        stream.destroy(None);
        match poll_write(&mut stream, b"x") {
            Poll::Ready(Err(err)) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn shutdown_sends_end_of_stream() {
        let sink = RecordingSink::auto();
        let (mut stream, _source) = MuxStream::new(sink.clone(), &StreamConfig::default());

        stream.write_all(b"hello").await.unwrap();
        stream.shutdown().await.unwrap();

        assert_eq!(
            sink.sent(),
            vec![
                Sent::Data(Some(Bytes::from_static(b"hello"))),
                Sent::Data(None)
            ]
        );
        assert!(stream.write_all(b"more").await.is_err());
    }

    #[tokio::test]
    async fn read_to_end_preserves_order() {
        let sink = RecordingSink::auto();
        let (mut stream, source) = MuxStream::new(sink, &small_window());

        for chunk in [&b"one "[..], b"two ", b"three"] {
            source.receive(Some(Bytes::copy_from_slice(chunk)), Responder::detached());
        }
        source.receive(None, Responder::detached());

        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"one two three");
    }

    #[tokio::test]
    async fn close_resolves_with_remote_answer() {
        let sink = RecordingSink::auto();
        let (stream, _source) = MuxStream::new(sink.clone(), &StreamConfig::default());

        stream.close(Some("done")).await.unwrap();
        assert_eq!(
            sink.sent(),
            vec![Sent::Close(Some("done".into())), Sent::Release]
        );
    }
}
