use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use futures_util::Sink;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::codec::{FrameCodec, FrameConfig};
use crate::error::{Result, TransportError};
use crate::traits::TransportFrame;

/// Message framing over a plain byte stream (TCP, Unix sockets, pipes).
///
/// Every outbound message becomes one length-prefixed frame; every complete
/// inbound frame is delivered as one [`TransportFrame::Binary`].
pub struct StreamTransport<T> {
    inner: Framed<T, FrameCodec>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> StreamTransport<T> {
    /// Wrap a byte stream with default configuration.
    pub fn new(io: T) -> Self {
        Self::with_config(io, FrameConfig::default())
    }

    /// Wrap a byte stream with explicit configuration.
    pub fn with_config(io: T, config: FrameConfig) -> Self {
        Self {
            inner: Framed::new(io, FrameCodec::new(config)),
        }
    }

    /// Borrow the underlying byte stream.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }

    /// Consume the transport and return the underlying byte stream.
    ///
    /// Any buffered but undelivered bytes are discarded.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Stream for StreamTransport<T> {
    type Item = Result<TransportFrame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let next = ready!(Pin::new(&mut self.inner).poll_next(cx));
        Poll::Ready(next.map(|item| item.map(TransportFrame::Binary)))
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Sink<Bytes> for StreamTransport<T> {
    type Error = TransportError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.inner).poll_ready(cx)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Bytes) -> Result<()> {
        Pin::new(&mut self.inner).start_send(item)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.inner).poll_close(cx)
    }
}

impl<T> std::fmt::Debug for StreamTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("max_frame_size", &self.inner.codec().config().max_frame_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;

    use super::*;

    #[tokio::test]
    async fn roundtrip_over_duplex() {
        let (left, right) = tokio::io::duplex(1024);
        let mut left = StreamTransport::new(left);
        let mut right = StreamTransport::new(right);

        left.send(Bytes::from_static(b"ping")).await.unwrap();
        left.send(Bytes::from_static(b"")).await.unwrap();

        let first = right.next().await.unwrap().unwrap();
        let second = right.next().await.unwrap().unwrap();
        assert_eq!(first, TransportFrame::Binary(Bytes::from_static(b"ping")));
        assert_eq!(second, TransportFrame::Binary(Bytes::new()));
    }

    #[tokio::test]
    async fn large_frame_survives_small_pipe() {
        let (left, right) = tokio::io::duplex(64);
        let mut left = StreamTransport::new(left);
        let mut right = StreamTransport::new(right);

        let payload = Bytes::from(vec![0xAB; 64 * 1024]);
        let expected = payload.clone();
        let writer = tokio::spawn(async move { left.send(payload).await });

        let frame = right.next().await.unwrap().unwrap();
        writer.await.unwrap().unwrap();
        assert_eq!(frame, TransportFrame::Binary(expected));
    }

    #[tokio::test]
    async fn peer_hangup_ends_stream() {
        let (left, right) = tokio::io::duplex(64);
        let mut right = StreamTransport::new(right);
        drop(left);
        assert!(right.next().await.is_none());
    }

    #[tokio::test]
    async fn garbage_is_reported_as_error() {
        let (mut left, right) = tokio::io::duplex(64);
        let mut right = StreamTransport::new(right);

        left.write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x00])
            .await
            .unwrap();

        let err = right.next().await.unwrap().unwrap_err();
        assert!(matches!(err, TransportError::InvalidMagic));
    }

    #[tokio::test]
    async fn oversized_frame_rejected_by_reader() {
        let (left, right) = tokio::io::duplex(1024);
        let mut left = StreamTransport::new(left);
        let mut right = StreamTransport::with_config(right, FrameConfig { max_frame_size: 8 });

        left.send(Bytes::from_static(b"way too long")).await.unwrap();

        let err = right.next().await.unwrap().unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { .. }));
    }
}
