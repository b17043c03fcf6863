use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use futures_util::Sink;
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::traits::TransportFrame;

type Event = Result<TransportFrame>;

/// One end of an in-process transport pair.
///
/// Everything written to one end is delivered, in order, to the other. Closing
/// or dropping an end ends the other end's inbound stream.
#[derive(Debug)]
pub struct MemoryTransport {
    tx: Option<mpsc::UnboundedSender<Event>>,
    rx: mpsc::UnboundedReceiver<Event>,
}

/// Create two connected in-process transport ends.
pub fn pair() -> (MemoryTransport, MemoryTransport) {
    let (left_tx, right_rx) = mpsc::unbounded_channel();
    let (right_tx, left_rx) = mpsc::unbounded_channel();

    (
        MemoryTransport {
            tx: Some(left_tx),
            rx: left_rx,
        },
        MemoryTransport {
            tx: Some(right_tx),
            rx: right_rx,
        },
    )
}

impl MemoryTransport {
    /// Deliver an arbitrary frame (batch or text included) to the other end.
    pub fn send_frame(&self, frame: TransportFrame) -> Result<()> {
        self.push(Ok(frame))
    }

    /// Make the other end observe a transport failure.
    pub fn send_error(&self, err: TransportError) -> Result<()> {
        self.push(Err(err))
    }

    /// Returns true once this end has been closed for writing.
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().is_none_or(|tx| tx.is_closed())
    }

    fn push(&self, event: Event) -> Result<()> {
        match &self.tx {
            Some(tx) => tx.send(event).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }
}

impl Stream for MemoryTransport {
    type Item = Result<TransportFrame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Sink<Bytes> for MemoryTransport {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        if self.is_closed() {
            return Poll::Ready(Err(TransportError::Closed));
        }
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Bytes) -> Result<()> {
        self.push(Ok(TransportFrame::Binary(item)))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.tx.take();
        Poll::Ready(Ok(()))
    }
}
