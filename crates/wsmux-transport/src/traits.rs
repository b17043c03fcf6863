use bytes::Bytes;
use futures_core::Stream;
use futures_util::Sink;

use crate::error::{Result, TransportError};

/// One inbound message delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFrame {
    /// A single binary message.
    Binary(Bytes),
    /// Several binary messages delivered together. Consumers handle them in order.
    Batch(Vec<Bytes>),
    /// A text message. wsmux never sends these.
    Text(String),
}

impl TransportFrame {
    /// Binary payloads carried by this frame, in delivery order.
    ///
    /// Text frames carry none.
    pub fn into_payloads(self) -> Vec<Bytes> {
        match self {
            TransportFrame::Binary(payload) => vec![payload],
            TransportFrame::Batch(payloads) => payloads,
            TransportFrame::Text(_) => Vec::new(),
        }
    }
}

/// A reliable, ordered, message-framed, bidirectional connection.
///
/// Inbound frames are read as a [`Stream`]; the stream ending (or yielding an
/// error) is the terminal close event. Outbound messages are written through
/// the [`Sink`] half, one binary message per item.
pub trait Transport:
    Stream<Item = Result<TransportFrame>> + Sink<Bytes, Error = TransportError> + Send + Unpin + 'static
{
}

impl<T> Transport for T where
    T: Stream<Item = Result<TransportFrame>>
        + Sink<Bytes, Error = TransportError>
        + Send
        + Unpin
        + 'static
{
}
