//! WebSocket transport (tokio-tungstenite).

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use futures_util::Sink;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::TransportFrame;

/// WebSocket connection carrying wsmux messages as binary frames.
///
/// Ping/pong is answered by tungstenite itself. A close frame ends the inbound
/// stream.
pub struct WsTransport<S> {
    stream: WebSocketStream<S>,
}

impl<S> WsTransport<S> {
    pub fn new(stream: WebSocketStream<S>) -> Self {
        Self { stream }
    }

    pub fn get_ref(&self) -> &WebSocketStream<S> {
        &self.stream
    }

    pub fn into_inner(self) -> WebSocketStream<S> {
        self.stream
    }
}

/// Open a client connection to a `ws://` URL.
pub async fn connect(url: &str) -> Result<WsTransport<MaybeTlsStream<TcpStream>>> {
    let (stream, response) = tokio_tungstenite::connect_async(url).await?;
    debug!(url, status = %response.status(), "websocket connected");
    Ok(WsTransport::new(stream))
}

/// Complete the server side of the WebSocket handshake on an accepted stream.
pub async fn accept<S>(io: S) -> Result<WsTransport<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let stream = tokio_tungstenite::accept_async(io).await?;
    Ok(WsTransport::new(stream))
}

impl<S> Stream for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    type Item = Result<TransportFrame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let next = ready!(Pin::new(&mut self.stream).poll_next(cx));
            let frame = match next {
                Some(Ok(WsMessage::Binary(data))) => TransportFrame::Binary(data),
                Some(Ok(WsMessage::Text(text))) => TransportFrame::Text(text.as_str().to_owned()),
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(?frame, "websocket close received");
                    return Poll::Ready(None);
                }
                // Control frames are handled inside tungstenite.
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Poll::Ready(Some(Err(TransportError::from(err)))),
                None => return Poll::Ready(None),
            };
            return Poll::Ready(Some(Ok(frame)));
        }
    }
}

impl<S> Sink<Bytes> for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    type Error = TransportError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.stream).poll_ready(cx).map_err(Into::into)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Bytes) -> Result<()> {
        Pin::new(&mut self.stream)
            .start_send(WsMessage::Binary(item))
            .map_err(Into::into)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx).map_err(Into::into)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.stream).poll_close(cx).map_err(Into::into)
    }
}

impl<S> std::fmt::Debug for WsTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport").finish_non_exhaustive()
    }
}
