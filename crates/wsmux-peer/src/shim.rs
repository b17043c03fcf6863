//! The seam between a [`MuxStream`](crate::MuxStream) and the multiplexer.
//!
//! A stream talks to its channel through a [`ShimSink`] and is fed by the
//! multiplexer through a [`ShimSource`]. Every outbound request carries a
//! [`Completion`] that fires exactly once with the remote response, and every
//! inbound delivery carries a [`Responder`] that must be answered exactly once.

use std::fmt;

use bytes::Bytes;

use crate::error::ChannelError;

/// Callback fired once with the outcome of a request.
pub type Completion = Box<dyn FnOnce(Result<(), ChannelError>) + Send + 'static>;

/// Outbound half of a channel, as seen by its stream.
pub trait ShimSink: Send + Sync + 'static {
    /// Send a Data message. `None` marks the end of the stream.
    fn write(&self, payload: Option<Bytes>, done: Completion);

    /// Send a Close message. `None` is a clean close.
    fn send_close(&self, reason: Option<String>, done: Completion);

    /// The stream is finished with this channel. The id stays reserved.
    fn release(&self);
}

/// Inbound half of a channel, as seen by the multiplexer.
pub trait ShimSource: Send + Sync + 'static {
    /// Deliver a Data payload. `ack` is answered once the payload is consumed.
    fn receive(&self, payload: Option<Bytes>, ack: Responder);

    /// Deliver a Close. `ack` is answered once the stream has torn down.
    fn receive_close(&self, reason: Option<String>, ack: Responder);
}

/// One-shot answer to an inbound request.
///
/// Dropping a responder without answering it answers with
/// [`ChannelError::StreamClosed`].
pub struct Responder {
    respond: Option<Completion>,
}

impl Responder {
    pub fn new(respond: impl FnOnce(Result<(), ChannelError>) + Send + 'static) -> Self {
        Self {
            respond: Some(Box::new(respond)),
        }
    }

    /// A responder whose answer goes nowhere.
    pub fn detached() -> Self {
        Self { respond: None }
    }

    pub fn ack(self) {
        self.respond(Ok(()));
    }

    pub fn nack(self, err: ChannelError) {
        self.respond(Err(err));
    }

    pub fn respond(mut self, result: Result<(), ChannelError>) {
        if let Some(respond) = self.respond.take() {
            respond(result);
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if let Some(respond) = self.respond.take() {
            respond(Err(ChannelError::StreamClosed));
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("answered", &self.respond.is_none())
            .finish()
    }
}
