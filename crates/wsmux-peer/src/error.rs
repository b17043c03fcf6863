use std::io;

/// Channel-scoped failures.
///
/// This is the value carried by completions and acknowledgements. Its display
/// text is what travels in a Nack, so the variants render as bare reasons.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The remote peer answered with a Nack.
    #[error("{0}")]
    Rejected(String),

    /// The addressed channel was never opened.
    #[error("stream not found")]
    NotFound,

    /// The addressed channel existed and has been closed.
    #[error("stream closed")]
    Closed,

    /// The local stream has been destroyed.
    #[error("stream is closed")]
    StreamClosed,

    /// No acceptance policy is configured for inbound channels.
    #[error("unable to create connections")]
    CreateUnsupported,

    /// An inbound Create named a channel id that is already registered.
    #[error("channel already exists")]
    AlreadyExists,

    /// An inbound Create named a channel id from the receiver's own range.
    #[error("channel id belongs to the receiving peer")]
    ForeignChannelId,

    /// The stream was destroyed with an error reason.
    #[error("{0}")]
    Destroyed(String),

    /// A message could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The transport failed or was closed; fatal to every channel.
    #[error("transport closed: {0}")]
    TransportClosed(String),
}

impl From<ChannelError> for io::Error {
    fn from(err: ChannelError) -> Self {
        let kind = match err {
            ChannelError::StreamClosed | ChannelError::Closed => io::ErrorKind::BrokenPipe,
            ChannelError::NotFound => io::ErrorKind::NotFound,
            ChannelError::TransportClosed(_) => io::ErrorKind::ConnectionAborted,
            ChannelError::Destroyed(_) => io::ErrorKind::ConnectionReset,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Errors surfaced by multiplexer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] wsmux_transport::TransportError),

    /// Protocol encoding error.
    #[error("protocol error: {0}")]
    Proto(#[from] wsmux_proto::ProtoError),

    /// The channel operation failed.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

pub type Result<T> = std::result::Result<T, PeerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nack_reasons_render_bare() {
        assert_eq!(ChannelError::NotFound.to_string(), "stream not found");
        assert_eq!(ChannelError::Closed.to_string(), "stream closed");
        assert_eq!(ChannelError::StreamClosed.to_string(), "stream is closed");
        assert_eq!(
            ChannelError::CreateUnsupported.to_string(),
            "unable to create connections"
        );
        assert_eq!(ChannelError::Rejected("nope".into()).to_string(), "nope");
        assert_eq!(
            ChannelError::ForeignChannelId.to_string(),
            "channel id belongs to the receiving peer"
        );
    }

    #[test]
    fn io_conversion_keeps_reason() {
        let err: io::Error = ChannelError::Destroyed("boom".into()).into();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(err.to_string(), "boom");

        let err: io::Error = ChannelError::StreamClosed.into();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
