/// Errors that can occur on a transport connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the underlying byte stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The WebSocket layer reported an error.
    #[cfg(feature = "websocket")]
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A length-prefixed frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x574D \"WM\")")]
    InvalidMagic,

    /// A frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The byte stream ended in the middle of a frame.
    #[error("connection closed (incomplete frame)")]
    IncompleteFrame,

    /// The transport has been closed locally or by the remote end.
    #[error("transport closed")]
    Closed,

    /// The transport failed for a reason reported by the other end.
    #[error("transport failed: {0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
