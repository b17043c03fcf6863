//! Flow-controlled channel streams multiplexed over one transport.
//!
//! A [`Multiplexer`] owns one transport connection and carries any number of
//! channels over it. Each channel is exposed as a [`MuxStream`], a duplex byte
//! stream (`AsyncRead + AsyncWrite`) with two independent backpressure loops:
//! received data is acknowledged only once the application pulls it, and
//! writes stall once too many bytes are waiting for the remote acknowledgement.
//!
//! ```rust,ignore
//! use wsmux_peer::{MultiplexerBuilder, Parity};
//! use tokio::io::AsyncWriteExt;
//!
//! let (mux, _incoming) = MultiplexerBuilder::new()
//!     .with_parity(Parity::Even)
//!     .spawn(transport);
//! let mut stream = mux.create_channel(&br#"{"name":"x"}"#[..]).await?;
//! stream.write_all(b"hello").await?;
//! stream.shutdown().await?;
//! ```

pub mod config;
pub mod error;
pub mod multiplexer;
pub mod shim;
pub mod stream;
pub mod window;

pub use config::{
    MuxConfig, Parity, StreamConfig, DEFAULT_READ_BUFFER_SIZE, DEFAULT_WRITE_MAX_OUTSTANDING,
};
pub use error::{ChannelError, PeerError, Result};
pub use multiplexer::{
    AcceptPolicy, CreateResponder, Incoming, IncomingChannel, Multiplexer, MultiplexerBuilder,
};
pub use shim::{Completion, Responder, ShimSink, ShimSource};
pub use stream::MuxStream;
pub use window::WriteWindow;
