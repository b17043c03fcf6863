//! Message-framed transport boundary for wsmux.
//!
//! The multiplexer needs a reliable, in-order, message-framed, bidirectional
//! channel. This crate defines that boundary and the adapters that provide it:
//! - WebSocket connections (behind the `websocket` feature)
//! - An in-process pair, for tests and embedding
//! - Length-prefixed framing over any `AsyncRead + AsyncWrite` byte stream
//!
//! This is the lowest layer of wsmux. Everything else builds on the
//! [`Transport`] trait provided here.

pub mod codec;
pub mod error;
pub mod framed;
pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use codec::{decode_frame, encode_frame, FrameCodec, FrameConfig, DEFAULT_MAX_FRAME, HEADER_SIZE};
pub use error::{Result, TransportError};
pub use framed::StreamTransport;
pub use memory::MemoryTransport;
pub use traits::{Transport, TransportFrame};

#[cfg(feature = "websocket")]
pub use websocket::WsTransport;
