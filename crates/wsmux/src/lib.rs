//! Flow-controlled channel multiplexing over a single WebSocket connection.
//!
//! wsmux carries any number of independent duplex byte streams over one
//! ordered message transport. Every channel has its own backpressure in both
//! directions and its own lifecycle; a transport failure ends all of them.
//!
//! # Crate Structure
//!
//! - [`transport`]: The transport boundary (WebSocket, in-memory, length-prefixed streams)
//! - [`proto`]: Protocol messages and their CBOR encoding
//! - [`peer`]: The multiplexer and its flow-controlled streams
//!
//! The most used types are re-exported at the root.

/// Re-export transport types.
pub mod transport {
    pub use wsmux_transport::*;
}

/// Re-export protocol types.
pub mod proto {
    pub use wsmux_proto::*;
}

/// Re-export peer types.
pub mod peer {
    pub use wsmux_peer::*;
}

pub use wsmux_peer::{
    AcceptPolicy, ChannelError, CreateResponder, Incoming, IncomingChannel, MuxConfig, MuxStream,
    Multiplexer, MultiplexerBuilder, Parity, PeerError, StreamConfig,
};
