//! wsmux protocol messages and their binary encoding.
//!
//! Five message kinds travel over the transport. Every message carries a
//! transaction id (`tid`) used only to correlate the eventual Ack/Nack with the
//! sender's own outstanding table:
//! - `Ack` / `Nack` answer a transaction
//! - `Create` requests a new channel, carrying opaque metadata
//! - `Data` carries a payload, or the end-of-stream marker when the payload is absent
//! - `Close` tears a channel down, optionally with an error reason
//!
//! Messages are encoded as CBOR maps with single-letter keys. An absent payload
//! and an empty payload encode differently and decode back the same way.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{decode_message, encode_message};
pub use error::{ProtoError, Result};
pub use message::{ChannelId, Message, MessageKind, Tid, MAX_TID};
