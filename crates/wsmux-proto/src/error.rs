/// Errors that can occur while encoding or decoding protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// The serializer failed to write a message.
    #[error("encode failed: {0}")]
    Encode(String),

    /// The payload is not a well-formed message map.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The message kind tag is not one of the five known kinds.
    #[error("unknown message kind {0}")]
    UnknownKind(u8),

    /// A field required by the message kind is absent.
    #[error("{kind} message missing field '{field}'")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    /// The transaction id does not fit the 53-bit range.
    #[error("transaction id {0} exceeds 53-bit range")]
    TidOutOfRange(u64),
}

pub type Result<T> = std::result::Result<T, ProtoError>;
