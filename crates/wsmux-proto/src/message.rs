use bytes::Bytes;

/// Transaction id. Unique among one peer's outstanding requests.
pub type Tid = u64;

/// Logical channel id.
pub type ChannelId = u64;

/// Largest transaction id that survives a round trip through an IEEE double.
pub const MAX_TID: Tid = (1 << 53) - 1;

/// Wire tag of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Ack = 0,
    Nack = 1,
    Create = 2,
    Data = 3,
    Close = 4,
}

impl MessageKind {
    /// Parse a wire tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Ack),
            1 => Some(Self::Nack),
            2 => Some(Self::Create),
            3 => Some(Self::Data),
            4 => Some(Self::Close),
            _ => None,
        }
    }

    /// Human-readable name, used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Nack => "nack",
            Self::Create => "create",
            Self::Data => "data",
            Self::Close => "close",
        }
    }
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Transaction `tid` succeeded.
    Ack { tid: Tid },
    /// Transaction `tid` failed.
    Nack { tid: Tid, error: String },
    /// Request to open `channel`. `metadata` is opaque to the multiplexer.
    Create {
        tid: Tid,
        channel: ChannelId,
        metadata: Bytes,
    },
    /// Payload for `channel`. `None` marks the end of the stream.
    Data {
        tid: Tid,
        channel: ChannelId,
        payload: Option<Bytes>,
    },
    /// Close `channel`, with an error reason unless the close is clean.
    Close {
        tid: Tid,
        channel: ChannelId,
        reason: Option<String>,
    },
}

impl Message {
    pub fn ack(tid: Tid) -> Self {
        Self::Ack { tid }
    }

    pub fn nack(tid: Tid, error: impl Into<String>) -> Self {
        Self::Nack {
            tid,
            error: error.into(),
        }
    }

    pub fn tid(&self) -> Tid {
        match self {
            Self::Ack { tid }
            | Self::Nack { tid, .. }
            | Self::Create { tid, .. }
            | Self::Data { tid, .. }
            | Self::Close { tid, .. } => *tid,
        }
    }

    /// The addressed channel. Ack and Nack address none.
    pub fn channel(&self) -> Option<ChannelId> {
        match self {
            Self::Ack { .. } | Self::Nack { .. } => None,
            Self::Create { channel, .. }
            | Self::Data { channel, .. }
            | Self::Close { channel, .. } => Some(*channel),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Ack { .. } => MessageKind::Ack,
            Self::Nack { .. } => MessageKind::Nack,
            Self::Create { .. } => MessageKind::Create,
            Self::Data { .. } => MessageKind::Data,
            Self::Close { .. } => MessageKind::Close,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_match_wire_values() {
        for tag in 0..=4u8 {
            let kind = MessageKind::from_u8(tag).unwrap();
            assert_eq!(kind as u8, tag);
        }
        assert!(MessageKind::from_u8(5).is_none());
    }

    #[test]
    fn responses_address_no_channel() {
        assert_eq!(Message::ack(3).channel(), None);
        assert_eq!(Message::nack(4, "nope").channel(), None);

        let data = Message::Data {
            tid: 9,
            channel: 2,
            payload: None,
        };
        assert_eq!(data.channel(), Some(2));
        assert_eq!(data.tid(), 9);
        assert_eq!(data.kind().name(), "data");
    }
}
