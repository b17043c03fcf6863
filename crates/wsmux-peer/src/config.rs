use wsmux_proto::{ChannelId, Tid};

/// Default receive buffer: bytes pulled into a stream before it stops acknowledging.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 16 * 1024;

/// Default send window: unacknowledged bytes before writes stall.
pub const DEFAULT_WRITE_MAX_OUTSTANDING: usize = 64 * 1024;

/// Which half of the identifier space a peer allocates from.
///
/// Transaction ids start at the parity's first id and count up by one. Channel
/// ids start there too and count up by two, so two peers configured with
/// opposite parities never allocate the same channel id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    Even,
    Odd,
}

impl Parity {
    pub fn first_id(self) -> u64 {
        match self {
            Parity::Even => 0,
            Parity::Odd => 1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Parity::Even => Parity::Odd,
            Parity::Odd => Parity::Even,
        }
    }

    /// Returns true if `channel` belongs to this parity's allocation space.
    pub fn owns_channel(self, channel: ChannelId) -> bool {
        channel % 2 == self.first_id()
    }

    pub(crate) fn first_tid(self) -> Tid {
        self.first_id()
    }
}

/// Per-channel stream configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Bytes the stream buffers for the application before it stops pulling
    /// from its receive queue. Default: 16 KiB.
    pub read_buffer_size: usize,
    /// Unacknowledged bytes above which a write's completion is deferred.
    /// Default: 64 KiB.
    pub write_max_outstanding: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            write_max_outstanding: DEFAULT_WRITE_MAX_OUTSTANDING,
        }
    }
}

impl StreamConfig {
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn with_write_max_outstanding(mut self, bytes: usize) -> Self {
        self.write_max_outstanding = bytes;
        self
    }
}

/// Multiplexer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MuxConfig {
    /// Identifier parity. The two ends of one connection must differ.
    pub parity: Parity,
    /// Configuration applied to every stream this multiplexer creates.
    pub stream: StreamConfig,
}

impl MuxConfig {
    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn with_stream_config(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parities_partition_channel_ids() {
        for id in 0..16u64 {
            assert_ne!(
                Parity::Even.owns_channel(id),
                Parity::Odd.owns_channel(id)
            );
        }
        assert_eq!(Parity::Even.opposite(), Parity::Odd);
    }

    #[test]
    fn defaults() {
        let config = MuxConfig::default();
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.stream.write_max_outstanding, 64 * 1024);
        assert_eq!(config.stream.read_buffer_size, 16 * 1024);
    }
}
