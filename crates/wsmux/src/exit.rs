use std::fmt;
use std::io;

use wsmux_peer::{ChannelError, PeerError};
use wsmux_proto::ProtoError;
use wsmux_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const REJECTED: i32 = 4;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::AddrInUse => TRANSPORT_ERROR,
        io::ErrorKind::BrokenPipe | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::FrameTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn proto_error(context: &str, err: ProtoError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    let code = match &err {
        ChannelError::Rejected(_) | ChannelError::CreateUnsupported => REJECTED,
        ChannelError::TransportClosed(_) => TRANSPORT_ERROR,
        ChannelError::Protocol(_) => INTERNAL,
        _ => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Proto(err) => proto_error(context, err),
        PeerError::Channel(err) => channel_error(context, err),
    }
}

pub fn timeout(context: &str) -> CliError {
    CliError::new(TIMEOUT, format!("{context}: timed out"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_maps_to_rejected() {
        let err = peer_error(
            "create failed",
            PeerError::Channel(ChannelError::Rejected("name required".into())),
        );
        assert_eq!(err.code, REJECTED);
        assert_eq!(err.to_string(), "create failed: name required");
    }

    #[test]
    fn transport_failures_map_to_transport_code() {
        let err = peer_error(
            "send failed",
            PeerError::Channel(ChannelError::TransportClosed("connection ended".into())),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);

        let err = transport_error(
            "connect failed",
            TransportError::Io(io::Error::from(io::ErrorKind::ConnectionRefused)),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn oversized_frames_are_data_errors() {
        let err = transport_error(
            "read failed",
            TransportError::FrameTooLarge { size: 10, max: 5 },
        );
        assert_eq!(err.code, DATA_INVALID);
    }
}
