use std::fmt;
use std::io;

use olcbprims_frame::FrameError;
use olcbprims_node::NodeError;
use olcbprims_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
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
        io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Resolve { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn node_error(context: &str, err: NodeError) -> CliError {
    match err {
        NodeError::Transport(err) => transport_error(context, err),
        NodeError::Frame(err) => frame_error(context, err),
        NodeError::PayloadTooLarge { .. }
        | NodeError::InvalidMti(_)
        | NodeError::AddressMismatch { .. }
        | NodeError::Reassembly(_)
        | NodeError::UnsupportedFrameType(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        NodeError::ResolutionTimeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        NodeError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        NodeError::AllocationExhausted { .. } | NodeError::Shutdown => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_timeout_maps_to_timeout_code() {
        let err = node_error(
            "send failed",
            NodeError::ResolutionTimeout {
                target: "node 01.02.03.04.05.06".to_string(),
                attempts: 3,
            },
        );
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("send failed: "));
    }

    #[test]
    fn refused_connection_is_a_transport_error() {
        let err = transport_error(
            "connect failed",
            TransportError::Io(io::Error::from(io::ErrorKind::ConnectionRefused)),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn bad_payloads_are_data_invalid() {
        let err = node_error("send failed", NodeError::PayloadTooLarge { size: 9, max: 8 });
        assert_eq!(err.code, DATA_INVALID);
        let err = frame_error("parse failed", FrameError::MalformedFrame("x".to_string()));
        assert_eq!(err.code, DATA_INVALID);
    }
}
