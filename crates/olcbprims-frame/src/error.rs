/// Errors that can occur during GridConnect encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The text is not a well-formed `:X<header>N<data>;` frame.
    #[error("malformed gridconnect frame: {0}")]
    MalformedFrame(String),

    /// More data bytes than a CAN frame can carry.
    #[error("frame data too long ({size} bytes, max {max})")]
    DataTooLong { size: usize, max: usize },

    /// A node id, alias or event id could not be parsed or is out of range.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        FrameError::MalformedFrame(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
