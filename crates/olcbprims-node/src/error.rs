use olcbprims_frame::Alias;

/// Errors that can occur in node operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] olcbprims_transport::TransportError),

    /// Frame-level error, including malformed GridConnect text.
    #[error("frame error: {0}")]
    Frame(#[from] olcbprims_frame::FrameError),

    /// Frame type this stack recognises but does not decode.
    #[error("unsupported frame type: {0}")]
    UnsupportedFrameType(&'static str),

    /// Payload exceeds what the message kind can carry.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// MTI does not fit a standard CAN frame.
    #[error("mti 0x{0:03X} does not fit a standard CAN frame")]
    InvalidMti(u16),

    /// Destination presence does not match the MTI's address bit.
    #[error("mti 0x{mti:03X} {}", if *.addressed { "requires a destination" } else { "cannot carry a destination" })]
    AddressMismatch { mti: u16, addressed: bool },

    /// A frame sequence does not form one message.
    #[error("cannot reassemble message: {0}")]
    Reassembly(String),

    /// Every alias in the configured range was found in use.
    #[error("no free alias in {first}..={last}")]
    AllocationExhausted { first: Alias, last: Alias },

    /// A node id or alias lookup exhausted its retry budget.
    #[error("no mapping for {target} after {attempts} attempts")]
    ResolutionTimeout { target: String, attempts: usize },

    /// Configuration rejected before the engine started.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The engine has been shut down.
    #[error("node engine shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, NodeError>;
