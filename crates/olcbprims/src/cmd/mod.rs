use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Subcommand};
use olcbprims_frame::{Alias, EventId, FrameError, NodeId};
use olcbprims_node::{connect_with_config, MessageEngine, NodeConfig};
use olcbprims_transport::{TcpConfig, DEFAULT_PORT};

use crate::exit::{node_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod frame;
pub mod listen;
pub mod resolve;
pub mod send;
pub mod verify;
pub mod version;

/// Receive-loop read timeout for CLI sessions. Keeps exit snappy.
const SESSION_READ_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one raw GridConnect frame.
    Frame(FrameArgs),
    /// Send one OpenLCB message.
    Send(SendArgs),
    /// Print received messages.
    Listen(ListenArgs),
    /// Ask every node to identify itself.
    Verify(VerifyArgs),
    /// Map a node id to its alias, or an alias to its node id.
    Resolve(ResolveArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Frame(args) => frame::run(args, link, format),
        Command::Send(args) => send::run(args, link, format),
        Command::Listen(args) => listen::run(args, link, format),
        Command::Verify(args) => verify::run(args, link, format),
        Command::Resolve(args) => resolve::run(args, link, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where to connect and who to be.
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// GridConnect hub host.
    #[arg(long, env = "OLCB_HOST", default_value = "localhost", global = true)]
    pub host: String,
    /// GridConnect hub port.
    #[arg(long, env = "OLCB_PORT", default_value_t = DEFAULT_PORT, global = true)]
    pub port: u16,
    /// This node's id (e.g. 01.02.03.04.05.06).
    #[arg(long, env = "OLCB_NODE_ID", default_value = "01.02.03.04.05.06", global = true)]
    pub node_id: NodeId,
    /// Connect timeout, and how long to wait for replies (e.g. 3s, 500ms).
    #[arg(long, default_value = "3s", global = true)]
    pub timeout: String,
}

impl LinkArgs {
    pub fn timeout(&self) -> CliResult<Duration> {
        parse_duration(&self.timeout)
    }

    /// Connect to the hub and start a node engine.
    pub fn start_engine(&self) -> CliResult<MessageEngine> {
        let timeout = self.timeout()?;
        let tcp = TcpConfig {
            connect_timeout: Some(timeout),
            ..TcpConfig::default()
        };
        let config = NodeConfig::new(self.node_id).with_read_timeout(SESSION_READ_TIMEOUT);
        connect_with_config(&self.host, self.port, &tcp, config, None)
            .map_err(|err| node_error("connect failed", err))
    }
}

#[derive(Args, Debug)]
pub struct FrameArgs {
    /// Frame text, e.g. ":X19490123N;".
    pub frame: String,
    /// Print frames received until the bus is quiet for --timeout.
    #[arg(long)]
    pub wait: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// MTI in hex (e.g. 0x5B4).
    #[arg(value_parser = parse_mti)]
    pub mti: u16,
    /// Destination node, required for addressed MTIs.
    #[arg(long)]
    pub dest: Option<NodeId>,
    /// Payload bytes in hex.
    #[arg(long, conflicts_with = "event")]
    pub data: Option<String>,
    /// Event id payload (e.g. 05.01.01.01.22.60.00.01).
    #[arg(long, conflicts_with = "data")]
    pub event: Option<EventId>,
    /// Print messages addressed to this node until quiet for --timeout.
    #[arg(long)]
    pub wait: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Skip addressed messages for other nodes.
    #[arg(long)]
    pub to_me: bool,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Only ask this node to answer.
    #[arg(long)]
    pub node: Option<NodeId>,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Node id (dotted) or alias (hex, e.g. 0x456).
    pub target: ResolveTarget,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Argument of `resolve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveTarget {
    Node(NodeId),
    Alias(Alias),
}

impl FromStr for ResolveTarget {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains(['.', ':']) || s.len() == 2 * NodeId::LEN {
            s.parse().map(ResolveTarget::Node)
        } else {
            s.parse().map(ResolveTarget::Alias)
        }
    }
}

fn parse_mti(input: &str) -> Result<u16, String> {
    let digits = input
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|err| format!("invalid mti {input:?}: {err}"))
}

/// Hex payload; spaces, dots and colons between bytes are ignored.
pub fn parse_hex_bytes(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !matches!(b, b' ' | b'.' | b':'))
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("--data has an odd number of hex digits: {input}"),
        ));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|text| u8::from_str_radix(text, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("--data is not hex: {input}")))
        })
        .collect()
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
    }

    #[test]
    fn hex_payload_ignores_separators() {
        assert_eq!(parse_hex_bytes("05.01.01").unwrap(), vec![5, 1, 1]);
        assert_eq!(parse_hex_bytes("0a0B").unwrap(), vec![0x0A, 0x0B]);
        assert_eq!(parse_hex_bytes("").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_hex_bytes("123").unwrap_err().code, USAGE);
        assert_eq!(parse_hex_bytes("zz").unwrap_err().code, USAGE);
    }

    #[test]
    fn mti_accepts_prefixed_and_bare_hex() {
        assert_eq!(parse_mti("0x5B4").unwrap(), 0x5B4);
        assert_eq!(parse_mti("490").unwrap(), 0x490);
        assert!(parse_mti("0xZZ").is_err());
    }

    #[test]
    fn resolve_target_detects_node_ids_and_aliases() {
        assert_eq!(
            "01.02.03.04.05.06".parse::<ResolveTarget>().unwrap(),
            ResolveTarget::Node(NodeId::new([1, 2, 3, 4, 5, 6]))
        );
        assert_eq!(
            "0x456".parse::<ResolveTarget>().unwrap(),
            ResolveTarget::Alias(Alias::new(0x456).unwrap())
        );
        assert!("0x000".parse::<ResolveTarget>().is_err());
    }
}
