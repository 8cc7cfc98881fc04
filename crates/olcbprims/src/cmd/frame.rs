use std::time::Instant;

use olcbprims_frame::{decode_frame, FrameScanner};
use olcbprims_transport::{TcpConfig, TcpLink, Transport, TransportError};
use tracing::warn;

use crate::cmd::{FrameArgs, LinkArgs};
use crate::exit::{frame_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

const READ_CHUNK: usize = 1024;

pub fn run(args: FrameArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let frame = decode_frame(args.frame.trim().as_bytes())
        .map_err(|err| frame_error("invalid frame", err))?;
    let quiet = link.timeout()?;

    let tcp = TcpLink::connect_with_config(
        &link.host,
        link.port,
        &TcpConfig {
            connect_timeout: Some(quiet),
            ..TcpConfig::default()
        },
    )
    .map_err(|err| transport_error("connect failed", err))?;

    tcp.send(frame.to_gridconnect().as_bytes())
        .map_err(|err| transport_error("send failed", err))?;

    if args.wait {
        let mut scanner = FrameScanner::new();
        let mut deadline = Instant::now() + quiet;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tcp.recv(READ_CHUNK, remaining) {
                Ok(Some(bytes)) => {
                    scanner.push(&bytes);
                    for scanned in scanner.by_ref() {
                        match scanned {
                            Ok(received) => {
                                print_frame(&received, format);
                                deadline = Instant::now() + quiet;
                            }
                            Err(err) => warn!(error = %err, "skipping malformed frame"),
                        }
                    }
                }
                Ok(None) | Err(TransportError::Closed) => break,
                Err(err) => return Err(transport_error("receive failed", err)),
            }
        }
    }

    tcp.close()
        .map_err(|err| transport_error("close failed", err))?;
    Ok(SUCCESS)
}
