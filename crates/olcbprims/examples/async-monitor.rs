//! Print every frame crossing a GridConnect hub, using the tokio codec.
//!
//! Run with:
//!   cargo run --example async-monitor --features async -- localhost 12021
//!
//! The monitor never transmits, so it needs no alias of its own.

use futures_util::StreamExt;
use olcbprims::frame::{mti::mti_name, FrameKind, GridConnectCodec};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port: u16 = args.next().map(|p| p.parse()).transpose()?.unwrap_or(12021);

    let stream = TcpStream::connect((host.as_str(), port)).await?;
    eprintln!("monitoring {host}:{port}");

    let mut frames = FramedRead::new(stream, GridConnectCodec::new());
    while let Some(frame) = frames.next().await {
        let frame = frame?;
        match frame.kind() {
            FrameKind::Standard { mti, source } => {
                println!("{frame}  {} from {source:03X}", mti_name(mti));
            }
            kind => println!("{frame}  {}", kind.name()),
        }
    }

    Ok(())
}
