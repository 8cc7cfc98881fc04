use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Default TCP port of GridConnect hubs.
pub const DEFAULT_PORT: u16 = 12021;

/// Smallest read timeout handed to the socket; zero means "block forever" there.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Connection settings for [`TcpLink`].
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Timeout for establishing the connection. `None` blocks.
    pub connect_timeout: Option<Duration>,
    /// Timeout for each blocking write.
    pub write_timeout: Option<Duration>,
    /// Pause after connecting before the link is used.
    ///
    /// Serial-bridging adapters may reset when a client attaches.
    pub start_delay: Duration,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(5)),
            write_timeout: Some(Duration::from_secs(5)),
            start_delay: Duration::ZERO,
        }
    }
}

/// GridConnect link over a TCP connection.
pub struct TcpLink {
    stream: TcpStream,
    peer: SocketAddr,
    closed: AtomicBool,
}

impl TcpLink {
    /// Connect to `host:port` with default configuration.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with_config(host, port, &TcpConfig::default())
    }

    /// Connect to `host:port` with explicit configuration.
    ///
    /// Every resolved address is tried in order; the last connect error is
    /// reported if none succeeds.
    pub fn connect_with_config(host: &str, port: u16, config: &TcpConfig) -> Result<Self> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                host: host.to_string(),
                source,
            })?
            .collect();

        let mut last_err = None;
        for addr in addrs {
            let attempt = match config.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Self::from_stream(stream, addr, config),
                Err(source) => {
                    debug!(%addr, error = %source, "connect attempt failed");
                    last_err = Some(TransportError::Connect { addr, source });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| TransportError::Resolve {
            host: host.to_string(),
            source: std::io::Error::new(ErrorKind::NotFound, "no addresses resolved"),
        }))
    }

    fn from_stream(stream: TcpStream, peer: SocketAddr, config: &TcpConfig) -> Result<Self> {
        stream.set_nodelay(true)?;
        stream.set_write_timeout(config.write_timeout)?;
        info!(%peer, "connected to gridconnect hub");

        if !config.start_delay.is_zero() {
            debug!(delay = ?config.start_delay, "waiting for adapter restart");
            std::thread::sleep(config.start_delay);
        }

        Ok(Self {
            stream,
            peer,
            closed: AtomicBool::new(false),
        })
    }

    /// Address of the connected hub.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        Ok(())
    }
}

impl Transport for TcpLink {
    fn send(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_open()?;
        let mut stream = &self.stream;
        stream.write_all(bytes)?;
        stream.flush()?;
        Ok(())
    }

    fn recv(&self, max_bytes: usize, timeout: Duration) -> Result<Option<Bytes>> {
        self.ensure_open()?;
        self.stream
            .set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;

        let mut buf = vec![0u8; max_bytes.max(1)];
        let mut stream = &self.stream;
        loop {
            match stream.read(&mut buf) {
                Ok(0) => {
                    if self.closed.load(Ordering::Acquire) {
                        return Err(TransportError::Shutdown);
                    }
                    return Err(TransportError::Closed);
                }
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(Some(Bytes::from(buf)));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Ok(None);
                }
                Err(err) => {
                    if self.closed.load(Ordering::Acquire) {
                        return Err(TransportError::Shutdown);
                    }
                    return Err(TransportError::Io(err));
                }
            }
        }
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(peer = %self.peer, "closing tcp link");
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

impl std::fmt::Debug for TcpLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpLink")
            .field("peer", &self.peer)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}
