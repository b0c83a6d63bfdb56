//! TCP connection establishment.
//!
//! Sockets are created through `socket2` so that keep-alive can be applied
//! before the connection is opened, then handed to tokio for the connect.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpSocket, TcpStream};
use tracing::{trace, warn, Instrument};

/// Configuration for opening TCP connections.
///
/// Fields left as `None` disable the corresponding setting. Use struct update
/// syntax to override individual fields:
///
/// ```
/// # use std::time::Duration;
/// # use wiretap::dial::DialConfig;
/// let config = DialConfig {
///     connect_timeout: Some(Duration::from_secs(5)),
///     ..Default::default()
/// };
/// assert_eq!(config.keep_alive, Some(Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialConfig {
    /// Bound on resolving and connecting to a remote address.
    pub connect_timeout: Option<Duration>,

    /// Idle time before TCP keep-alive probes are sent.
    pub keep_alive: Option<Duration>,

    /// Whether to disable Nagle's algorithm.
    pub nodelay: bool,
}

impl Default for DialConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(30)),
            keep_alive: Some(Duration::from_secs(30)),
            nodelay: true,
        }
    }
}

/// Connect to the first reachable address, trying each in order.
///
/// Returns the error from the last attempt when none succeed.
pub(crate) async fn connect(addrs: &[SocketAddr], config: &DialConfig) -> io::Result<TcpStream> {
    let mut last = None;

    for addr in addrs {
        let span = tracing::trace_span!("connect", remote.addr = %addr);
        match connect_one(addr, config).instrument(span).await {
            Ok(stream) => return Ok(stream),
            Err(error) => {
                trace!(%addr, %error, "connection attempt failed");
                last = Some(error);
            }
        }
    }

    Err(last.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses to connect to")
    }))
}

async fn connect_one(addr: &SocketAddr, config: &DialConfig) -> io::Result<TcpStream> {
    let socket = socket(addr, config)?;
    let stream = socket.connect(*addr).await?;

    if config.nodelay {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("tcp set_nodelay error: {}", e);
        }
    }

    trace!("tcp connected");
    Ok(stream)
}

#[tracing::instrument(skip(config), level = "debug")]
fn socket(addr: &SocketAddr, config: &DialConfig) -> io::Result<TcpSocket> {
    use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};

    let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;
    trace!("tcp socket opened");

    // Tokio expects O_NONBLOCK to already be set on sockets it adopts.
    socket.set_nonblocking(true)?;

    if let Some(dur) = config.keep_alive {
        let conf = TcpKeepalive::new().with_time(dur);
        if let Err(e) = socket.set_tcp_keepalive(&conf) {
            warn!("tcp set_keepalive error: {}", e);
        }
    }

    Ok(TcpSocket::from_std_stream(socket.into()))
}
