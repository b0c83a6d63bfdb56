//! Dial procedures: open plain or TLS connections whose traffic is mirrored
//! into a [`Sink`].
//!
//! Every connection returned by [`Dialer::dial_plain`] or [`Dialer::dial_tls`]
//! is fully established, and the [`SEPARATOR`](crate::sink::SEPARATOR) banner
//! has already been written to the sink. Failed dials write nothing to the
//! sink, and close any TCP connection they opened.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{trace, Instrument};

use crate::sink::Sink;
use crate::tee::Tee;
use crate::tls::{self, TlsConfig};

mod address;
pub mod dns;
mod error;
mod tcp;

pub use self::address::{Address, AddressError};
pub use self::dns::{GaiResolver, Resolve, StaticResolver};
pub use self::error::DialError;
pub use self::tcp::DialConfig;

/// Fixed bound on the TLS handshake performed by [`Dialer::dial_tls`].
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Which address families a dial may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Network {
    /// IPv4 or IPv6.
    #[default]
    Tcp,

    /// IPv4 only.
    Tcp4,

    /// IPv6 only.
    Tcp6,
}

impl Network {
    /// Whether `addr` belongs to this network.
    pub fn permits(&self, addr: &SocketAddr) -> bool {
        match self {
            Network::Tcp => true,
            Network::Tcp4 => addr.is_ipv4(),
            Network::Tcp6 => addr.is_ipv6(),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unsupported network name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown network {0:?}")]
pub struct UnknownNetwork(String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            other => Err(UnknownNetwork(other.into())),
        }
    }
}

/// Opens connections and wraps them in a [`Tee`] over a shared [`Sink`].
///
/// Cloning a dialer is cheap, and clones share the sink.
#[derive(Debug, Clone)]
pub struct Dialer {
    config: Arc<DialConfig>,
    tls: TlsConfig,
    resolver: Arc<dyn Resolve>,
    sink: Sink,
}

impl Dialer {
    /// Create a dialer using the system resolver.
    pub fn new(config: DialConfig, tls: TlsConfig, sink: Sink) -> Self {
        Self {
            config: Arc::new(config),
            tls,
            resolver: Arc::new(GaiResolver::new()),
            sink,
        }
    }

    /// Replace the resolver used to look up host names.
    pub fn with_resolver<R>(self, resolver: R) -> Self
    where
        R: Resolve,
    {
        self.with_shared_resolver(Arc::new(resolver))
    }

    pub(crate) fn with_shared_resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = resolver;
        self
    }

    /// The TCP dial configuration.
    pub fn config(&self) -> &DialConfig {
        &self.config
    }

    /// The TLS configuration.
    pub fn tls(&self) -> &TlsConfig {
        &self.tls
    }

    /// The sink connections are mirrored into.
    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    /// Open a plain TCP connection to `address` (`host:port`).
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn dial_plain(
        &self,
        network: Network,
        address: &str,
    ) -> Result<Tee<TcpStream>, DialError> {
        let address = Address::parse(address)?;
        let stream = self.open(network, &address).await?;

        self.sink.separator();
        Ok(Tee::new(stream, self.sink.clone()))
    }

    /// Open a TLS connection to `address` (`host:port`).
    ///
    /// The handshake is bounded by [`HANDSHAKE_TIMEOUT`]. When hostname
    /// verification is enabled the peer certificate must be valid for the
    /// host portion of `address`.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn dial_tls(
        &self,
        network: Network,
        address: &str,
    ) -> Result<Tee<TlsStream<TcpStream>>, DialError> {
        let address = Address::parse(address)?;
        let stream = self.open(network, &address).await?;
        let server_name = address.server_name()?;

        let connector = TlsConnector::from(self.tls.client_config());
        let stream = handshake(connector, server_name.clone(), stream).await?;

        if self.tls.verify_hostname() {
            let (_, connection) = stream.get_ref();
            if let Err(source) = tls::verify_peer_name(connection, &server_name) {
                tracing::debug!(%source, "peer certificate does not match host");
                return Err(DialError::Verification {
                    server_name,
                    source,
                });
            }
        }

        self.sink.separator();
        Ok(Tee::new(stream, self.sink.clone()))
    }

    /// Resolve and connect, bounded by the connect timeout.
    async fn open(&self, network: Network, address: &Address) -> Result<TcpStream, DialError> {
        let connecting = async {
            let addrs: Vec<SocketAddr> = self
                .resolver
                .resolve(address.host(), address.port())
                .await?
                .into_iter()
                .filter(|addr| network.permits(addr))
                .collect();

            if addrs.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("no suitable {network} address found for {address}"),
                ));
            }

            tcp::connect(&addrs, &self.config).await
        };

        let stream = match self.config.connect_timeout {
            Some(dur) => match tokio::time::timeout(dur, connecting).await {
                Ok(result) => result,
                Err(elapsed) => {
                    trace!(timeout = ?dur, "connection timed out");
                    Err(io::Error::new(io::ErrorKind::TimedOut, elapsed))
                }
            },
            None => connecting.await,
        }
        .map_err(DialError::Connect)?;

        trace!(peer.addr = ?stream.peer_addr().ok(), "tcp connection established");
        Ok(stream)
    }
}

/// Race the TLS handshake against [`HANDSHAKE_TIMEOUT`].
///
/// The handshake runs as its own task. On timeout the task is aborted and
/// awaited, so the TCP connection is closed before this returns.
async fn handshake(
    connector: TlsConnector,
    server_name: ServerName<'static>,
    stream: TcpStream,
) -> Result<TlsStream<TcpStream>, DialError> {
    let mut task = dns::JoinHandleFuture::new(tokio::spawn(
        connector
            .connect(server_name, stream)
            .instrument(tracing::Span::current()),
    ));

    let outcome = tokio::select! {
        biased;
        outcome = &mut task => Some(outcome),
        _ = tokio::time::sleep(HANDSHAKE_TIMEOUT) => None,
    };

    match outcome {
        Some(Ok(stream)) => {
            trace!("tls handshake complete");
            Ok(stream)
        }
        Some(Err(error)) => Err(DialError::Handshake(error)),
        None => {
            task.abort();
            let _ = (&mut task).await;
            trace!(timeout = ?HANDSHAKE_TIMEOUT, "tls handshake timed out");
            Err(DialError::HandshakeTimeout)
        }
    }
}
