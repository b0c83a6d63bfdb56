//! Adapts the [`Dialer`] to hyper-util's connection pool.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::Uri;
use hyper_util::client::legacy::connect::{Connected, Connection as HyperConnection};
use hyper_util::rt::TokioIo;
use pin_project::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::dial::{Address, AddressError, DialError, Dialer, Network};
use crate::tee::Tee;
use crate::BoxFuture;

/// A [`tower::Service`] which opens a mirrored connection for a URI.
///
/// `https` URIs are dialed with TLS, everything else as plain TCP.
#[derive(Debug, Clone)]
pub struct Connector {
    dialer: Dialer,
    network: Network,
}

impl Connector {
    /// Create a connector around a dialer.
    pub fn new(dialer: Dialer, network: Network) -> Self {
        Self { dialer, network }
    }

    /// The dialer used to open connections.
    pub fn dialer(&self) -> &Dialer {
        &self.dialer
    }
}

impl tower::Service<Uri> for Connector {
    type Response = Connection;
    type Error = DialError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let dialer = self.dialer.clone();
        let network = self.network;

        Box::pin(async move {
            let (address, tls) = dial_address(&uri)?;
            let address = address.to_string();

            let stream = if tls {
                Stream::Tls(Box::new(dialer.dial_tls(network, &address).await?))
            } else {
                Stream::Plain(dialer.dial_plain(network, &address).await?)
            };

            Ok(Connection {
                io: TokioIo::new(stream),
            })
        })
    }
}

/// The address to dial for `uri`, and whether TLS is required.
fn dial_address(uri: &Uri) -> Result<(Address, bool), AddressError> {
    let host = uri
        .host()
        .ok_or_else(|| AddressError::MissingHost(uri.to_string()))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');

    let tls = uri.scheme_str() == Some("https");
    let port = match uri.port_u16() {
        Some(port) => port,
        None if tls => 443,
        None => 80,
    };

    Ok((Address::new(host, port), tls))
}

enum Stream {
    Plain(Tee<TcpStream>),
    Tls(Box<Tee<TlsStream<TcpStream>>>),
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Stream::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Stream::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Stream::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Stream::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// A mirrored connection, as handed to hyper.
#[derive(Debug)]
#[pin_project]
pub struct Connection {
    #[pin]
    io: TokioIo<Stream>,
}

impl Connection {
    /// Whether this connection runs over TLS.
    pub fn is_tls(&self) -> bool {
        matches!(self.io.inner(), Stream::Tls(_))
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stream::Plain(_) => f.debug_tuple("Plain").finish(),
            Stream::Tls(_) => f.debug_tuple("Tls").finish(),
        }
    }
}

impl HyperConnection for Connection {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

impl hyper::rt::Read for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        self.project().io.poll_read(cx, buf)
    }
}

impl hyper::rt::Write for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.project().io.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().io.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().io.poll_shutdown(cx)
    }
}
