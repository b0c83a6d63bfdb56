#![allow(dead_code)]

use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use rustls::ServerConfig;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use wiretap::dial::StaticResolver;
use wiretap::tls::TlsConfig;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub const BODY: &str = "hello world";

pub fn init() {
    let _ = tracing_subscriber::fmt::try_init();
    let _ = rustls::crypto::ring::default_provider().install_default();
}

pub fn tls_server_config() -> ServerConfig {
    let (_, cert) =
        pem_rfc7468::decode_vec(include_bytes!("../minica/example.com/cert.pem")).unwrap();
    let (label, key) =
        pem_rfc7468::decode_vec(include_bytes!("../minica/example.com/key.pem")).unwrap();

    let cert = rustls::pki_types::CertificateDer::from(cert);
    let key = match label {
        "PRIVATE KEY" => rustls::pki_types::PrivateKeyDer::Pkcs8(key.into()),
        "EC PRIVATE KEY" => rustls::pki_types::PrivateKeyDer::Sec1(key.into()),
        _ => panic!("unknown key type"),
    };

    let mut cfg = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .unwrap();

    cfg.alpn_protocols.push(b"http/1.1".to_vec());
    cfg
}

pub fn tls_root_store() -> rustls::RootCertStore {
    let mut root_store = rustls::RootCertStore::empty();
    let (_, cert) = pem_rfc7468::decode_vec(include_bytes!("../minica/minica.pem")).unwrap();
    root_store
        .add(rustls::pki_types::CertificateDer::from(cert))
        .unwrap();
    root_store
}

pub fn tls_config() -> TlsConfig {
    TlsConfig::new(tls_root_store())
}

/// Resolves every test host name to the loopback address.
pub fn resolver() -> StaticResolver {
    let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
    let mut resolver = StaticResolver::new()
        .with("example.com", localhost)
        .with("wronghost.test", localhost);

    for i in 0..10 {
        resolver.insert(format!("a{i}.example.com"), localhost);
    }
    resolver
}

/// A test server bound to a loopback port, stopped when dropped.
#[derive(Debug)]
pub struct Server {
    pub port: u16,
    handle: JoinHandle<()>,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn hello(
    _req: http::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    Ok(http::Response::new(Full::new(Bytes::from_static(
        BODY.as_bytes(),
    ))))
}

async fn serve_http<IO>(io: IO)
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    if let Err(error) = hyper::server::conn::http1::Builder::new()
        .serve_connection(TokioIo::new(io), hyper::service::service_fn(hello))
        .await
    {
        tracing::debug!(%error, "test connection failed");
    }
}

/// An HTTP/1.1 server answering every request with [`BODY`].
pub async fn http_server() -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::spawn(serve_http(stream));
        }
    });

    Server { port, handle }
}

/// An HTTPS server for `example.com` answering every request with [`BODY`].
pub async fn https_server() -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let acceptor = TlsAcceptor::from(Arc::new(tls_server_config()));

    let handle = tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                match acceptor.accept(stream).await {
                    Ok(stream) => serve_http(stream).await,
                    Err(error) => tracing::debug!(%error, "test handshake failed"),
                }
            });
        }
    });

    Server { port, handle }
}

/// A server which accepts one connection, reads from it and never answers.
///
/// The handle resolves once the client has closed the connection.
pub async fn silent_server() -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf).await;
    });

    (port, handle)
}

pub fn count_separators(haystack: &str) -> usize {
    haystack.matches(wiretap::sink::SEPARATOR).count()
}
