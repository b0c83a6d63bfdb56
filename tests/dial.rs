//! Dial procedures against local plain and TLS servers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use wiretap::dial::{DialConfig, DialError, Dialer, Network, HANDSHAKE_TIMEOUT};
use wiretap::sink::{Capture, Sink, SEPARATOR};

mod common;

fn dialer() -> (Dialer, Capture) {
    let (sink, capture) = Sink::capture();
    let dialer = Dialer::new(DialConfig::default(), common::tls_config(), sink)
        .with_resolver(common::resolver());
    (dialer, capture)
}

/// A TLS server for `example.com` which completes the handshake and then
/// waits for the client to close the connection.
///
/// The handle resolves to the number of application bytes read.
async fn tls_holding_server() -> (u16, tokio::task::JoinHandle<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let acceptor = TlsAcceptor::from(Arc::new(common::tls_server_config()));

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let Ok(mut stream) = acceptor.accept(stream).await else {
            return 0;
        };

        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf).await;
        buf.len()
    });

    (port, handle)
}

#[tokio::test]
async fn plain_dial_frames_connection() {
    common::init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (dialer, capture) = dialer();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();
        stream.write_all(b"pong").await.unwrap();
    });

    let mut conn = dialer
        .dial_plain(Network::Tcp, &format!("127.0.0.1:{port}"))
        .await
        .unwrap();
    assert_eq!(capture.to_string_lossy(), SEPARATOR);

    conn.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    conn.read_exact(&mut buf).await.unwrap();
    server.await.unwrap();

    assert_eq!(capture.to_string_lossy(), format!("{SEPARATOR}pingpong"));
}

#[tokio::test]
async fn tls_dial_mirrors_plaintext() {
    common::init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let acceptor = TlsAcceptor::from(Arc::new(common::tls_server_config()));
    let (dialer, capture) = dialer();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut stream = acceptor.accept(stream).await.unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).await.unwrap();
        stream.write_all(b"world").await.unwrap();
        stream.flush().await.unwrap();
    });

    let mut conn = dialer
        .dial_tls(Network::Tcp, &format!("example.com:{port}"))
        .await
        .unwrap();
    assert_eq!(capture.to_string_lossy(), SEPARATOR);

    conn.write_all(b"hello").await.unwrap();
    conn.flush().await.unwrap();
    let mut buf = [0u8; 5];
    conn.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"world");
    server.await.unwrap();

    assert_eq!(capture.to_string_lossy(), format!("{SEPARATOR}helloworld"));
}

#[tokio::test]
async fn tls_name_mismatch_is_rejected() {
    common::init();

    let (port, server) = tls_holding_server().await;
    let (dialer, capture) = dialer();

    let error = dialer
        .dial_tls(Network::Tcp, &format!("wronghost.test:{port}"))
        .await
        .unwrap_err();

    match error {
        DialError::Verification { server_name, .. } => {
            assert_eq!(
                server_name,
                rustls::pki_types::ServerName::try_from("wronghost.test").unwrap()
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let read = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should observe the connection closing")
        .unwrap();
    assert_eq!(read, 0);
    assert!(capture.is_empty());
}

#[tokio::test]
async fn tls_name_mismatch_allowed_without_hostname_verification() {
    common::init();

    let (port, _server) = tls_holding_server().await;
    let (sink, capture) = Sink::capture();
    let dialer = Dialer::new(
        DialConfig::default(),
        common::tls_config().without_hostname_verification(),
        sink,
    )
    .with_resolver(common::resolver());

    let _conn = dialer
        .dial_tls(Network::Tcp, &format!("wronghost.test:{port}"))
        .await
        .unwrap();
    assert_eq!(capture.to_string_lossy(), SEPARATOR);
}

#[tokio::test]
async fn tls_handshake_times_out() {
    common::init();

    let (port, server) = common::silent_server().await;
    let (dialer, capture) = dialer();

    let started = Instant::now();
    let error = dialer
        .dial_tls(Network::Tcp, &format!("example.com:{port}"))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(error, DialError::HandshakeTimeout), "{error:?}");
    assert!(error.is_timeout());
    assert_eq!(error.to_string(), "TLS handshake timeout");
    assert!(elapsed >= HANDSHAKE_TIMEOUT);
    assert!(elapsed < HANDSHAKE_TIMEOUT * 3, "took {elapsed:?}");

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should observe the connection closing")
        .unwrap();
    assert!(capture.is_empty());
}

#[tokio::test]
async fn tls_handshake_failure_closes_connection() {
    common::init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (dialer, capture) = dialer();

    // Answers the ClientHello with plain HTTP, then waits for the client to hang up.
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut hello = [0u8; 1024];
        let _ = stream.read(&mut hello).await.unwrap();
        stream
            .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();

        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest).await;
    });

    let error = dialer
        .dial_tls(Network::Tcp, &format!("example.com:{port}"))
        .await
        .unwrap_err();
    assert!(matches!(error, DialError::Handshake(_)), "{error:?}");
    assert!(!error.is_timeout());

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should observe the connection closing")
        .unwrap();
    assert!(capture.is_empty());
}

#[tokio::test]
async fn dropped_tls_dial_closes_connection() {
    common::init();

    let (port, server) = common::silent_server().await;
    let (dialer, capture) = dialer();

    let address = format!("example.com:{port}");
    let started = Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        dialer.dial_tls(Network::Tcp, &address),
    )
    .await;
    assert!(outcome.is_err(), "dial should still be waiting on the handshake");

    tokio::time::timeout(Duration::from_millis(500), server)
        .await
        .expect("server should observe the connection closing")
        .unwrap();
    assert!(started.elapsed() < HANDSHAKE_TIMEOUT, "took {:?}", started.elapsed());
    assert!(capture.is_empty());
}

#[tokio::test]
async fn concurrent_tls_dials() {
    common::init();

    let server = common::https_server().await;
    let (dialer, capture) = dialer();

    let mut dials = JoinSet::new();
    for i in 0..10 {
        let dialer = dialer.clone();
        let address = format!("a{i}.example.com:{}", server.port);
        dials.spawn(async move { dialer.dial_tls(Network::Tcp, &address).await });
    }

    let mut connections = Vec::new();
    while let Some(result) = dials.join_next().await {
        connections.push(result.unwrap().unwrap());
    }

    assert_eq!(connections.len(), 10);
    assert_eq!(capture.to_string_lossy(), SEPARATOR.repeat(10));
}

#[tokio::test]
async fn refused_connection() {
    common::init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (dialer, capture) = dialer();
    let error = dialer
        .dial_tls(Network::Tcp, &format!("example.com:{port}"))
        .await
        .unwrap_err();

    match error {
        DialError::Connect(error) => {
            assert_eq!(error.kind(), std::io::ErrorKind::ConnectionRefused)
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(capture.is_empty());
}

#[tokio::test]
async fn network_without_matching_address() {
    common::init();

    let (dialer, capture) = dialer();
    let error = dialer
        .dial_plain(Network::Tcp6, "example.com:80")
        .await
        .unwrap_err();

    assert!(matches!(error, DialError::Connect(_)), "{error:?}");
    assert!(capture.is_empty());
}
