//! HTTP client whose connections are mirrored to a [`Sink`].
//!
//! The client delegates HTTP semantics, connection pooling and keep-alive to
//! hyper-util's legacy client. Connections are established by a
//! [`Connector`], which calls the [`Dialer`](crate::dial::Dialer) procedures.
//!
//! Requests pass through the following middleware, outermost first:
//!
//! 1. a response header timeout, when configured;
//! 2. `Accept-Encoding: identity`, when compression is disabled and the
//!    request has no `Accept-Encoding` header of its own.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use tower::util::Oneshot;
use tower::ServiceExt;

use crate::body::{Body, Request};
use crate::dial::DialConfig;
use crate::sink::Sink;

mod builder;
pub mod connector;
mod error;
mod service;

pub use self::builder::Builder;
pub use self::connector::Connector;
pub use self::error::Error;
pub use self::service::SharedService;

/// A boxed client service, as used inside [`Client`].
pub type ClientService = SharedService<Request, http::Response<Incoming>, Error>;

/// HTTP transport settings.
///
/// Fields left as `None` disable the corresponding timeout. Use struct update
/// syntax to override individual fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Nominal bound on TLS handshakes.
    ///
    /// Reported but not enforced: dials always bound the handshake by
    /// [`HANDSHAKE_TIMEOUT`](crate::dial::HANDSHAKE_TIMEOUT).
    pub tls_handshake_timeout: Option<Duration>,

    /// Bound on waiting for the response status line and headers, measured
    /// from when the request is issued.
    pub response_header_timeout: Option<Duration>,

    /// Nominal wait for `100 Continue`.
    ///
    /// Reported but not enforced: request bodies are sent without waiting.
    pub expect_continue_timeout: Option<Duration>,

    /// Ask servers not to compress responses, so the mirrored traffic stays readable.
    pub disable_compression: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls_handshake_timeout: Some(Duration::from_secs(10)),
            response_header_timeout: Some(Duration::from_secs(10)),
            expect_continue_timeout: Some(Duration::from_secs(1)),
            disable_compression: true,
        }
    }
}

/// A high-level async HTTP client which mirrors its wire traffic to a [`Sink`].
///
/// Cloning a client is cheap: clones share the connection pool and sink.
///
/// # Example
/// ```no_run
/// # use wiretap::{Client, Sink};
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new(None, None, Sink::stderr());
/// let response = client.get("http://example.com".parse()?).await?;
/// println!("Response: {:?}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    service: ClientService,
    config: Arc<TransportConfig>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Client {
    fn default() -> Self {
        Builder::default().build()
    }
}

impl Client {
    /// Create a client mirroring to `sink`.
    ///
    /// Configurations left as `None` use their defaults. No connections are
    /// made until the first request.
    pub fn new(dial: Option<DialConfig>, transport: Option<TransportConfig>, sink: Sink) -> Self {
        Builder::default()
            .with_optional_dial(dial)
            .with_optional_transport(transport)
            .with_sink(sink)
            .build()
    }

    /// Create a client mirroring to standard error.
    pub fn new_stderr(dial: Option<DialConfig>, transport: Option<TransportConfig>) -> Self {
        Self::new(dial, transport, Sink::stderr())
    }

    /// Create a builder with default settings.
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub(crate) fn from_parts(service: ClientService, config: TransportConfig) -> Self {
        Self {
            service,
            config: Arc::new(config),
        }
    }

    /// The transport settings this client was built with.
    pub fn transport_config(&self) -> &TransportConfig {
        &self.config
    }

    /// Send an http Request, and return a Future of the Response.
    pub fn request(&self, request: Request) -> Oneshot<ClientService, Request> {
        self.service.clone().oneshot(request)
    }

    /// Make a GET request to the given URI.
    pub async fn get(&self, uri: http::Uri) -> Result<http::Response<Incoming>, Error> {
        let mut request = http::Request::new(Body::empty());
        *request.uri_mut() = uri;
        self.request(request).await
    }
}
