use std::sync::Arc;

use http::header::ACCEPT_ENCODING;
use http::HeaderValue;
use hyper_util::rt::TokioExecutor;
use tower::ServiceBuilder;
use tower_http::set_header::SetRequestHeaderLayer;

use super::service::{OptionLayerExt, ResponseHeaderTimeoutLayer, SharedService};
use super::{Client, ClientService, Connector, Error, TransportConfig};
use crate::dial::{DialConfig, Dialer, GaiResolver, Network, Resolve};
use crate::sink::Sink;
use crate::tls::TlsConfig;
use crate::Body;

/// A builder for a [`Client`].
///
/// Every setting starts at its default: the system resolver, platform root
/// certificates, and a sink attached to standard error.
#[derive(Debug)]
pub struct Builder {
    dial: DialConfig,
    transport: TransportConfig,
    tls: Option<TlsConfig>,
    resolver: Arc<dyn Resolve>,
    sink: Option<Sink>,
    network: Network,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            dial: DialConfig::default(),
            transport: TransportConfig::default(),
            tls: None,
            resolver: Arc::new(GaiResolver::new()),
            sink: None,
            network: Network::Tcp,
        }
    }
}

impl Builder {
    /// Use the provided TCP dial configuration.
    pub fn with_dial(mut self, config: DialConfig) -> Self {
        self.dial = config;
        self
    }

    /// Use the provided TCP dial configuration, or the default when `None`.
    pub fn with_optional_dial(self, config: Option<DialConfig>) -> Self {
        self.with_dial(config.unwrap_or_default())
    }

    /// Access the TCP dial configuration.
    pub fn dial(&mut self) -> &mut DialConfig {
        &mut self.dial
    }

    /// Use the provided transport configuration.
    pub fn with_transport(mut self, config: TransportConfig) -> Self {
        self.transport = config;
        self
    }

    /// Use the provided transport configuration, or the default when `None`.
    pub fn with_optional_transport(self, config: Option<TransportConfig>) -> Self {
        self.with_transport(config.unwrap_or_default())
    }

    /// Access the transport configuration.
    pub fn transport(&mut self) -> &mut TransportConfig {
        &mut self.transport
    }

    /// Use the provided TLS configuration instead of the platform roots.
    pub fn with_tls(mut self, config: TlsConfig) -> Self {
        self.tls = Some(config);
        self
    }

    /// Use a custom resolver for host names.
    pub fn with_resolver<R>(mut self, resolver: R) -> Self
    where
        R: Resolve,
    {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Mirror connections into `sink`.
    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Restrict the address families used when connecting.
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Build the client.
    pub fn build(self) -> Client {
        let tls = self.tls.unwrap_or_default();
        let sink = self.sink.unwrap_or_default();
        let dialer = Dialer::new(self.dial, tls, sink).with_shared_resolver(self.resolver);
        let connector = Connector::new(dialer, self.network);

        tracing::trace!(
            tls_handshake_timeout = ?self.transport.tls_handshake_timeout,
            expect_continue_timeout = ?self.transport.expect_continue_timeout,
            "informational transport timeouts are not enforced"
        );

        let client = hyper_util::client::legacy::Client::builder(TokioExecutor::new())
            .build::<_, Body>(connector);

        let identity = self
            .transport
            .disable_compression
            .then(|| {
                SetRequestHeaderLayer::if_not_present(
                    ACCEPT_ENCODING,
                    HeaderValue::from_static("identity"),
                )
            });

        let service: ClientService = ServiceBuilder::new()
            .layer(SharedService::layer())
            .optional(
                self.transport
                    .response_header_timeout
                    .map(ResponseHeaderTimeoutLayer::new),
            )
            .optional(identity)
            .map_err(Error::Request)
            .service(client);

        Client::from_parts(service, self.transport)
    }
}
