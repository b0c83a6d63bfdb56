//! TLS client configuration.
//!
//! Certificate chains are always validated against the configured roots while
//! the handshake runs. Matching the certificate against the dialed host name
//! is a separate step, performed by the dialer after the handshake completes
//! and switchable with [`TlsConfig::with_hostname_verification`].

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{verify_server_cert_signed_by_trust_anchor, verify_server_name};
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::{ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme};

/// TLS settings used when dialing `https` connections.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    config: Arc<rustls::ClientConfig>,
    verify_hostname: bool,
}

impl TlsConfig {
    /// Build a configuration trusting the given roots.
    pub fn new(roots: RootCertStore) -> Self {
        let provider = crypto_provider();
        let verifier = ChainVerifier {
            roots: Arc::new(roots),
            algorithms: provider.signature_verification_algorithms,
        };

        let mut config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .expect("crypto provider supports the default protocol versions")
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();

        // HTTP/2 would make the mirrored traffic binary.
        config.alpn_protocols.push(b"http/1.1".to_vec());

        Self {
            config: Arc::new(config),
            verify_hostname: true,
        }
    }

    /// Build a configuration trusting the platform's root certificates.
    pub fn native_roots() -> Self {
        let mut roots = RootCertStore::empty();
        let native = rustls_native_certs::load_native_certs();
        for error in &native.errors {
            tracing::warn!(%error, "failed to load platform certificates");
        }

        let (added, ignored) = roots.add_parsable_certificates(native.certs);
        tracing::trace!(added, ignored, "loaded platform root certificates");
        Self::new(roots)
    }

    /// Enable or disable matching the peer certificate against the dialed host.
    pub fn with_hostname_verification(mut self, enabled: bool) -> Self {
        self.verify_hostname = enabled;
        self
    }

    /// Skip matching the peer certificate against the dialed host.
    ///
    /// The certificate chain is still validated.
    pub fn without_hostname_verification(self) -> Self {
        self.with_hostname_verification(false)
    }

    /// Whether the peer certificate is matched against the dialed host.
    pub fn verify_hostname(&self) -> bool {
        self.verify_hostname
    }

    /// The underlying `rustls` client configuration.
    pub fn client_config(&self) -> Arc<rustls::ClientConfig> {
        self.config.clone()
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self::native_roots()
    }
}

/// The process-wide default crypto provider, or the one selected by crate features.
pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    if let Some(provider) = CryptoProvider::get_default() {
        return provider.clone();
    }

    #[cfg(feature = "tls-ring")]
    let provider = rustls::crypto::ring::default_provider();

    #[cfg(all(feature = "tls-aws-lc", not(feature = "tls-ring")))]
    let provider = rustls::crypto::aws_lc_rs::default_provider();

    Arc::new(provider)
}

/// Match the peer's end-entity certificate against `server_name`.
pub(crate) fn verify_peer_name(
    connection: &ClientConnection,
    server_name: &ServerName<'_>,
) -> Result<(), rustls::Error> {
    let end_entity = connection
        .peer_certificates()
        .and_then(|certs| certs.first())
        .ok_or(rustls::Error::NoCertificatesPresented)?;

    let cert = ParsedCertificate::try_from(end_entity)?;
    verify_server_name(&cert, server_name)
}

/// Verifies that the server's certificate chains to a trusted root, without
/// checking which names it covers.
struct ChainVerifier {
    roots: Arc<RootCertStore>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl fmt::Debug for ChainVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainVerifier")
            .field("roots", &self.roots.len())
            .finish()
    }
}

impl ServerCertVerifier for ChainVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let cert = ParsedCertificate::try_from(end_entity)?;
        verify_server_cert_signed_by_trust_anchor(
            &cert,
            &self.roots,
            intermediates,
            now,
            self.algorithms.all,
        )?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
