use std::io;

use rustls::pki_types::ServerName;
use thiserror::Error;

use super::address::AddressError;

/// Error returned by the dial procedures.
///
/// When a dial fails after the TCP connection was opened, that connection
/// has already been closed and nothing was written to the sink.
#[derive(Debug, Error)]
pub enum DialError {
    /// The address could not be parsed, or is not a valid TLS server name.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Resolving or connecting failed.
    #[error(transparent)]
    Connect(io::Error),

    /// The TLS handshake did not finish in time.
    #[error("TLS handshake timeout")]
    HandshakeTimeout,

    /// The TLS handshake failed.
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] io::Error),

    /// The peer certificate does not match the dialed host.
    #[error("certificate is not valid for {server_name:?}")]
    Verification {
        /// The name the certificate was checked against.
        server_name: ServerName<'static>,

        /// The verifier's reason.
        #[source]
        source: rustls::Error,
    },
}

impl DialError {
    /// Whether this error is a connect or handshake timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            DialError::HandshakeTimeout => true,
            DialError::Connect(error) => error.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}
