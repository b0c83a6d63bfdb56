//! Parsing of `host:port` dial addresses.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use rustls::pki_types::ServerName;
use thiserror::Error;

/// Error returned when a dial address is malformed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The address has no `:port` suffix.
    #[error("address {0}: missing port in address")]
    MissingPort(String),

    /// The host portion is empty.
    #[error("address {0}: missing host in address")]
    MissingHost(String),

    /// The port is not a number in `0..=65535`.
    #[error("address {0}: invalid port")]
    InvalidPort(String),

    /// An IPv6 literal was not wrapped in brackets.
    #[error("address {0}: too many colons in address")]
    TooManyColons(String),

    /// Brackets around the host are unbalanced or misplaced.
    #[error("address {0}: mismatched brackets in address")]
    MismatchedBrackets(String),

    /// The host cannot be used as a TLS server name.
    #[error("invalid server name {0:?}")]
    InvalidServerName(String),
}

/// A parsed `host:port` dial address.
///
/// IPv6 hosts are written in brackets (`[::1]:443`). The stored host never
/// carries the brackets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    host: Box<str>,
    port: u16,
}

impl Address {
    /// Create an address from its parts.
    pub fn new(host: impl Into<Box<str>>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a `host:port` string.
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        if address.starts_with('[') && address.ends_with(']') {
            return Err(AddressError::MissingPort(address.into()));
        }

        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(address.into()))?;

        let host = match host.strip_prefix('[').map(|inner| inner.strip_suffix(']')) {
            Some(Some(inner)) if !inner.contains(['[', ']']) => inner,
            Some(_) => return Err(AddressError::MismatchedBrackets(address.into())),
            None if host.contains(['[', ']']) => {
                return Err(AddressError::MismatchedBrackets(address.into()))
            }
            None if host.contains(':') => {
                return Err(AddressError::TooManyColons(address.into()))
            }
            None => host,
        };

        if host.is_empty() {
            return Err(AddressError::MissingHost(address.into()));
        }

        let port = port
            .parse()
            .map_err(|_| AddressError::InvalidPort(address.into()))?;

        Ok(Self::new(host, port))
    }

    /// The host, without brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The name the peer's certificate is expected to carry.
    pub fn server_name(&self) -> Result<ServerName<'static>, AddressError> {
        ServerName::try_from(self.host.to_string())
            .map_err(|_| AddressError::InvalidServerName(self.host.to_string()))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.parse::<IpAddr>().is_ok_and(|ip| ip.is_ipv6()) {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
