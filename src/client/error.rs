use thiserror::Error;

use crate::dial::DialError;

/// Client error type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The request failed, either while connecting or while exchanging
    /// messages with the server.
    #[error("request: {0}")]
    Request(#[source] hyper_util::client::legacy::Error),

    /// The response headers did not arrive in time.
    #[error("timeout awaiting response headers")]
    ResponseHeaderTimeout,
}

impl Error {
    /// The dial failure that caused this error, if any.
    pub fn dial_error(&self) -> Option<&DialError> {
        let mut source = std::error::Error::source(self);
        while let Some(error) = source {
            if let Some(dial) = error.downcast_ref::<DialError>() {
                return Some(dial);
            }
            source = error.source();
        }
        None
    }

    /// Whether the request failed because a connection could not be established.
    pub fn is_connect(&self) -> bool {
        matches!(self, Error::Request(error) if error.is_connect())
    }
}
