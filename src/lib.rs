//! Wiretap
//!
//! An HTTP client which copies every byte it sends and receives to a sink,
//! while the connection keeps working normally for the caller.
//!
//! Each new connection is announced in the sink by a [`sink::SEPARATOR`]
//! banner, followed by the raw HTTP/1.1 traffic. For TLS connections the
//! sink sees the decrypted traffic.
//!
//! ```no_run
//! # async fn demo() -> Result<(), wiretap::client::Error> {
//! let client = wiretap::Client::new_stderr(None, None);
//! let response = client.get("http://example.com/".parse().unwrap()).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

use std::future::Future;
use std::pin::Pin;

#[cfg(not(any(feature = "tls-ring", feature = "tls-aws-lc")))]
compile_error!("wiretap requires one of the `tls-ring` or `tls-aws-lc` features");

pub mod body;
pub use body::Body;
pub mod client;
pub use client::Client;
pub mod dial;
pub mod sink;
pub use sink::Sink;
pub mod tee;
pub use tee::Tee;
pub mod tls;

/// A boxed error which can be sent across threads.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
