//! DNS resolution utilities.

use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::{fmt, io};

use pin_project::{pin_project, pinned_drop};
use tokio::task::JoinHandle;

use crate::BoxFuture;

/// Future returned by a [`Resolve`] implementation.
pub type Resolving = BoxFuture<'static, io::Result<Vec<SocketAddr>>>;

/// Resolves a host name into the socket addresses to dial.
pub trait Resolve: fmt::Debug + Send + Sync + 'static {
    /// Resolve `host`, attaching `port` to every returned address.
    fn resolve(&self, host: &str, port: u16) -> Resolving;
}

/// GetAddrInfo based resolver.
///
/// This resolver uses the `getaddrinfo` system call to resolve
/// hostnames to IP addresses via the operating system.
#[derive(Debug, Default, Clone)]
pub struct GaiResolver {
    _priv: (),
}

impl GaiResolver {
    /// Create a new `GaiResolver`.
    pub fn new() -> Self {
        Self { _priv: () }
    }
}

impl Resolve for GaiResolver {
    fn resolve(&self, host: &str, port: u16) -> Resolving {
        let span = tracing::Span::current();
        let host: Box<str> = host.into();
        Box::pin(JoinHandleFuture::new(tokio::task::spawn_blocking(
            move || {
                tracing::trace_span!(parent: &span, "getaddrinfo", %host).in_scope(|| {
                    tracing::trace!("dns resolution starting");
                    (&*host, port)
                        .to_socket_addrs()
                        .map(|addrs| addrs.collect())
                })
            },
        )))
    }
}

/// Future which awaits a spawned task producing an `io::Result`.
///
/// Dropping the future aborts the task.
#[pin_project(PinnedDrop)]
pub struct JoinHandleFuture<Addr> {
    #[pin]
    handle: JoinHandle<Result<Addr, io::Error>>,
}

impl<Addr> JoinHandleFuture<Addr> {
    pub(crate) fn new(handle: JoinHandle<Result<Addr, io::Error>>) -> Self {
        Self { handle }
    }

    /// Abort the task. Awaiting afterwards waits for it to be torn down.
    pub(crate) fn abort(&self) {
        self.handle.abort()
    }
}

impl<Addr> fmt::Debug for JoinHandleFuture<Addr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandleFuture").finish()
    }
}

impl<Addr> Future for JoinHandleFuture<Addr> {
    type Output = Result<Addr, io::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match ready!(self.project().handle.poll(cx)) {
            Ok(Ok(addrs)) => Poll::Ready(Ok(addrs)),
            Ok(Err(error)) => Poll::Ready(Err(error)),
            Err(join_err) => {
                if join_err.is_cancelled() {
                    Poll::Ready(Err(io::Error::new(io::ErrorKind::Interrupted, join_err)))
                } else {
                    Poll::Ready(Err(io::Error::other(join_err)))
                }
            }
        }
    }
}

#[pinned_drop]
impl<Addr> PinnedDrop for JoinHandleFuture<Addr> {
    fn drop(self: Pin<&mut Self>) {
        self.handle.abort()
    }
}

/// Resolver with a fixed table of host names.
///
/// Names in the table resolve to their pinned address. IP literals resolve
/// to themselves. Everything else is passed to a [`GaiResolver`].
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    hosts: HashMap<Box<str>, IpAddr>,
    fallback: GaiResolver,
}

impl StaticResolver {
    /// Create a resolver with an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `host` to `ip`.
    pub fn with(mut self, host: impl Into<Box<str>>, ip: IpAddr) -> Self {
        self.insert(host, ip);
        self
    }

    /// Pin `host` to `ip`.
    pub fn insert(&mut self, host: impl Into<Box<str>>, ip: IpAddr) {
        self.hosts.insert(host.into(), ip);
    }
}

impl Resolve for StaticResolver {
    fn resolve(&self, host: &str, port: u16) -> Resolving {
        let pinned = self
            .hosts
            .get(host)
            .copied()
            .or_else(|| host.parse::<IpAddr>().ok());

        match pinned {
            Some(ip) => {
                tracing::trace!(%host, %ip, "static resolution");
                Box::pin(std::future::ready(Ok(vec![SocketAddr::new(ip, port)])))
            }
            None => self.fallback.resolve(host, port),
        }
    }
}
