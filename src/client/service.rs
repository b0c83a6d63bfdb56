//! Middleware used to assemble the client's request pipeline.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use pin_project::pin_project;
use tower::layer::util::Stack;
use tower::{Service, ServiceBuilder, ServiceExt};

use super::Error;
use crate::BoxFuture;

/// A [`Service`] that can be cloned, sent, and shared across threads.
pub struct SharedService<T, U, E>(
    Box<
        dyn CloneService<T, Response = U, Error = E, Future = BoxFuture<'static, Result<U, E>>>
            + Send
            + Sync
            + 'static,
    >,
);

impl<T, U, E> SharedService<T, U, E> {
    /// Create a new `SharedService` from a `Service`.
    pub fn new<S>(service: S) -> Self
    where
        S: Service<T, Response = U, Error = E> + Clone + Send + Sync + 'static,
        S::Future: Send + 'static,
    {
        Self(Box::new(service.map_future(|f| Box::pin(f) as _)))
    }

    /// Create a layer which wraps a `Service` in a `SharedService`.
    pub fn layer<S>() -> impl tower::layer::Layer<S, Service = SharedService<T, U, E>>
    where
        S: Service<T, Response = U, Error = E> + Clone + Send + Sync + 'static,
        S::Future: Send + 'static,
    {
        tower::layer::layer_fn(Self::new)
    }
}

impl<T, U, E> Service<T> for SharedService<T, U, E> {
    type Response = U;
    type Error = E;
    type Future = BoxFuture<'static, Result<U, E>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.0.poll_ready(cx)
    }

    fn call(&mut self, req: T) -> Self::Future {
        self.0.call(req)
    }
}

impl<T, U, E> Clone for SharedService<T, U, E> {
    fn clone(&self) -> Self {
        Self(self.0.clone_box())
    }
}

impl<T, U, E> fmt::Debug for SharedService<T, U, E> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("SharedService").finish()
    }
}

trait CloneService<R>: Service<R> {
    fn clone_box(
        &self,
    ) -> Box<
        dyn CloneService<R, Response = Self::Response, Error = Self::Error, Future = Self::Future>
            + Send
            + Sync
            + 'static,
    >;
}

impl<R, T> CloneService<R> for T
where
    T: Service<R> + Clone + Send + Sync + 'static,
{
    fn clone_box(
        &self,
    ) -> Box<
        dyn CloneService<R, Response = T::Response, Error = T::Error, Future = T::Future>
            + Send
            + Sync
            + 'static,
    > {
        Box::new(self.clone())
    }
}

/// Extends `ServiceBuilder` with an `optional` method.
pub(crate) trait OptionLayerExt<S> {
    /// Apply an optional middleware to the service, keeping the inner service's error type.
    fn optional<T>(self, middleware: Option<T>) -> ServiceBuilder<Stack<OptionLayer<T>, S>>;
}

impl<S> OptionLayerExt<S> for ServiceBuilder<S> {
    fn optional<T>(self, middleware: Option<T>) -> ServiceBuilder<Stack<OptionLayer<T>, S>> {
        self.layer(OptionLayer { middleware })
    }
}

/// A layer which may or may not be applied.
///
/// Unlike `tower::util::Either`, errors are converted into the inner
/// service's error type rather than boxed.
#[derive(Debug, Clone)]
pub(crate) struct OptionLayer<M> {
    middleware: Option<M>,
}

impl<M, S> tower::Layer<S> for OptionLayer<M>
where
    M: tower::Layer<S>,
{
    type Service = OptionService<M::Service, S>;

    fn layer(&self, inner: S) -> Self::Service {
        match self.middleware {
            Some(ref middleware) => OptionService::Middleware(middleware.layer(inner)),
            None => OptionService::Service(inner),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum OptionService<M, S> {
    Middleware(M),
    Service(S),
}

impl<M, S, Req, E> Service<Req> for OptionService<M, S>
where
    S: Service<Req, Error = E>,
    M: Service<Req, Response = S::Response>,
    M::Error: Into<E>,
{
    type Response = S::Response;
    type Error = E;
    type Future = OptionServiceFuture<M::Future, S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self {
            OptionService::Middleware(m) => m.poll_ready(cx).map_err(Into::into),
            OptionService::Service(s) => s.poll_ready(cx),
        }
    }

    fn call(&mut self, req: Req) -> Self::Future {
        match self {
            OptionService::Middleware(m) => OptionServiceFuture::Middleware(m.call(req)),
            OptionService::Service(s) => OptionServiceFuture::Service(s.call(req)),
        }
    }
}

#[derive(Debug)]
#[pin_project(project = OptionServiceFutureProj)]
pub(crate) enum OptionServiceFuture<M, S> {
    Middleware(#[pin] M),
    Service(#[pin] S),
}

impl<M, S, R, E, ME> Future for OptionServiceFuture<M, S>
where
    M: Future<Output = Result<R, ME>>,
    S: Future<Output = Result<R, E>>,
    ME: Into<E>,
{
    type Output = Result<R, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            OptionServiceFutureProj::Middleware(future) => {
                future.poll(cx).map(|result| result.map_err(Into::into))
            }
            OptionServiceFutureProj::Service(future) => future.poll(cx),
        }
    }
}

/// Bounds the wait for a response head.
///
/// The inner client resolves as soon as the status line and headers have
/// been read, so the body is not covered by the timeout.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResponseHeaderTimeoutLayer {
    timeout: Duration,
}

impl ResponseHeaderTimeoutLayer {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl<S> tower::Layer<S> for ResponseHeaderTimeoutLayer {
    type Service = ResponseHeaderTimeout<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ResponseHeaderTimeout {
            inner,
            timeout: self.timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ResponseHeaderTimeout<S> {
    inner: S,
    timeout: Duration,
}

impl<S, Req> Service<Req> for ResponseHeaderTimeout<S>
where
    S: Service<Req, Error = Error>,
{
    type Response = S::Response;
    type Error = Error;
    type Future = ResponseHeaderTimeoutFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        ResponseHeaderTimeoutFuture {
            inner: self.inner.call(req),
            sleep: tokio::time::sleep(self.timeout),
        }
    }
}

#[derive(Debug)]
#[pin_project]
pub(crate) struct ResponseHeaderTimeoutFuture<F> {
    #[pin]
    inner: F,

    #[pin]
    sleep: tokio::time::Sleep,
}

impl<F, R> Future for ResponseHeaderTimeoutFuture<F>
where
    F: Future<Output = Result<R, Error>>,
{
    type Output = Result<R, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if let Poll::Ready(response) = this.inner.poll(cx) {
            return Poll::Ready(response);
        }

        match this.sleep.poll(cx) {
            Poll::Ready(()) => {
                tracing::debug!("timed out waiting for response headers");
                Poll::Ready(Err(Error::ResponseHeaderTimeout))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
