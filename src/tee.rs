//! A connection wrapper which duplicates its traffic into a [`Sink`].

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use pin_project::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::sink::Sink;

/// Wraps an IO object, copying every byte that is successfully read from
/// or written to it into a [`Sink`].
///
/// Only bytes the inner stream actually accepted or produced are copied:
/// a partial write mirrors just the written prefix, and errors or pending
/// polls mirror nothing.
#[derive(Debug)]
#[pin_project]
pub struct Tee<IO> {
    #[pin]
    inner: IO,
    sink: Sink,
}

impl<IO> Tee<IO> {
    /// Wrap `inner`, mirroring its traffic into `sink`.
    pub fn new(inner: IO, sink: Sink) -> Self {
        Self { inner, sink }
    }

    /// Reference to the wrapped IO.
    pub fn get_ref(&self) -> &IO {
        &self.inner
    }

    /// Mutable reference to the wrapped IO.
    ///
    /// Bytes moved through this reference bypass the sink.
    pub fn get_mut(&mut self) -> &mut IO {
        &mut self.inner
    }

    /// Unwrap the IO, discarding the sink handle.
    pub fn into_inner(self) -> IO {
        self.inner
    }

    /// The sink this connection mirrors into.
    pub fn sink(&self) -> &Sink {
        &self.sink
    }
}

impl<IO> AsyncRead for Tee<IO>
where
    IO: AsyncRead,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();
        ready!(this.inner.poll_read(cx, buf))?;
        this.sink.write(&buf.filled()[before..]);
        Poll::Ready(Ok(()))
    }
}

impl<IO> AsyncWrite for Tee<IO>
where
    IO: AsyncWrite,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.project();
        let n = ready!(this.inner.poll_write(cx, buf))?;
        this.sink.write(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}
