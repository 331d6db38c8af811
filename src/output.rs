//! Size-capped writer for streamed responses.
//!
//! `BoundedSink` decorates any `AsyncWrite` and enforces a fixed byte ceiling
//! across everything written through it:
//! - a write that fits is forwarded unchanged
//! - a write that crosses the ceiling forwards only the prefix that fits and
//!   reports the short count
//! - once the ceiling is reached every non-empty write fails with
//!   `ErrorKind::WriteZero`
//!
//! Hitting the ceiling is the normal end of an oversized response, so callers
//! treat `WriteZero` as "stop producing", not as a failure to report.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;

pub struct BoundedSink<W> {
    inner: W,
    limit: usize,
    written: usize,
}

impl<W> BoundedSink<W> {
    pub fn new(inner: W, limit: usize) -> Self {
        Self {
            inner,
            limit,
            written: 0,
        }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.written
    }

    pub fn is_exhausted(&self) -> bool {
        self.written >= self.limit
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for BoundedSink<W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let allowed = buf.len().min(self.remaining());
        if allowed == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "output budget exhausted",
            )));
        }

        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_write(cx, &buf[..allowed]) {
            Poll::Ready(Ok(n)) => {
                this.written += n;
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
