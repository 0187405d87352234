//! Connection IO with a raw-write escape hatch.
//!
//! Hyper owns the socket while it serves a connection, so handlers cannot
//! write to it directly. `EscapableStream` sits between hyper and the
//! `TcpStream`: once its [`RawEscape`] handle is armed, the armed bytes go
//! to the peer verbatim and everything hyper writes afterwards is swallowed.

use bytes::{Buf, Bytes};
use parking_lot::Mutex;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[derive(Debug, Default)]
enum EscapeState {
    #[default]
    Passthrough,
    Pending(Bytes),
    Sent,
}

/// Per-connection handle that takes over the connection's output
#[derive(Debug, Clone, Default)]
pub struct RawEscape {
    state: Arc<Mutex<EscapeState>>,
}

impl RawEscape {
    /// Queue `bytes` to be written verbatim, ahead of (and instead of) any
    /// further HTTP output on this connection. Only the first call counts.
    pub fn write_raw(&self, bytes: Bytes) {
        let mut state = self.state.lock();
        if matches!(*state, EscapeState::Passthrough) {
            *state = EscapeState::Pending(bytes);
        }
    }

    pub fn is_armed(&self) -> bool {
        !matches!(*self.state.lock(), EscapeState::Passthrough)
    }
}

/// IO wrapper handed to hyper in place of the raw stream
#[derive(Debug)]
pub struct EscapableStream<S> {
    inner: S,
    escape: RawEscape,
}

impl<S> EscapableStream<S> {
    pub fn new(inner: S) -> (Self, RawEscape) {
        let escape = RawEscape::default();
        (
            Self {
                inner,
                escape: escape.clone(),
            },
            escape,
        )
    }
}

impl<S: AsyncWrite + Unpin> EscapableStream<S> {
    /// Drain armed bytes to the peer.
    ///
    /// Resolves to `false` while passing through and `true` once the raw
    /// bytes are fully written.
    fn poll_escape(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<bool>> {
        let Self { inner, escape } = self;
        let mut state = escape.state.lock();
        loop {
            let raw = match &mut *state {
                EscapeState::Passthrough => return Poll::Ready(Ok(false)),
                EscapeState::Sent => return Poll::Ready(Ok(true)),
                EscapeState::Pending(raw) => raw,
            };
            if !raw.has_remaining() {
                *state = EscapeState::Sent;
                continue;
            }
            let written = ready!(Pin::new(&mut *inner).poll_write(cx, raw))?;
            if written == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            raw.advance(written);
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for EscapableStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for EscapableStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if ready!(this.poll_escape(cx))? {
            return Poll::Ready(Ok(buf.len()));
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_escape(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_escape(cx))?;
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}
