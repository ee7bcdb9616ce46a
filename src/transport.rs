//! Transport abstraction for the Arena live protocol.
//!
//! The [`Transport`] trait defines the read side of a persistent text-frame
//! channel plus a graceful close. The live protocol is JSON text frames, so
//! every transport implementation must handle message framing internally
//! (e.g., WebSocket frames, length-prefixed TCP, QUIC streams).
//!
//! Connection setup is split out into the [`Dialer`] trait: a live link
//! re-opens its transport every time the reconnect policy fires, so it needs
//! a factory it can call repeatedly with the derived target URL. Tests
//! substitute a scripted dialer to drive the reconnect loop deterministically.

use async_trait::async_trait;

use crate::error::Result;

/// A persistent text-frame transport carrying Arena live events.
///
/// Each call to [`recv`](Transport::recv) returns one complete JSON frame.
/// The send side exists for protocol symmetry (subscription handshakes,
/// heartbeats) even though the synchronization layer itself is receive-only.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the link's read
/// loop awaits it inside `tokio::select!`. If `recv` is cancelled before
/// completion, calling it again must not lose data. Channel-backed
/// implementations are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one complete JSON text frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaLiveError::TransportSend`](crate::ArenaLiveError::TransportSend)
    /// if the frame could not be written.
    async fn send(&mut self, message: String) -> Result<()>;

    /// Receive the next JSON text frame from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))` — a complete frame was received
    /// - `Some(Err(e))` — a transport error occurred
    /// - `None` — the connection was closed by the remote end
    ///
    /// # Cancel Safety
    ///
    /// This method **MUST** be cancel-safe (see [trait documentation](Transport)).
    async fn recv(&mut self) -> Option<Result<String>>;

    /// Close the transport connection gracefully.
    ///
    /// After this call, `send` and `recv` may return errors or `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Implementations should
    /// still release resources when that happens.
    async fn close(&mut self) -> Result<()>;
}

/// Factory that opens a fresh [`Transport`] to a target URL.
///
/// A [`LiveLink`](crate::link::LiveLink) holds one dialer for the lifetime of
/// a connection and calls it again after every unexpected close, so the
/// reconnect policy never depends on the concrete transport.
///
/// # Object Safety
///
/// This trait is object-safe: links store an `Arc<dyn Dialer>` and the dial
/// result is boxed for the same reason.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Open a new connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns any connection-establishment error. The caller treats a dial
    /// failure like a transport-level close and retries per its reconnect
    /// policy.
    async fn dial(&self, url: &str) -> Result<Box<dyn Transport>>;
}
