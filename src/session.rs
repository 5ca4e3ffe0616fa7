//! [`SessionBinder`]: couples one accepted socket to a [`CommandDecoder`]
//! and a [`ResponseEncoder`] (§4.7).
//!
//! This is the layer a honeypot or a proxy's client-facing half builds on:
//! it owns framing and I/O, nothing about protocol semantics. Raw bytes
//! handed out by [`Self::recv`] are copied rather than borrowed, since a
//! caller almost always wants to hold them across an `.await` (forwarding
//! to an upstream, logging asynchronously) and the decoder's buffer can't
//! promise that lifetime past the next read.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::Level;

use crate::debug::message_trace_level;
use crate::error::{Error, Result};
use crate::protocol::command::{Command, CommandDecoder};
use crate::protocol::response::Response;
use crate::protocol::response_encoder::ResponseEncoder;

const READ_CHUNK: usize = 8 * 1024;

/// A bound frontend connection: socket plus decode/encode state.
pub struct SessionBinder {
    stream: TcpStream,
    decoder: CommandDecoder,
    encoder: ResponseEncoder,
    trace_level: Level,
}

impl SessionBinder {
    /// Take ownership of a freshly-accepted socket, disabling Nagle's
    /// algorithm the way every connection in this crate does — protocol
    /// messages are typically small and latency-sensitive.
    pub fn accept(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            decoder: CommandDecoder::new(),
            encoder: ResponseEncoder::new(),
            trace_level: message_trace_level(false),
        })
    }

    /// Raise per-message tracing to `debug` level regardless of the
    /// `DEBUG_PG_SERVER` environment toggle — the [`Config::debug`](crate::config::Config::debug)
    /// knob, wired through by the caller.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.trace_level = message_trace_level(debug);
        self
    }

    /// True once the startup handshake has been consumed.
    pub fn started_up(&self) -> bool {
        self.decoder.started_up()
    }

    /// Borrow the encoder directly, for callers that need to push an
    /// unsolicited message (e.g. a `NotificationResponse`) outside the
    /// request/response rhythm of [`Self::recv`]/[`Self::send`].
    pub fn encoder(&mut self) -> &mut ResponseEncoder {
        &mut self.encoder
    }

    /// Encode and write one response.
    pub async fn send(&mut self, response: &Response) -> Result<()> {
        let wire = self.encoder.encode(response);
        self.stream.write_all(&wire).await?;
        Ok(())
    }

    /// Write a sequence of responses in order, as a single write.
    pub async fn send_all(&mut self, responses: &[Response]) -> Result<()> {
        let mut wire = Vec::new();
        for response in responses {
            wire.extend_from_slice(&self.encoder.encode(response));
        }
        self.stream.write_all(&wire).await?;
        Ok(())
    }

    /// Write an already-encoded frame verbatim, e.g. bytes captured from
    /// an upstream connection by a proxy.
    pub async fn send_raw(&mut self, wire: &[u8]) -> Result<()> {
        self.stream.write_all(wire).await?;
        Ok(())
    }

    /// Read from the socket until at least one command has been fully
    /// framed, returning every command produced by that read (in wire
    /// order) paired with its raw bytes.
    ///
    /// Returns [`Error::PeerClosed`] if the socket reaches EOF with no
    /// partial frame pending — a clean disconnect.
    pub async fn recv(&mut self) -> Result<Vec<(Command, Vec<u8>)>> {
        let mut chunk = [0u8; READ_CHUNK];
        let trace_level = self.trace_level;
        loop {
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::PeerClosed);
            }

            let mut produced = Vec::new();
            let decoded = self.decoder.feed(&chunk[..n], |command, raw| {
                log_decoded(trace_level, &command);
                produced.push((command, raw.to_vec()));
                Ok(())
            });
            if let Err(err) = decoded {
                tracing::error!(%err, "protocol violation, tearing down session");
                return Err(err);
            }

            if !produced.is_empty() {
                return Ok(produced);
            }
        }
    }
}

/// Log one decoded frontend message at the session's configured level (§10.2:
/// a compact, human-readable dump of the decoded message).
fn log_decoded(level: Level, command: &Command) {
    match level {
        Level::DEBUG => tracing::debug!(?command, "decoded frontend message"),
        _ => tracing::trace!(?command, "decoded frontend message"),
    }
}
