//! Error types for pgbackend.

use thiserror::Error;

use crate::protocol::notice::NoticeFields;

/// Result type for pgbackend operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for pgbackend.
#[derive(Debug, Error)]
pub enum Error {
    /// A frame or encoding rule was violated: unknown type code, bad startup
    /// version, malformed `Describe`/`Close` prefix, a short body where a field
    /// was demanded, or a second unframed startup after the session is live.
    ///
    /// Per §7, this is always fatal: the decoder emits no further messages and
    /// the session is torn down.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O error from the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A capability was requested that this crate does not implement, e.g.
    /// constructing a decoder in binary result mode (§1 Non-goals, §7).
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The peer closed its half of the connection while a message was still
    /// being framed.
    #[error("peer closed connection")]
    PeerClosed,

    /// A server error response surfaced while acting as a proxy's upstream
    /// client; carries the parsed notice fields (§6.4) unchanged.
    #[error("server error: {0}")]
    Server(NoticeFields),
}

impl Error {
    /// Shorthand for a protocol violation with a formatted message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }
}

impl<Src: std::fmt::Debug, Dst: std::fmt::Debug + ?Sized> From<zerocopy::error::CastError<Src, Dst>>
    for Error
{
    fn from(err: zerocopy::error::CastError<Src, Dst>) -> Self {
        Error::Protocol(format!("zerocopy cast error: {err:?}"))
    }
}
