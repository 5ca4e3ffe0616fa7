//! [`Proxy`]: sits between a client and a real PostgreSQL server, forwarding
//! frames in both directions and giving the caller a chance to intercept
//! simple queries (§4.8).
//!
//! The client-facing half is a [`SessionBinder`]; the upstream half is a
//! plain socket paired with a [`ResponseDecoder`] used only to inspect
//! traffic for logging — every byte read from upstream is still forwarded
//! to the client verbatim, never re-encoded, so a decode bug here can never
//! corrupt what the client sees.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{trace, warn};

use crate::error::Result;
use crate::protocol::command::Command;
use crate::protocol::command_encoder::CommandEncoder;
use crate::protocol::notice::NoticeFields;
use crate::protocol::response::{NoticeKind, Response, ResponseDecoder};
use crate::session::SessionBinder;

const READ_CHUNK: usize = 8 * 1024;

/// What to do with a simple query a client sent, decided by the caller's
/// interceptor before it reaches the real server.
pub enum Intercept {
    /// Forward the query unchanged.
    Forward,
    /// Forward a different query in its place.
    Rewrite(String),
    /// Don't forward it at all; answer the client directly with an error.
    Reject(NoticeFields),
}

/// A client ↔ upstream relay for one connection.
pub struct Proxy {
    client: SessionBinder,
    upstream: TcpStream,
    upstream_decoder: ResponseDecoder,
}

impl Proxy {
    /// Pair an already-accepted client socket with a fresh connection to
    /// `upstream`.
    pub async fn connect(client: TcpStream, upstream: TcpStream) -> Result<Self> {
        upstream.set_nodelay(true)?;
        Ok(Self {
            client: SessionBinder::accept(client)?,
            upstream,
            upstream_decoder: ResponseDecoder::new(),
        })
    }

    /// Raise the client-facing session's per-message tracing to `debug`
    /// level; see [`SessionBinder::with_debug`].
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.client = self.client.with_debug(debug);
        self
    }

    /// Run the relay until either side closes the connection or a fatal
    /// protocol error occurs. `intercept` is consulted for every `Query` or
    /// `Parse` command; every other frontend message is forwarded as-is.
    pub async fn run(mut self, mut intercept: impl FnMut(&str) -> Intercept) -> Result<()> {
        let mut upstream_chunk = [0u8; READ_CHUNK];

        loop {
            tokio::select! {
                client_result = self.client.recv() => {
                    let commands = match client_result {
                        Ok(commands) => commands,
                        Err(err) => return Ok(log_client_disconnect(err)),
                    };

                    for (command, raw) in commands {
                        let terminating = matches!(command, Command::Terminate);
                        self.forward_client_command(command, &raw, &mut intercept).await?;
                        if terminating {
                            return Ok(());
                        }
                    }
                }

                n = self.upstream.read(&mut upstream_chunk) => {
                    let n = n?;
                    if n == 0 {
                        let notice = NoticeFields::from_message("connection to upstream server lost");
                        let _ = self.client.send(&Response::NoticeOrError {
                            kind: NoticeKind::Error,
                            fields: notice,
                        }).await;
                        return Ok(());
                    }

                    // Raw-bytes-realize-before-await: capture each frame's
                    // exact bytes as an owned Vec *inside* this callback,
                    // before the `send_raw` call below ever awaits, since
                    // the borrow the decoder hands out dies at the next feed.
                    let mut frames = Vec::new();
                    if let Err(err) = self.upstream_decoder.feed(&upstream_chunk[..n], |response, raw| {
                        frames.push((response, raw.to_vec()));
                        Ok(())
                    }) {
                        tracing::error!(%err, "protocol violation from upstream, tearing down session");
                        return Err(err);
                    }

                    for (response, raw) in frames {
                        if let Response::NoticeOrError { kind: NoticeKind::Error, fields } = &response {
                            warn!(error = %fields, "upstream returned an error");
                        } else {
                            trace!(?response, "upstream message");
                        }
                        self.client.send_raw(&raw).await?;
                    }
                }
            }
        }
    }

    async fn forward_client_command(
        &mut self,
        command: Command,
        raw: &[u8],
        intercept: &mut impl FnMut(&str) -> Intercept,
    ) -> Result<()> {
        // §4.8: the interceptor runs for both the simple-query path (`Query`)
        // and the extended-query path (`Parse`), since a parameterized query
        // never arrives as a `Query` at all.
        match &command {
            Command::Query { query } => {
                self.apply_intercept(intercept(query), raw, |new_query| Command::Query {
                    query: new_query,
                })
                .await
            }
            Command::Parse {
                statement,
                query,
                parameter_types,
            } => {
                let statement = statement.clone();
                let parameter_types = parameter_types.clone();
                self.apply_intercept(intercept(query), raw, move |new_query| Command::Parse {
                    statement,
                    query: new_query,
                    parameter_types,
                })
                .await
            }
            _ => {
                self.upstream.write_all(raw).await?;
                Ok(())
            }
        }
    }

    async fn apply_intercept(
        &mut self,
        decision: Intercept,
        raw: &[u8],
        rebuild: impl FnOnce(String) -> Command,
    ) -> Result<()> {
        match decision {
            Intercept::Forward => {
                self.upstream.write_all(raw).await?;
            }
            Intercept::Rewrite(new_query) => {
                let wire = CommandEncoder::new().encode(&rebuild(new_query));
                self.upstream.write_all(&wire).await?;
            }
            Intercept::Reject(fields) => {
                self.client
                    .send(&Response::NoticeOrError {
                        kind: NoticeKind::Error,
                        fields,
                    })
                    .await?;
                self.client.send(&crate::protocol::response_encoder::ready_idle()).await?;
            }
        }
        Ok(())
    }
}

fn log_client_disconnect(err: crate::error::Error) {
    trace!(%err, "client connection closed");
}
