//! Convenience building blocks for emulating a PostgreSQL server end to end.
//!
//! This is deliberately thin: it assembles the handful of [`Response`]s every
//! fake server needs to send regardless of what it's pretending to be
//! (an auth handshake, a steady `ReadyForQuery`, a generic error), and leaves
//! the actual persona — what `SELECT version()` should return, which queries
//! to log versus reject — to the caller's [`SessionHandler`](crate::session::SessionBinder).

use rand::Rng;

use crate::protocol::notice::{tag, NoticeFields};
use crate::protocol::response::{AuthMessage, NoticeKind, Response};
use crate::protocol::response_encoder::ready_idle;

/// A fake server identity: the `ParameterStatus` values a real `postgres`
/// backend would send right after authenticating.
#[derive(Debug, Clone)]
pub struct Honeypot {
    server_version: String,
    extra_params: Vec<(String, String)>,
}

impl Honeypot {
    /// A honeypot reporting the given `server_version` (e.g. `"15.4"`).
    pub fn new(server_version: impl Into<String>) -> Self {
        Self {
            server_version: server_version.into(),
            extra_params: Vec::new(),
        }
    }

    /// Add an extra `ParameterStatus` to report during the handshake, e.g.
    /// `("TimeZone", "UTC")`.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((name.into(), value.into()));
        self
    }

    /// The full post-authentication sequence a real backend sends before its
    /// first `ReadyForQuery`: `AuthenticationOk`, `server_version` (plus any
    /// extra params), `BackendKeyData`, then `ReadyForQuery`.
    pub fn handshake_responses(&self, process_id: u32, secret_key: u32) -> Vec<Response> {
        let mut responses = vec![
            Response::Authentication(AuthMessage::Ok),
            Response::ParameterStatus {
                name: "server_version".into(),
                value: self.server_version.clone(),
            },
        ];
        for (name, value) in &self.extra_params {
            responses.push(Response::ParameterStatus {
                name: name.clone(),
                value: value.clone(),
            });
        }
        responses.push(Response::BackendKeyData {
            process_id,
            secret_key,
        });
        responses.push(ready_idle());
        responses
    }

    /// A generic `ErrorResponse` for a query the honeypot has no script for,
    /// shaped like a real syntax error so automated scanners see nothing
    /// unusual.
    pub fn unhandled_query_error(&self) -> Response {
        Response::NoticeOrError {
            kind: NoticeKind::Error,
            fields: NoticeFields::new()
                .with(tag::SEVERITY, "ERROR")
                .with(tag::SEVERITY_NON_LOCALIZED, "ERROR")
                .with(tag::CODE, "42601")
                .with(tag::MESSAGE, "syntax error"),
        }
    }

    /// The `AuthenticationMD5Password` challenge for the canned
    /// always-reject persona below.
    pub fn md5_challenge(&self, salt: [u8; 4]) -> Response {
        Response::Authentication(AuthMessage::Md5Password { salt })
    }

    /// An invalid-password `ErrorResponse`, SQLSTATE `28P01`, the same
    /// reply a real server gives for a wrong password — sent regardless of
    /// what digest the client actually supplied.
    ///
    /// Pairing [`Self::md5_challenge`] with this is the minimal
    /// byte-accurate-through-authentication persona: a client never learns
    /// whether the password it tried was close.
    pub fn always_reject_password(&self) -> Response {
        Response::NoticeOrError {
            kind: NoticeKind::Error,
            fields: NoticeFields::new()
                .with(tag::SEVERITY, "FATAL")
                .with(tag::SEVERITY_NON_LOCALIZED, "FATAL")
                .with(tag::CODE, "28P01")
                .with(tag::MESSAGE, "password authentication failed"),
        }
    }
}

/// A random process ID / secret key pair for `BackendKeyData`, matching the
/// unpredictability a real backend provides so a `CancelRequest` replay can't
/// be guessed.
pub fn random_backend_key() -> (u32, u32) {
    let mut rng = rand::rng();
    (rng.random(), rng.random())
}

/// A random 4-byte MD5 auth salt.
pub fn random_md5_salt() -> [u8; 4] {
    rand::rng().random()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_includes_version_and_ready() {
        let pot = Honeypot::new("15.4").with_param("TimeZone", "UTC");
        let responses = pot.handshake_responses(123, 456);
        assert!(matches!(
            responses[0],
            Response::Authentication(AuthMessage::Ok)
        ));
        assert_eq!(
            responses[1],
            Response::ParameterStatus {
                name: "server_version".into(),
                value: "15.4".into()
            }
        );
        assert!(responses
            .iter()
            .any(|r| *r == Response::ParameterStatus {
                name: "TimeZone".into(),
                value: "UTC".into()
            }));
        assert_eq!(
            responses.last(),
            Some(&Response::ReadyForQuery {
                status: crate::protocol::types::TransactionStatus::Idle
            })
        );
    }

    #[test]
    fn always_reject_password_ignores_the_supplied_digest() {
        let pot = Honeypot::new("15.4");
        let challenge = pot.md5_challenge([9, 9, 9, 9]);
        assert_eq!(
            challenge,
            Response::Authentication(AuthMessage::Md5Password { salt: [9, 9, 9, 9] })
        );
        match pot.always_reject_password() {
            Response::NoticeOrError { kind, fields } => {
                assert_eq!(kind, NoticeKind::Error);
                assert_eq!(fields.code(), Some("28P01"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unhandled_query_error_carries_a_sqlstate() {
        let pot = Honeypot::new("15.4");
        match pot.unhandled_query_error() {
            Response::NoticeOrError { kind, fields } => {
                assert_eq!(kind, NoticeKind::Error);
                assert_eq!(fields.code(), Some("42601"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
