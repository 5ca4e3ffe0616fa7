//! Runtime configuration for a proxy or honeypot built on this crate.

use std::env;
use std::net::SocketAddr;

use no_panic::no_panic;
use url::Url;

use crate::error::Error;

/// Configuration for one listening endpoint.
///
/// Built either from a connection-string-shaped URL (see [`TryFrom<&str>`])
/// or from the `PGBACKEND_*` environment variables via [`Config::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to accept frontend (client) connections on.
    ///
    /// Default: `127.0.0.1:5432`
    pub listen_addr: SocketAddr,

    /// Address of the real PostgreSQL server to proxy to, if any. `None`
    /// means there is no upstream — the caller (typically a honeypot) is
    /// expected to answer every command itself.
    ///
    /// Default: `None`
    pub upstream_addr: Option<SocketAddr>,

    /// Verbosity toggle mirroring the source's `DEBUG_PG_SERVER` switch:
    /// when set, per-message tracing is emitted at `debug` rather than
    /// `trace` level.
    ///
    /// Default: `false`
    pub debug: bool,

    /// Additional, unrecognized query parameters from the connection
    /// string, preserved for the caller to interpret (e.g. a honeypot's
    /// persona selection).
    ///
    /// Default: `[]`
    pub params: Vec<(String, String)>,
}

impl Default for Config {
    #[no_panic]
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 5432)),
            upstream_addr: None,
            debug: false,
            params: Vec::new(),
        }
    }
}

impl TryFrom<&Url> for Config {
    type Error = Error;

    /// Parse a connection-string-shaped URL:
    /// `postgres://<listen_host>:<listen_port>[/<upstream_host>:<upstream_port>][?debug=true&...]`
    ///
    /// The path component, if present and non-empty, is the upstream
    /// address to proxy to; an empty or absent path means no upstream.
    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        if !["postgres", "pg"].contains(&url.scheme()) {
            return Err(Error::protocol(format!(
                "invalid scheme: expected 'postgres://' or 'pg://', got '{}://'",
                url.scheme()
            )));
        }

        let host = url.host_str().unwrap_or("127.0.0.1");
        let port = url.port().unwrap_or(5432);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .map_err(|e| Error::protocol(format!("invalid listen address: {e}")))?;

        let upstream_addr = match url.path().trim_start_matches('/') {
            "" => None,
            upstream => Some(
                upstream
                    .parse()
                    .map_err(|e| Error::protocol(format!("invalid upstream address: {e}")))?,
            ),
        };

        let mut config = Config {
            listen_addr,
            upstream_addr,
            ..Config::default()
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "debug" => {
                    config.debug = match value.as_ref() {
                        "true" | "1" | "yes" | "on" => true,
                        "false" | "0" | "no" | "off" => false,
                        _ => {
                            return Err(Error::protocol(format!("invalid debug: {value}")));
                        }
                    };
                }
                _ => {
                    config.params.push((key.to_string(), value.to_string()));
                }
            }
        }

        Ok(config)
    }
}

impl TryFrom<&str> for Config {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let url = Url::parse(s).map_err(|e| Error::protocol(format!("invalid URL: {e}")))?;
        Self::try_from(&url)
    }
}

impl Config {
    /// Build from `PGBACKEND_LISTEN`, `PGBACKEND_UPSTREAM` and
    /// `DEBUG_PG_SERVER` (§6.2), falling back to [`Config::default`] for any
    /// that are unset.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Config::default();

        if let Ok(listen) = env::var("PGBACKEND_LISTEN") {
            config.listen_addr = listen
                .parse()
                .map_err(|e| Error::protocol(format!("PGBACKEND_LISTEN: {e}")))?;
        }
        if let Ok(upstream) = env::var("PGBACKEND_UPSTREAM") {
            config.upstream_addr = Some(
                upstream
                    .parse()
                    .map_err(|e| Error::protocol(format!("PGBACKEND_UPSTREAM: {e}")))?,
            );
        }
        if let Ok(debug) = env::var("DEBUG_PG_SERVER") {
            config.debug = matches!(debug.as_str(), "true" | "1" | "yes" | "on");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listen_and_upstream() {
        let config =
            Config::try_from("postgres://0.0.0.0:6432/10.0.0.5:5432?debug=true").unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:6432".parse().unwrap());
        assert_eq!(
            config.upstream_addr,
            Some("10.0.0.5:5432".parse().unwrap())
        );
        assert!(config.debug);
    }

    #[test]
    fn defaults_to_no_upstream_for_honeypot_only_urls() {
        let config = Config::try_from("postgres://127.0.0.1:5432").unwrap();
        assert_eq!(config.upstream_addr, None);
        assert!(!config.debug);
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(Config::try_from("mysql://localhost:3306").is_err());
    }

    #[test]
    fn preserves_unrecognized_params() {
        let config = Config::try_from("postgres://127.0.0.1:5432?persona=pg15").unwrap();
        assert_eq!(
            config.params,
            vec![("persona".to_string(), "pg15".to_string())]
        );
    }
}
