//! A PostgreSQL backend wire-protocol toolkit.
//!
//! # Features
//!
//! - **Zero-copy parsing**: message payloads are parsed directly from the
//!   read buffer; each decoded message is paired with a borrowed view of the
//!   exact bytes that produced it.
//! - **Sans-I/O state machines**: [`protocol::CommandDecoder`] and
//!   [`protocol::ResponseDecoder`] know nothing about sockets — feed them
//!   bytes from wherever, in whatever chunk sizes arrive.
//! - **Server-side, not client-side**: this crate speaks the backend role —
//!   parsing what a client sends, encoding what a server sends back.
//! - **Proxy and honeypot primitives**: [`proxy::Proxy`] relays a client to a
//!   real server with a query-interception hook; [`honeypot::Honeypot`]
//!   assembles a standalone server emulation.
//!
//! # Example
//!
//! ```no_run
//! use pgbackend::config::Config;
//! use pgbackend::honeypot::{Honeypot, random_backend_key};
//! use pgbackend::protocol::Command;
//! use pgbackend::session::SessionBinder;
//! use tokio::net::TcpListener;
//!
//! async fn serve_one(
//!     socket: tokio::net::TcpStream,
//!     pot: Honeypot,
//!     debug: bool,
//! ) -> pgbackend::Result<()> {
//!     let mut session = SessionBinder::accept(socket)?.with_debug(debug);
//!     loop {
//!         for (command, _raw) in session.recv().await? {
//!             if let Command::Init { .. } = command {
//!                 let (pid, secret) = random_backend_key();
//!                 session.send_all(&pot.handshake_responses(pid, secret)).await?;
//!             }
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> pgbackend::Result<()> {
//!     let config = Config::try_from("postgres://127.0.0.1:5432")?;
//!     let listener = TcpListener::bind(config.listen_addr).await?;
//!     let pot = Honeypot::new("15.4");
//!
//!     loop {
//!         let (socket, _) = listener.accept().await?;
//!         tokio::spawn(serve_one(socket, pot.clone(), config.debug));
//!     }
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod debug;
pub mod error;
pub mod honeypot;
pub mod protocol;
pub mod proxy;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
