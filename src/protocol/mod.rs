//! PostgreSQL wire protocol implementation.
//!
//! This module contains the sans-I/O protocol encoding and decoding: no
//! sockets, no async, just byte slices in and `Vec<u8>` out.
//!
//! # Structure
//!
//! - `command`/`command_encoder`: Client → Server messages (decode/encode)
//! - `response`/`response_encoder`: Server → Client messages (decode/encode)
//! - `notice`: Shared `ErrorResponse`/`NoticeResponse` field model
//! - `codec`: Low-level cursor/buffer primitives
//! - `types`: Common protocol types (FormatCode, Oid, TransactionStatus)

pub mod codec;
pub mod command;
pub mod command_encoder;
pub mod notice;
pub mod response;
pub mod response_encoder;
pub mod types;

pub use command::{Command, CommandDecoder};
pub use command_encoder::CommandEncoder;
pub use notice::NoticeFields;
pub use response::{Response, ResponseDecoder, ResultMode};
pub use response_encoder::ResponseEncoder;
pub use types::{FormatCode, Oid, TransactionStatus};
