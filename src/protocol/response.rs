//! Backend (server → client) message model and [`ResponseDecoder`] (§3.2, §4.4).
//!
//! Mirrors [`crate::protocol::command`]: same framing shape (`[code][len][body]`,
//! always — the backend has no unframed startup step), same streaming
//! reassembly discipline, same raw-bytes-accessor contract.

use crate::buffer::FrameBuffer;
use crate::error::{Error, Result};
use crate::protocol::codec::ByteReader;
use crate::protocol::notice::{tag, NoticeFields};
use crate::protocol::types::{FormatCode, Oid, TransactionStatus};

/// Wire type codes for backend messages (§6.3).
pub mod msg_type {
    pub const AUTHENTICATION: u8 = b'R';
    pub const PARAMETER_STATUS: u8 = b'S';
    pub const BACKEND_KEY_DATA: u8 = b'K';
    pub const READY_FOR_QUERY: u8 = b'Z';
    pub const ROW_DESCRIPTION: u8 = b'T';
    pub const DATA_ROW: u8 = b'D';
    pub const COMMAND_COMPLETE: u8 = b'C';
    pub const EMPTY_QUERY_RESPONSE: u8 = b'I';
    pub const PARSE_COMPLETE: u8 = b'1';
    pub const BIND_COMPLETE: u8 = b'2';
    pub const CLOSE_COMPLETE: u8 = b'3';
    pub const NO_DATA: u8 = b'n';
    pub const PARAMETER_DESCRIPTION: u8 = b't';
    pub const PORTAL_SUSPENDED: u8 = b's';
    pub const ERROR_RESPONSE: u8 = b'E';
    pub const NOTICE_RESPONSE: u8 = b'N';
    pub const NOTIFICATION_RESPONSE: u8 = b'A';
    pub const COPY_IN_RESPONSE: u8 = b'G';
    pub const COPY_OUT_RESPONSE: u8 = b'H';
    pub const REPLICATION_START: u8 = b'W';
    pub const COPY_DATA: u8 = b'd';
    pub const COPY_DONE: u8 = b'c';
}

/// `AuthenticationXXX` subcodes (§3.2).
mod auth_subcode {
    pub const OK: i32 = 0;
    pub const CLEARTEXT_PASSWORD: i32 = 3;
    pub const MD5_PASSWORD: i32 = 5;
    pub const SASL: i32 = 10;
    pub const SASL_CONTINUE: i32 = 11;
    pub const SASL_FINAL: i32 = 12;
}

/// One `AuthenticationXXX` message, nested under [`Response::Authentication`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMessage {
    Ok,
    CleartextPassword,
    Md5Password { salt: [u8; 4] },
    Sasl { mechanisms: Vec<String> },
    SaslContinue { data: Vec<u8> },
    SaslFinal { data: Vec<u8> },
    /// A subcode this decoder doesn't interpret further (e.g. GSS/SSPI),
    /// carried through verbatim so a proxy can still forward it.
    Other { subcode: i32, data: Vec<u8> },
}

/// Whether an `ErrorResponse` or `NoticeResponse` produced a field set
/// (§3.2 — the two share a wire format and differ only in severity intent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Error,
    Notice,
}

/// One column descriptor inside a `RowDescription` (§3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescription {
    pub name: String,
    pub table_oid: Oid,
    pub column_id: i16,
    pub type_oid: Oid,
    pub type_size: i16,
    pub type_modifier: i32,
    pub format: FormatCode,
}

/// A decoded backend message (§3.2).
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Authentication(AuthMessage),
    ParameterStatus { name: String, value: String },
    BackendKeyData { process_id: u32, secret_key: u32 },
    ReadyForQuery { status: TransactionStatus },
    RowDescription { fields: Vec<FieldDescription> },
    /// Per §3.2: each value is its raw bytes, or `None` for SQL NULL. This
    /// decoder never interprets binary-format values (§1 Non-goals); the
    /// column's [`FormatCode`] from the preceding `RowDescription` says how
    /// a caller could, if it chose to.
    DataRow { values: Vec<Option<Vec<u8>>> },
    CommandComplete { tag: String },
    EmptyQueryResponse,
    ParseComplete,
    BindComplete,
    CloseComplete,
    NoData,
    ParameterDescription { parameter_types: Vec<Oid> },
    PortalSuspended,
    NoticeOrError { kind: NoticeKind, fields: NoticeFields },
    NotificationResponse {
        process_id: u32,
        channel: String,
        payload: String,
    },
    CopyInResponse {
        format: FormatCode,
        column_formats: Vec<FormatCode>,
    },
    CopyOutResponse {
        format: FormatCode,
        column_formats: Vec<FormatCode>,
    },
    CopyData { data: Vec<u8> },
    CopyDone,
    /// Logical/physical replication handshake marker (`W`). Replication
    /// itself is out of scope; this exists so the code is at least
    /// recognized rather than rejected as unknown.
    ReplicationStart,
}

/// Parse an `ErrorResponse`/`NoticeResponse` field list (tag byte, cstring,
/// repeated, terminated by a NUL tag) into [`NoticeFields`]. Shared by the
/// decoder here and usable by callers building synthetic notices from raw
/// bytes they received elsewhere.
pub fn parse_notice_fields(r: &mut ByteReader<'_>) -> Result<NoticeFields> {
    let mut fields = NoticeFields::new();
    loop {
        let field_tag = r.byte()?;
        if field_tag == tag::TERMINATOR {
            break;
        }
        let value = r.cstring()?;
        fields.insert(field_tag, value);
    }
    Ok(fields)
}

/// Result value encoding a decoder should expect. Binary is rejected at
/// construction (§1 Non-goals, §7): this crate never interprets
/// binary-format column values, so a decoder built for them would silently
/// mislead callers into thinking that path works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultMode {
    #[default]
    Text,
    Binary,
}

/// Streaming decoder for backend messages. See [`crate::protocol::command::CommandDecoder`]
/// for the shared framing/reassembly discipline this mirrors.
#[derive(Default)]
pub struct ResponseDecoder {
    buffer: FrameBuffer,
}

impl ResponseDecoder {
    /// A decoder ready to parse the framed backend message stream, in text
    /// result mode.
    pub fn new() -> Self {
        Self {
            buffer: FrameBuffer::new(),
        }
    }

    /// Construct with an explicit [`ResultMode`]; fails immediately for
    /// `ResultMode::Binary`.
    pub fn with_mode(mode: ResultMode) -> Result<Self> {
        match mode {
            ResultMode::Text => Ok(Self::new()),
            ResultMode::Binary => Err(Error::Unsupported(
                "binary result decode mode is not implemented".into(),
            )),
        }
    }

    /// Feed newly-read bytes and emit every response that becomes fully
    /// framed, alongside its exact raw bytes (valid only for the duration of
    /// the callback).
    pub fn feed(
        &mut self,
        chunk: &[u8],
        mut on_message: impl FnMut(Response, &[u8]) -> Result<()>,
    ) -> Result<()> {
        self.buffer.ingest(chunk);

        while let Some((response, start, end)) = self.try_decode_one()? {
            let raw = self.buffer.raw(start, end);
            on_message(response, raw)?;
        }

        self.buffer.finish_pass();
        Ok(())
    }

    fn try_decode_one(&mut self) -> Result<Option<(Response, usize, usize)>> {
        let live = self.buffer.live();
        if live.len() < 5 {
            return Ok(None);
        }
        let code = live[0];
        let length = u32::from_be_bytes([live[1], live[2], live[3], live[4]]) as usize;
        let total = 1 + length;
        if live.len() < total {
            return Ok(None);
        }

        let start = self.buffer.cursor();
        let body = &live[5..total];
        let response = Self::parse_body(code, body)?;
        self.buffer.advance(total);
        Ok(Some((response, start, start + total)))
    }

    fn parse_body(code: u8, body: &[u8]) -> Result<Response> {
        let mut r = ByteReader::new(body);
        match code {
            msg_type::AUTHENTICATION => Ok(Response::Authentication(parse_auth(&mut r)?)),
            msg_type::PARAMETER_STATUS => {
                let name = r.cstring()?.to_string();
                let value = r.cstring()?.to_string();
                Ok(Response::ParameterStatus { name, value })
            }
            msg_type::BACKEND_KEY_DATA => {
                let process_id = r.uint32()?;
                let secret_key = r.uint32()?;
                Ok(Response::BackendKeyData {
                    process_id,
                    secret_key,
                })
            }
            msg_type::READY_FOR_QUERY => {
                let byte = r.byte()?;
                let status = TransactionStatus::from_byte(byte)
                    .ok_or_else(|| Error::protocol(format!("invalid transaction status {byte:#x}")))?;
                Ok(Response::ReadyForQuery { status })
            }
            msg_type::ROW_DESCRIPTION => {
                let count = r.uint16()? as usize;
                let mut fields = Vec::with_capacity(count);
                for _ in 0..count {
                    let name = r.cstring()?.to_string();
                    let table_oid = r.uint32()?;
                    let column_id = r.int16()?;
                    let type_oid = r.uint32()?;
                    let type_size = r.int16()?;
                    let type_modifier = r.int32()?;
                    let format = FormatCode::from_u16(r.uint16()?);
                    fields.push(FieldDescription {
                        name,
                        table_oid,
                        column_id,
                        type_oid,
                        type_size,
                        type_modifier,
                        format,
                    });
                }
                Ok(Response::RowDescription { fields })
            }
            msg_type::DATA_ROW => {
                let count = r.uint16()? as usize;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    let len = r.int32()?;
                    if len == -1 {
                        values.push(None);
                    } else {
                        values.push(Some(r.bytes(len as usize)?.to_vec()));
                    }
                }
                Ok(Response::DataRow { values })
            }
            msg_type::COMMAND_COMPLETE => Ok(Response::CommandComplete {
                tag: r.cstring()?.to_string(),
            }),
            msg_type::EMPTY_QUERY_RESPONSE => Ok(Response::EmptyQueryResponse),
            msg_type::PARSE_COMPLETE => Ok(Response::ParseComplete),
            msg_type::BIND_COMPLETE => Ok(Response::BindComplete),
            msg_type::CLOSE_COMPLETE => Ok(Response::CloseComplete),
            msg_type::NO_DATA => Ok(Response::NoData),
            msg_type::PARAMETER_DESCRIPTION => {
                let count = r.uint16()? as usize;
                let mut parameter_types = Vec::with_capacity(count);
                for _ in 0..count {
                    parameter_types.push(r.uint32()?);
                }
                Ok(Response::ParameterDescription { parameter_types })
            }
            msg_type::PORTAL_SUSPENDED => Ok(Response::PortalSuspended),
            msg_type::ERROR_RESPONSE => Ok(Response::NoticeOrError {
                kind: NoticeKind::Error,
                fields: parse_notice_fields(&mut r)?,
            }),
            msg_type::NOTICE_RESPONSE => Ok(Response::NoticeOrError {
                kind: NoticeKind::Notice,
                fields: parse_notice_fields(&mut r)?,
            }),
            msg_type::NOTIFICATION_RESPONSE => {
                let process_id = r.uint32()?;
                let channel = r.cstring()?.to_string();
                let payload = r.cstring()?.to_string();
                Ok(Response::NotificationResponse {
                    process_id,
                    channel,
                    payload,
                })
            }
            msg_type::COPY_IN_RESPONSE => {
                let (format, column_formats) = parse_copy_response(&mut r)?;
                Ok(Response::CopyInResponse {
                    format,
                    column_formats,
                })
            }
            msg_type::COPY_OUT_RESPONSE => {
                let (format, column_formats) = parse_copy_response(&mut r)?;
                Ok(Response::CopyOutResponse {
                    format,
                    column_formats,
                })
            }
            msg_type::COPY_DATA => Ok(Response::CopyData {
                data: body.to_vec(),
            }),
            msg_type::COPY_DONE => Ok(Response::CopyDone),
            msg_type::REPLICATION_START => Ok(Response::ReplicationStart),
            other => Err(Error::protocol(format!(
                "unknown backend message code {:#x} ({:?})",
                other, other as char
            ))),
        }
    }
}

fn parse_auth(r: &mut ByteReader<'_>) -> Result<AuthMessage> {
    let subcode = r.int32()?;
    match subcode {
        auth_subcode::OK => Ok(AuthMessage::Ok),
        auth_subcode::CLEARTEXT_PASSWORD => {
            // Compatibility relaxation (§8 "boundary behaviors"): trailing
            // bytes where none are expected degrade to Ok rather than erroring.
            if r.remaining() != 0 {
                tracing::warn!(
                    remaining = r.remaining(),
                    "AuthenticationResponse subcode 3 (CleartextPassword) had unexpected \
                     trailing bytes, falling back to AuthenticationOk"
                );
                return Ok(AuthMessage::Ok);
            }
            Ok(AuthMessage::CleartextPassword)
        }
        auth_subcode::MD5_PASSWORD => {
            // Compatibility relaxation (§8): a body that isn't exactly a
            // 4-byte salt degrades to Ok rather than erroring.
            if r.remaining() != 4 {
                tracing::warn!(
                    remaining = r.remaining(),
                    "AuthenticationResponse subcode 5 (Md5Password) had length != 4, \
                     falling back to AuthenticationOk"
                );
                return Ok(AuthMessage::Ok);
            }
            let bytes = r.bytes(4)?;
            let mut salt = [0u8; 4];
            salt.copy_from_slice(bytes);
            Ok(AuthMessage::Md5Password { salt })
        }
        auth_subcode::SASL => {
            let mut mechanisms = Vec::new();
            while r.remaining() > 0 {
                let name = r.cstring()?;
                if name.is_empty() {
                    break;
                }
                mechanisms.push(name.to_string());
            }
            Ok(AuthMessage::Sasl { mechanisms })
        }
        auth_subcode::SASL_CONTINUE => Ok(AuthMessage::SaslContinue {
            data: r.bytes(r.remaining())?.to_vec(),
        }),
        auth_subcode::SASL_FINAL => Ok(AuthMessage::SaslFinal {
            data: r.bytes(r.remaining())?.to_vec(),
        }),
        other => Ok(AuthMessage::Other {
            subcode: other,
            data: r.bytes(r.remaining())?.to_vec(),
        }),
    }
}

fn parse_copy_response(r: &mut ByteReader<'_>) -> Result<(FormatCode, Vec<FormatCode>)> {
    let format = FormatCode::from_u16(r.byte()? as u16);
    let count = r.uint16()? as usize;
    let mut column_formats = Vec::with_capacity(count);
    for _ in 0..count {
        column_formats.push(FormatCode::from_u16(r.uint16()?));
    }
    Ok((format, column_formats))
}
