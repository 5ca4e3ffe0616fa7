//! Frontend (client → backend) message model and [`CommandDecoder`] (§3.2, §4.3).

use crate::buffer::FrameBuffer;
use crate::error::{Error, Result};
use crate::protocol::codec::ByteReader;
use crate::protocol::types::Oid;

/// Wire type codes for frontend messages (§6.3).
pub mod msg_type {
    pub const PASSWORD: u8 = b'p';
    pub const QUERY: u8 = b'Q';
    pub const PARSE: u8 = b'P';
    pub const BIND: u8 = b'B';
    pub const DESCRIBE: u8 = b'D';
    pub const EXECUTE: u8 = b'E';
    pub const FLUSH: u8 = b'H';
    pub const SYNC: u8 = b'S';
    pub const TERMINATE: u8 = b'X';
    pub const CLOSE: u8 = b'C';
    pub const COPY_DATA: u8 = b'd';
    pub const COPY_DONE: u8 = b'c';
    pub const COPY_FAIL: u8 = b'f';
}

const SSL_REQUEST_CODE: i32 = 80_877_103;
const GSSENC_REQUEST_CODE: i32 = 80_877_104;
const CANCEL_REQUEST_CODE: i32 = 80_877_102;

/// A value carried by a `Bind` command: either text (possibly null) or raw
/// binary bytes (possibly null), per §3.2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Text-format value, or `None` for SQL NULL.
    Text(Option<String>),
    /// Binary-format value, or `None` for SQL NULL.
    Binary(Option<Vec<u8>>),
}

impl Value {
    /// True if this value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Text(None) | Value::Binary(None))
    }
}

/// The target of a `Describe`/`Close` command: a named (or unnamed) portal
/// or prepared statement (§3.2 `portalType: 'P'|'S'`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalTarget {
    /// A bound portal.
    Portal(String),
    /// A prepared statement.
    Statement(String),
}

/// A decoded frontend message (§3.2).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// The unframed startup packet (§3.1), synthesized with type code `0`.
    Init {
        major: u16,
        minor: u16,
        options: Vec<(String, String)>,
    },
    /// A `CancelRequest` arriving on a fresh connection (§11 supplement):
    /// structurally a startup packet whose first 4 body bytes are the cancel
    /// magic number rather than a protocol version.
    CancelRequest { process_id: u32, secret_key: u32 },
    /// An `SSLRequest`/`GSSENCRequest` negotiation probe (§11 supplement).
    /// Actually upgrading the stream remains out of scope (§1); this variant
    /// only lets a caller recognize and respond to the probe.
    NegotiateEncryption { tls: bool },
    /// Password or SASL response (`p`), carrying the MD5 digest or SASL blob
    /// as an opaque string per §3.2.
    StartupMd5 { md5: String },
    /// Simple query (`Q`).
    Query { query: String },
    /// `Parse` (`P`): create a prepared statement.
    Parse {
        statement: String,
        query: String,
        parameter_types: Vec<Oid>,
    },
    /// `Bind` (`B`): bind parameters to a portal. The ignored parameter
    /// format-code list is intentionally not represented — see §9 DESIGN
    /// NOTES on the ignored `u16`.
    Bind {
        portal: String,
        statement: String,
        values: Vec<Value>,
        /// The trailing result-format flag: `false` = text, `true` = binary.
        result_binary: bool,
    },
    /// `Describe` (`D`).
    Describe { target: PortalTarget },
    /// `Close` (`C`).
    Close { target: PortalTarget },
    /// `Execute` (`E`).
    Execute { portal: String, max_rows: u32 },
    /// `Flush` (`H`).
    Flush,
    /// `Sync` (`S`).
    Sync,
    /// `Terminate` (`X`).
    Terminate,
    /// `CopyData` (`d`) while a COPY-in is in progress.
    CopyData { data: Vec<u8> },
    /// `CopyDone` (`c`).
    CopyDone,
    /// `CopyFail` (`f`).
    CopyFail { message: String },
}

/// Streaming decoder for frontend messages.
///
/// Accepts successive byte chunks from the socket (in any partition, down to
/// one byte at a time) and invokes `on_message` once per fully-framed command,
/// alongside the exact raw bytes that produced it (§3.4 "Raw fidelity"). The
/// raw slice is borrowed from the decoder's internal buffer and is valid only
/// for the duration of that invocation.
pub struct CommandDecoder {
    buffer: FrameBuffer,
    started_up: bool,
}

impl Default for CommandDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDecoder {
    /// A decoder ready to parse the startup packet first.
    pub fn new() -> Self {
        Self {
            buffer: FrameBuffer::new(),
            started_up: false,
        }
    }

    /// True once the startup handshake has been consumed and the decoder is
    /// interpreting the framed `[code][len][body]` stream (§3.3).
    pub fn started_up(&self) -> bool {
        self.started_up
    }

    /// Feed newly-read bytes and emit every command that becomes fully
    /// framed as a result, in wire order.
    pub fn feed(
        &mut self,
        chunk: &[u8],
        mut on_message: impl FnMut(Command, &[u8]) -> Result<()>,
    ) -> Result<()> {
        self.buffer.ingest(chunk);

        loop {
            if !self.started_up {
                match self.try_decode_startup()? {
                    Some((command, start, end)) => {
                        self.started_up = true;
                        let raw = self.buffer.raw(start, end);
                        on_message(command, raw)?;
                    }
                    None => break,
                }
                continue;
            }

            match self.try_decode_framed()? {
                Some((command, start, end)) => {
                    let raw = self.buffer.raw(start, end);
                    on_message(command, raw)?;
                }
                None => break,
            }
        }

        self.buffer.finish_pass();
        Ok(())
    }

    /// Try to decode the unframed startup/cancel/SSL packet. Returns the
    /// absolute `[start, end)` span of the consumed bytes for the raw
    /// accessor.
    fn try_decode_startup(&mut self) -> Result<Option<(Command, usize, usize)>> {
        let live = self.buffer.live();
        if live.len() < 4 {
            return Ok(None);
        }
        let mut peek = ByteReader::new(live);
        let declared_len = peek.uint32()? as usize;
        if live.len() < declared_len {
            return Ok(None);
        }
        if declared_len < 4 {
            return Err(Error::protocol(format!(
                "startup packet length {declared_len} shorter than its own header"
            )));
        }

        let start = self.buffer.cursor();
        let body = &live[4..declared_len];
        let mut reader = ByteReader::new(body);
        let code = reader.int32()?;

        let command = match code {
            SSL_REQUEST_CODE => Command::NegotiateEncryption { tls: true },
            GSSENC_REQUEST_CODE => Command::NegotiateEncryption { tls: false },
            CANCEL_REQUEST_CODE => {
                let process_id = reader.uint32()?;
                let secret_key = reader.uint32()?;
                Command::CancelRequest {
                    process_id,
                    secret_key,
                }
            }
            version => {
                let major = ((version >> 16) & 0xFFFF) as u16;
                let minor = (version & 0xFFFF) as u16;
                if major != 3 {
                    return Err(Error::protocol(format!(
                        "unsupported startup protocol major version {major}"
                    )));
                }
                let mut options = Vec::new();
                loop {
                    let key = reader.cstring()?;
                    if key.is_empty() {
                        break;
                    }
                    let value = reader.cstring()?;
                    options.push((key.to_string(), value.to_string()));
                }
                Command::Init {
                    major,
                    minor,
                    options,
                }
            }
        };

        self.buffer.advance(declared_len);
        Ok(Some((command, start, start + declared_len)))
    }

    /// Try to decode one `[code][len][body]` frame from the framed stream.
    fn try_decode_framed(&mut self) -> Result<Option<(Command, usize, usize)>> {
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
        let command = Self::parse_body(code, body)?;
        self.buffer.advance(total);
        Ok(Some((command, start, start + total)))
    }

    fn parse_body(code: u8, body: &[u8]) -> Result<Command> {
        let mut r = ByteReader::new(body);
        match code {
            msg_type::QUERY => Ok(Command::Query {
                query: r.cstring()?.to_string(),
            }),
            msg_type::PASSWORD => Ok(Command::StartupMd5 {
                md5: r.cstring()?.to_string(),
            }),
            msg_type::EXECUTE => {
                let portal = r.cstring()?.to_string();
                let max_rows = r.uint32()?;
                Ok(Command::Execute { portal, max_rows })
            }
            msg_type::PARSE => {
                let statement = r.cstring()?.to_string();
                let query = r.cstring()?.to_string();
                let count = r.uint16()? as usize;
                let mut parameter_types = Vec::with_capacity(count);
                for _ in 0..count {
                    parameter_types.push(r.uint32()?);
                }
                Ok(Command::Parse {
                    statement,
                    query,
                    parameter_types,
                })
            }
            msg_type::BIND => {
                let portal = r.cstring()?.to_string();
                let statement = r.cstring()?.to_string();
                // §9 DESIGN NOTES: parameter format-code count/list is read
                // and discarded by design; per-value kind drives decoding.
                let format_code_count = r.uint16()? as usize;
                for _ in 0..format_code_count {
                    r.int16()?;
                }
                let value_count = r.uint16()? as usize;
                let mut values = Vec::with_capacity(value_count);
                for _ in 0..value_count {
                    let kind = r.int16()?;
                    let len = r.int32()?;
                    let value = if len == -1 {
                        if kind == 1 {
                            Value::Binary(None)
                        } else {
                            Value::Text(None)
                        }
                    } else {
                        let bytes = r.bytes(len as usize)?;
                        if kind == 1 {
                            Value::Binary(Some(bytes.to_vec()))
                        } else {
                            let s = simdutf8::compat::from_utf8(bytes).map_err(|e| {
                                Error::protocol(format!("Bind: invalid UTF-8 value: {e}"))
                            })?;
                            Value::Text(Some(s.to_string()))
                        }
                    };
                    values.push(value);
                }
                let result_binary = r.int16()? == 1;
                Ok(Command::Bind {
                    portal,
                    statement,
                    values,
                    result_binary,
                })
            }
            msg_type::DESCRIBE => Ok(Command::Describe {
                target: parse_portal_target(&mut r)?,
            }),
            msg_type::CLOSE => Ok(Command::Close {
                target: parse_portal_target(&mut r)?,
            }),
            msg_type::FLUSH => Ok(Command::Flush),
            msg_type::SYNC => Ok(Command::Sync),
            msg_type::TERMINATE => Ok(Command::Terminate),
            msg_type::COPY_DATA => Ok(Command::CopyData {
                data: body.to_vec(),
            }),
            msg_type::COPY_DONE => Ok(Command::CopyDone),
            msg_type::COPY_FAIL => Ok(Command::CopyFail {
                message: r.cstring()?.to_string(),
            }),
            other => Err(Error::protocol(format!(
                "unknown frontend message code {:#x} ({:?})",
                other, other as char
            ))),
        }
    }
}

fn parse_portal_target(r: &mut ByteReader<'_>) -> Result<PortalTarget> {
    let raw = r.cstring()?;
    let mut chars = raw.chars();
    let kind = chars
        .next()
        .ok_or_else(|| Error::protocol("Describe/Close: empty target prefix"))?;
    let name = chars.as_str().to_string();
    match kind {
        'P' => Ok(PortalTarget::Portal(name)),
        'S' => Ok(PortalTarget::Statement(name)),
        other => Err(Error::protocol(format!(
            "Describe/Close: invalid target prefix {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn startup_packet(params: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&196_608i32.to_be_bytes());
        for (k, v) in params {
            body.extend_from_slice(k.as_bytes());
            body.push(0);
            body.extend_from_slice(v.as_bytes());
            body.push(0);
        }
        body.push(0);
        let mut packet = ((body.len() + 4) as u32).to_be_bytes().to_vec();
        packet.extend_from_slice(&body);
        packet
    }

    #[test]
    fn decodes_startup_then_simple_query() {
        let mut dec = CommandDecoder::new();
        let mut seen = Vec::new();
        let startup = startup_packet(&[("user", "u"), ("database", "d")]);
        dec.feed(&startup, |c, raw| {
            seen.push(c);
            assert_eq!(raw, &startup[..]);
            Ok(())
        })
        .unwrap();
        assert!(dec.started_up());
        assert!(matches!(seen[0], Command::Init { .. }));

        let mut q = vec![b'Q'];
        q.extend_from_slice(&13u32.to_be_bytes());
        q.extend_from_slice(b"SELECT 1\0");
        dec.feed(&q, |c, raw| {
            seen.push(c);
            assert_eq!(raw, &q[..]);
            Ok(())
        })
        .unwrap();
        assert_eq!(
            seen[1],
            Command::Query {
                query: "SELECT 1".into()
            }
        );
    }

    #[test]
    fn rejects_non_v3_major_version() {
        let mut dec = CommandDecoder::new();
        let mut body = Vec::new();
        body.extend_from_slice(&(2i32 << 16).to_be_bytes());
        body.push(0);
        let mut packet = ((body.len() + 4) as u32).to_be_bytes().to_vec();
        packet.extend_from_slice(&body);
        let err = dec.feed(&packet, |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn recognizes_cancel_request() {
        let mut dec = CommandDecoder::new();
        let mut body = Vec::new();
        body.extend_from_slice(&CANCEL_REQUEST_CODE.to_be_bytes());
        body.extend_from_slice(&42u32.to_be_bytes());
        body.extend_from_slice(&99u32.to_be_bytes());
        let mut packet = ((body.len() + 4) as u32).to_be_bytes().to_vec();
        packet.extend_from_slice(&body);
        let mut seen = None;
        dec.feed(&packet, |c, _| {
            seen = Some(c);
            Ok(())
        })
        .unwrap();
        assert_eq!(
            seen,
            Some(Command::CancelRequest {
                process_id: 42,
                secret_key: 99
            })
        );
        // A CancelRequest never flips started_up: the connection closes after it.
        assert!(!dec.started_up());
    }

    #[test]
    fn unknown_code_after_startup_is_fatal() {
        let mut dec = CommandDecoder::new();
        let startup = startup_packet(&[]);
        dec.feed(&startup, |_, _| Ok(())).unwrap();

        let mut garbage = vec![b'~'];
        garbage.extend_from_slice(&4u32.to_be_bytes());
        let err = dec.feed(&garbage, |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn fragmented_byte_at_a_time_matches_single_call() {
        let mut whole = startup_packet(&[("user", "u")]);
        whole.push(b'Q');
        whole.extend_from_slice(&13u32.to_be_bytes());
        whole.extend_from_slice(b"SELECT 1\0");

        let mut fragmented_dec = CommandDecoder::new();
        let mut fragmented = Vec::new();
        let mut raws: Vec<Vec<u8>> = Vec::new();
        for byte in &whole {
            fragmented_dec
                .feed(std::slice::from_ref(byte), |c, raw| {
                    fragmented.push(c);
                    raws.push(raw.to_vec());
                    Ok(())
                })
                .unwrap();
        }

        let mut single_dec = CommandDecoder::new();
        let mut single = Vec::new();
        single_dec
            .feed(&whole, |c, _| {
                single.push(c);
                Ok(())
            })
            .unwrap();

        assert_eq!(fragmented, single);
        assert_eq!(raws.concat(), whole);
    }
}
