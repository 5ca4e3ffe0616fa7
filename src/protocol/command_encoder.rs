//! Serializes [`Command`] values back onto the wire (§4.6).
//!
//! A proxy uses this to re-emit a command it has rewritten (or to forward
//! one untouched by re-encoding rather than replaying captured raw bytes,
//! when the raw span is no longer available).

use crate::protocol::codec::ByteWriter;
use crate::protocol::command::{msg_type, Command, PortalTarget, Value};

/// Stateless encoder: each `encode_*` call returns one complete frame.
#[derive(Debug, Default)]
pub struct CommandEncoder {
    writer: ByteWriter,
}

impl CommandEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode any [`Command`] to its wire representation.
    pub fn encode(&mut self, command: &Command) -> Vec<u8> {
        match command {
            Command::Init {
                major,
                minor,
                options,
            } => self.encode_init(*major, *minor, options),
            Command::CancelRequest {
                process_id,
                secret_key,
            } => self.encode_cancel_request(*process_id, *secret_key),
            Command::NegotiateEncryption { tls } => self.encode_negotiate_encryption(*tls),
            Command::StartupMd5 { md5 } => {
                self.writer.cstring(md5);
                self.writer.flush(msg_type::PASSWORD)
            }
            Command::Query { query } => {
                self.writer.cstring(query);
                self.writer.flush(msg_type::QUERY)
            }
            Command::Parse {
                statement,
                query,
                parameter_types,
            } => {
                self.writer.cstring(statement);
                self.writer.cstring(query);
                self.writer.uint16(parameter_types.len() as u16);
                for oid in parameter_types {
                    self.writer.uint32(*oid);
                }
                self.writer.flush(msg_type::PARSE)
            }
            Command::Bind {
                portal,
                statement,
                values,
                result_binary,
            } => {
                self.writer.cstring(portal);
                self.writer.cstring(statement);
                // No parameter format codes: every value below carries its
                // own kind, so the list is always empty on re-encode.
                self.writer.uint16(0);
                self.writer.uint16(values.len() as u16);
                for value in values {
                    match value {
                        Value::Text(None) => {
                            self.writer.int16(0);
                            self.writer.int32(-1);
                        }
                        Value::Text(Some(s)) => {
                            self.writer.int16(0);
                            self.writer.int32(s.len() as i32);
                            self.writer.string(s);
                        }
                        Value::Binary(None) => {
                            self.writer.int16(1);
                            self.writer.int32(-1);
                        }
                        Value::Binary(Some(bytes)) => {
                            self.writer.int16(1);
                            self.writer.int32(bytes.len() as i32);
                            self.writer.bytes(bytes);
                        }
                    }
                }
                self.writer.int16(if *result_binary { 1 } else { 0 });
                self.writer.flush(msg_type::BIND)
            }
            Command::Describe { target } => {
                self.encode_portal_target(target);
                self.writer.flush(msg_type::DESCRIBE)
            }
            Command::Close { target } => {
                self.encode_portal_target(target);
                self.writer.flush(msg_type::CLOSE)
            }
            Command::Execute { portal, max_rows } => {
                self.writer.cstring(portal);
                self.writer.uint32(*max_rows);
                self.writer.flush(msg_type::EXECUTE)
            }
            Command::Flush => self.writer.flush(msg_type::FLUSH),
            Command::Sync => self.writer.flush(msg_type::SYNC),
            Command::Terminate => self.writer.flush(msg_type::TERMINATE),
            Command::CopyData { data } => {
                self.writer.bytes(data);
                self.writer.flush(msg_type::COPY_DATA)
            }
            Command::CopyDone => self.writer.flush(msg_type::COPY_DONE),
            Command::CopyFail { message } => {
                self.writer.cstring(message);
                self.writer.flush(msg_type::COPY_FAIL)
            }
        }
    }

    fn encode_portal_target(&mut self, target: &PortalTarget) {
        match target {
            PortalTarget::Portal(name) => {
                self.writer.byte(b'P');
                self.writer.cstring(name);
            }
            PortalTarget::Statement(name) => {
                self.writer.byte(b'S');
                self.writer.cstring(name);
            }
        }
    }

    fn encode_init(&mut self, major: u16, minor: u16, options: &[(String, String)]) -> Vec<u8> {
        self.writer
            .int32(((major as i32) << 16) | minor as i32);
        for (key, value) in options {
            self.writer.cstring(key);
            self.writer.cstring(value);
        }
        self.writer.byte(0);
        self.writer.flush_unframed()
    }

    fn encode_cancel_request(&mut self, process_id: u32, secret_key: u32) -> Vec<u8> {
        self.writer.int32(80_877_102);
        self.writer.uint32(process_id);
        self.writer.uint32(secret_key);
        self.writer.flush_unframed()
    }

    fn encode_negotiate_encryption(&mut self, tls: bool) -> Vec<u8> {
        self.writer.int32(if tls { 80_877_103 } else { 80_877_104 });
        self.writer.flush_unframed()
    }
}
