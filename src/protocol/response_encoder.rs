//! Serializes [`Response`] values back onto the wire (§4.5).
//!
//! This is what a session binder or honeypot uses to actually speak the
//! backend protocol: every `RowDescription`/`DataRow`/`ReadyForQuery` a
//! server-side emulator emits goes through here.

use crate::protocol::codec::ByteWriter;
use crate::protocol::notice::NoticeFields;
use crate::protocol::response::{msg_type, AuthMessage, FieldDescription, NoticeKind, Response};
use crate::protocol::types::{FormatCode, Oid, TransactionStatus};

/// Stateless encoder: each `encode`/`encode_*` call returns one complete frame.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    writer: ByteWriter,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode any [`Response`] to its wire representation.
    pub fn encode(&mut self, response: &Response) -> Vec<u8> {
        match response {
            Response::Authentication(auth) => self.encode_auth(auth),
            Response::ParameterStatus { name, value } => {
                self.writer.cstring(name);
                self.writer.cstring(value);
                self.writer.flush(msg_type::PARAMETER_STATUS)
            }
            Response::BackendKeyData {
                process_id,
                secret_key,
            } => {
                self.writer.uint32(*process_id);
                self.writer.uint32(*secret_key);
                self.writer.flush(msg_type::BACKEND_KEY_DATA)
            }
            Response::ReadyForQuery { status } => {
                self.writer.byte(status.as_byte());
                self.writer.flush(msg_type::READY_FOR_QUERY)
            }
            Response::RowDescription { fields } => self.encode_row_description(fields),
            Response::DataRow { values } => self.encode_data_row(values),
            Response::CommandComplete { tag } => {
                self.writer.cstring(tag);
                self.writer.flush(msg_type::COMMAND_COMPLETE)
            }
            Response::EmptyQueryResponse => self.writer.flush(msg_type::EMPTY_QUERY_RESPONSE),
            Response::ParseComplete => self.writer.flush(msg_type::PARSE_COMPLETE),
            Response::BindComplete => self.writer.flush(msg_type::BIND_COMPLETE),
            Response::CloseComplete => self.writer.flush(msg_type::CLOSE_COMPLETE),
            Response::NoData => self.writer.flush(msg_type::NO_DATA),
            Response::ParameterDescription { parameter_types } => {
                self.writer.uint16(parameter_types.len() as u16);
                for oid in parameter_types {
                    self.writer.uint32(*oid);
                }
                self.writer.flush(msg_type::PARAMETER_DESCRIPTION)
            }
            Response::PortalSuspended => self.writer.flush(msg_type::PORTAL_SUSPENDED),
            Response::NoticeOrError { kind, fields } => self.encode_notice(*kind, fields),
            Response::NotificationResponse {
                process_id,
                channel,
                payload,
            } => {
                self.writer.uint32(*process_id);
                self.writer.cstring(channel);
                self.writer.cstring(payload);
                self.writer.flush(msg_type::NOTIFICATION_RESPONSE)
            }
            Response::CopyInResponse {
                format,
                column_formats,
            } => self.encode_copy_response(msg_type::COPY_IN_RESPONSE, *format, column_formats),
            Response::CopyOutResponse {
                format,
                column_formats,
            } => self.encode_copy_response(msg_type::COPY_OUT_RESPONSE, *format, column_formats),
            Response::CopyData { data } => {
                self.writer.bytes(data);
                self.writer.flush(msg_type::COPY_DATA)
            }
            Response::CopyDone => self.writer.flush(msg_type::COPY_DONE),
            Response::ReplicationStart => self.writer.flush(msg_type::REPLICATION_START),
        }
    }

    /// Convenience for the common `ReadyForQuery`/`CommandComplete`/etc.
    /// path: build the row description and data for a single-statement
    /// result set from already-in-memory values. `None` entries encode as
    /// SQL NULL (length -1), per §4.5.
    pub fn data_row(&mut self, values: &[Option<&[u8]>]) -> Vec<u8> {
        self.writer.uint16(values.len() as u16);
        for value in values {
            match value {
                Some(bytes) => {
                    self.writer.int32(bytes.len() as i32);
                    self.writer.bytes(bytes);
                }
                None => {
                    self.writer.int32(-1);
                }
            }
        }
        self.writer.flush(msg_type::DATA_ROW)
    }

    /// Build an `ErrorResponse` from anything convertible to [`NoticeFields`]
    /// — a plain string, an owned `String`, or an already-built field set.
    pub fn error(&mut self, fields: impl Into<NoticeFields>) -> Vec<u8> {
        self.encode_notice(NoticeKind::Error, &fields.into())
    }

    /// Build a `NoticeResponse`; see [`Self::error`].
    pub fn notice(&mut self, fields: impl Into<NoticeFields>) -> Vec<u8> {
        self.encode_notice(NoticeKind::Notice, &fields.into())
    }

    fn encode_auth(&mut self, auth: &AuthMessage) -> Vec<u8> {
        match auth {
            AuthMessage::Ok => {
                self.writer.int32(0);
            }
            AuthMessage::CleartextPassword => {
                self.writer.int32(3);
            }
            AuthMessage::Md5Password { salt } => {
                self.writer.int32(5);
                self.writer.bytes(salt);
            }
            AuthMessage::Sasl { mechanisms } => {
                self.writer.int32(10);
                for mech in mechanisms {
                    self.writer.cstring(mech);
                }
                self.writer.byte(0);
            }
            AuthMessage::SaslContinue { data } => {
                self.writer.int32(11);
                self.writer.bytes(data);
            }
            AuthMessage::SaslFinal { data } => {
                self.writer.int32(12);
                self.writer.bytes(data);
            }
            AuthMessage::Other { subcode, data } => {
                self.writer.int32(*subcode);
                self.writer.bytes(data);
            }
        }
        self.writer.flush(msg_type::AUTHENTICATION)
    }

    fn encode_row_description(&mut self, fields: &[FieldDescription]) -> Vec<u8> {
        self.writer.uint16(fields.len() as u16);
        for field in fields {
            self.writer.cstring(&field.name);
            self.writer.uint32(field.table_oid);
            self.writer.int16(field.column_id);
            self.writer.uint32(field.type_oid);
            self.writer.int16(field.type_size);
            self.writer.int32(field.type_modifier);
            self.writer.uint16(field.format as u16);
        }
        self.writer.flush(msg_type::ROW_DESCRIPTION)
    }

    fn encode_data_row(&mut self, values: &[Option<Vec<u8>>]) -> Vec<u8> {
        self.writer.uint16(values.len() as u16);
        for value in values {
            match value {
                Some(bytes) => {
                    self.writer.int32(bytes.len() as i32);
                    self.writer.bytes(bytes);
                }
                None => {
                    self.writer.int32(-1);
                }
            }
        }
        self.writer.flush(msg_type::DATA_ROW)
    }

    fn encode_notice(&mut self, kind: NoticeKind, fields: &NoticeFields) -> Vec<u8> {
        for (field_tag, value) in fields.iter() {
            self.writer.byte(field_tag);
            self.writer.cstring(value);
        }
        self.writer.byte(0);
        let code = match kind {
            NoticeKind::Error => msg_type::ERROR_RESPONSE,
            NoticeKind::Notice => msg_type::NOTICE_RESPONSE,
        };
        self.writer.flush(code)
    }

    fn encode_copy_response(
        &mut self,
        code: u8,
        format: FormatCode,
        column_formats: &[FormatCode],
    ) -> Vec<u8> {
        self.writer.byte(format as u8);
        self.writer.uint16(column_formats.len() as u16);
        for column_format in column_formats {
            self.writer.uint16(*column_format as u16);
        }
        self.writer.flush(code)
    }
}

/// Build a default `RowDescription` field for a text-format column, the
/// shape a honeypot or emulator reaches for most often.
pub fn text_field(name: impl Into<String>, type_oid: Oid) -> FieldDescription {
    FieldDescription {
        name: name.into(),
        table_oid: 0,
        column_id: 0,
        type_oid,
        type_size: -1,
        type_modifier: -1,
        format: FormatCode::Text,
    }
}

/// A `ReadyForQuery` with the idle status, the common steady-state frame.
pub fn ready_idle() -> Response {
    Response::ReadyForQuery {
        status: TransactionStatus::Idle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::response::ResponseDecoder;
    use crate::protocol::types::oid;

    #[test]
    fn ready_for_query_roundtrips_through_decoder() {
        let mut enc = ResponseEncoder::new();
        let wire = enc.encode(&ready_idle());
        let mut dec = ResponseDecoder::new();
        let mut seen = None;
        dec.feed(&wire, |r, _| {
            seen = Some(r);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, Some(ready_idle()));
    }

    #[test]
    fn row_description_and_data_row_roundtrip() {
        let mut enc = ResponseEncoder::new();
        let fields = vec![text_field("id", oid::INT4), text_field("name", oid::TEXT)];
        let row_desc_wire = enc.encode(&Response::RowDescription {
            fields: fields.clone(),
        });
        let data_row_wire = enc.data_row(&[Some(b"1"), None]);

        let mut dec = ResponseDecoder::new();
        let mut seen = Vec::new();
        dec.feed(&row_desc_wire, |r, _| {
            seen.push(r);
            Ok(())
        })
        .unwrap();
        dec.feed(&data_row_wire, |r, _| {
            seen.push(r);
            Ok(())
        })
        .unwrap();

        assert_eq!(seen[0], Response::RowDescription { fields });
        assert_eq!(
            seen[1],
            Response::DataRow {
                values: vec![Some(b"1".to_vec()), None]
            }
        );
    }

    #[test]
    fn error_convenience_builds_minimal_fields() {
        let mut enc = ResponseEncoder::new();
        let wire = enc.error("syntax error at or near \"FOO\"");
        let mut dec = ResponseDecoder::new();
        let mut seen = None;
        dec.feed(&wire, |r, _| {
            seen = Some(r);
            Ok(())
        })
        .unwrap();
        match seen.unwrap() {
            Response::NoticeOrError {
                kind: crate::protocol::response::NoticeKind::Error,
                fields,
            } => {
                assert_eq!(fields.message(), Some("syntax error at or near \"FOO\""));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
