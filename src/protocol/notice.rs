//! Notice/error field model, shared by the response decoder and encoder.
//!
//! §6.4 and §9 DESIGN NOTES: "Keep the tag→name map as a single source of
//! truth used by both encoder and decoder to prevent drift." `NoticeFields`
//! is that source of truth: [`ResponseDecoder`](crate::protocol::response)
//! parses real `ErrorResponse`/`NoticeResponse` bytes into it, and
//! [`ResponseEncoder`](crate::protocol::response_encoder) serializes it back
//! to the wire when emulating a server.

use std::fmt;

/// Single-letter field tags from the Postgres error/notice wire format.
pub mod tag {
    pub const SEVERITY: u8 = b'S';
    pub const SEVERITY_NON_LOCALIZED: u8 = b'V';
    pub const CODE: u8 = b'C';
    pub const MESSAGE: u8 = b'M';
    pub const DETAIL: u8 = b'D';
    pub const HINT: u8 = b'H';
    pub const POSITION: u8 = b'P';
    pub const INTERNAL_POSITION: u8 = b'p';
    pub const INTERNAL_QUERY: u8 = b'q';
    pub const WHERE: u8 = b'W';
    pub const SCHEMA: u8 = b's';
    pub const TABLE: u8 = b't';
    pub const COLUMN: u8 = b'c';
    pub const DATA_TYPE: u8 = b'd';
    pub const CONSTRAINT: u8 = b'n';
    pub const FILE: u8 = b'F';
    pub const LINE: u8 = b'L';
    pub const ROUTINE: u8 = b'R';
    /// Terminates a field list.
    pub const TERMINATOR: u8 = 0;
}

/// A parsed (or to-be-encoded) `ErrorResponse`/`NoticeResponse` body.
///
/// Fields preserve the order they were inserted so that [`Self::iter`]
/// round-trips onto the wire in the same order it was built or parsed in,
/// per §4.5 "Field order on the wire is the iteration order of the incoming
/// record".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticeFields {
    entries: Vec<(u8, String)>,
}

impl NoticeFields {
    /// An empty field set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a single `message` field — the plain-string convenience
    /// described in §4.5 ("a plain string, treated as `{message}`").
    pub fn from_message(message: impl Into<String>) -> Self {
        let mut fields = Self::new();
        fields.insert(tag::SEVERITY, "ERROR");
        fields.insert(tag::MESSAGE, message.into());
        fields
    }

    /// Insert or replace a field by tag. Unknown tags are accepted —
    /// the caller decides which tags are meaningful; the decoder drops
    /// unrecognized tags on parse (see [`crate::protocol::response::parse_notice_fields`]).
    pub fn insert(&mut self, field_tag: u8, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(t, _)| *t == field_tag) {
            entry.1 = value;
        } else {
            self.entries.push((field_tag, value));
        }
        self
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with(mut self, field_tag: u8, value: impl Into<String>) -> Self {
        self.insert(field_tag, value);
        self
    }

    /// Look up a field's value by tag.
    pub fn get(&self, field_tag: u8) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| *t == field_tag)
            .map(|(_, v)| v.as_str())
    }

    /// Severity: ERROR, FATAL, PANIC, WARNING, NOTICE, DEBUG, INFO, LOG.
    pub fn severity(&self) -> &str {
        self.get(tag::SEVERITY).unwrap_or("ERROR")
    }

    /// SQLSTATE error code, if present.
    pub fn code(&self) -> Option<&str> {
        self.get(tag::CODE)
    }

    /// Primary human-readable message, if present.
    pub fn message(&self) -> Option<&str> {
        self.get(tag::MESSAGE)
    }

    /// Iterate fields in insertion/wire order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> {
        self.entries.iter().map(|(t, v)| (*t, v.as_str()))
    }

    /// True if no fields are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for NoticeFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.severity())?;
        if let Some(code) = self.code() {
            write!(f, " ({code})")?;
        }
        if let Some(message) = self.message() {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl From<&str> for NoticeFields {
    fn from(message: &str) -> Self {
        Self::from_message(message)
    }
}

impl From<String> for NoticeFields {
    fn from(message: String) -> Self {
        Self::from_message(message)
    }
}

/// Any runtime error, pretty-printed into the `message` field (§4.5(b)): lets
/// `ResponseEncoder::error`/`notice` take a caller's own error value (e.g.
/// [`crate::Error`]) directly, without a manual `.to_string()` first.
impl<E: std::error::Error> From<E> for NoticeFields {
    fn from(err: E) -> Self {
        Self::from_message(err.to_string())
    }
}
