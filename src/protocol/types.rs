//! Common PostgreSQL wire protocol types shared across commands and responses.

/// PostgreSQL Object Identifier (OID).
pub type Oid = u32;

/// Data format code carried per-value in `Bind` and per-field in
/// `RowDescription` (§3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum FormatCode {
    /// Text format (human-readable).
    #[default]
    Text = 0,
    /// Binary format (type-specific packed representation).
    ///
    /// Decoding binary-mode result *values* is out of scope (§1 Non-goals);
    /// the format code itself is still represented so framing and passthrough
    /// stay byte-accurate.
    Binary = 1,
}

impl FormatCode {
    /// Build from a raw wire value; anything other than `0`/`1` is treated
    /// as `Text`, matching the source's compatibility relaxation.
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => FormatCode::Binary,
            _ => FormatCode::Text,
        }
    }
}

impl From<u16> for FormatCode {
    fn from(value: u16) -> Self {
        Self::from_u16(value)
    }
}

/// Transaction status byte carried by `ReadyForQuery` (§3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TransactionStatus {
    /// Idle (not in a transaction block).
    #[default]
    Idle = b'I',
    /// Inside an open transaction block.
    InTransaction = b'T',
    /// Inside a failed transaction block (queries rejected until rollback).
    Failed = b'E',
}

impl TransactionStatus {
    /// Parse a status byte off the wire.
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            b'I' => Some(TransactionStatus::Idle),
            b'T' => Some(TransactionStatus::InTransaction),
            b'E' => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    /// The raw wire byte for this status.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A handful of well-known type OIDs, useful when hand-building
/// `RowDescription`s for an emulator or honeypot. Not an exhaustive catalog —
/// SQL type resolution is an external collaborator's concern (§1).
pub mod oid {
    use super::Oid;

    pub const BOOL: Oid = 16;
    pub const BYTEA: Oid = 17;
    pub const CHAR: Oid = 18;
    pub const NAME: Oid = 19;
    pub const INT8: Oid = 20;
    pub const INT2: Oid = 21;
    pub const INT4: Oid = 23;
    pub const TEXT: Oid = 25;
    pub const OID: Oid = 26;
    pub const JSON: Oid = 114;
    pub const FLOAT4: Oid = 700;
    pub const FLOAT8: Oid = 701;
    pub const UNKNOWN: Oid = 705;
    pub const BPCHAR: Oid = 1042;
    pub const VARCHAR: Oid = 1043;
    pub const DATE: Oid = 1082;
    pub const TIME: Oid = 1083;
    pub const TIMESTAMP: Oid = 1114;
    pub const TIMESTAMPTZ: Oid = 1184;
    pub const NUMERIC: Oid = 1700;
    pub const UUID: Oid = 2950;
    pub const JSONB: Oid = 3802;
}
