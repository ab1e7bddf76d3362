//! Protocol error types.
//!
//! Command-level variants display the exact wire text, so the
//! dispatcher can forward `e.to_string()` inside an error frame
//! unchanged.

use thiserror::Error;

/// Errors from parsing the wire format or a command's arguments.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The input buffer doesn't contain a complete frame yet.
    /// The caller should read more data and try again.
    #[error("incomplete frame: need more data")]
    Incomplete,

    /// The first byte of a frame didn't match any known type prefix.
    #[error("invalid type prefix: {0:#04x}")]
    InvalidPrefix(u8),

    /// Failed to parse an integer from the frame header.
    #[error("invalid integer encoding")]
    InvalidInteger,

    /// A bulk string or array declared an invalid length.
    #[error("invalid frame length: {0}")]
    InvalidFrameLength(i64),

    /// A bulk string declared a length over the 512 MB cap.
    #[error("bulk string too large: {0} bytes")]
    BulkStringTooLarge(usize),

    /// An array declared more elements than the cap allows.
    #[error("too many elements: {0}")]
    TooManyElements(usize),

    /// Arrays nested beyond the depth cap.
    #[error("nesting too deep: limit {0}")]
    NestingTooDeep(usize),

    /// A structurally invalid command (non-array, empty, or an
    /// argument of the wrong frame kind).
    #[error("ERR {0}")]
    InvalidCommandFrame(String),

    /// Wrong argument count for a known command.
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    /// An argument failed integer coercion.
    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    /// An argument failed float coercion.
    #[error("ERR value is not a valid float")]
    NotFloat,

    /// A malformed argument combination.
    #[error("ERR syntax error")]
    Syntax,
}
