//! Errors returned by keyspace operations.
//!
//! The display strings are the stable wire texts: the dispatcher
//! forwards them verbatim inside RESP error frames.

use thiserror::Error;

/// Errors that can occur during keyspace operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Operation against a key holding an incompatible kind of value.
    /// Never mutates state.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// An argument failed integer coercion.
    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    /// An argument failed float coercion.
    #[error("ERR value is not a valid float")]
    NotFloat,

    /// A list index fell outside the list bounds.
    #[error("ERR index out of range")]
    IndexOutOfRange,

    /// The target key does not exist and the command treats that as an
    /// error rather than nil.
    #[error("ERR no such key")]
    NoSuchKey,

    /// SELECT with a database index outside the configured range.
    #[error("ERR DB index is out of range")]
    DbIndexOutOfRange,
}
