//! Data type representations for stored values.
//!
//! Each variant maps to a Redis-like data type. A key holds exactly one
//! variant; the store dispatches on the tag before calling the typed
//! operation.

pub mod quicklist;
pub mod set;
pub mod sorted_set;
pub mod string;

use bytes::Bytes;

use ahash::AHashMap;

pub use quicklist::QuickList;
pub use set::AdaptiveSet;
pub use sorted_set::SortedSet;
pub use string::StringBuf;

/// A stored value in the keyspace.
#[derive(Debug, Clone)]
pub enum Value {
    /// Binary-safe string with amortised append growth.
    String(StringBuf),

    /// Field → value mapping.
    Hash(AHashMap<String, Bytes>),

    /// Ordered list of binary-safe elements, stored as a chain of
    /// packed segments.
    List(QuickList),

    /// Unordered set of unique string members with an adaptive
    /// integer/hash-table encoding.
    Set(AdaptiveSet),

    /// Set of (member, score) pairs ordered by (score, member).
    SortedSet(SortedSet),
}

impl Value {
    /// Returns the type label, matching Redis TYPE command output.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Hash(_) => "hash",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::SortedSet(_) => "zset",
        }
    }

    /// Returns `true` for a drained collection that should be removed
    /// from the keyspace. Strings are never considered empty: an empty
    /// string is a live value.
    pub fn is_drained(&self) -> bool {
        match self {
            Value::String(_) => false,
            Value::Hash(map) => map.is_empty(),
            Value::List(list) => list.is_empty(),
            Value::Set(set) => set.is_empty(),
            Value::SortedSet(zset) => zset.is_empty(),
        }
    }
}

/// Converts Redis-style indices (supporting negative values) to a
/// clamped `(start, stop)` pair.
///
/// Negative indices count back from `len` (e.g. -1 = last element).
/// Out-of-bounds stop is clamped to `len - 1`; out-of-bounds negative
/// stop clamps to -1 so the caller sees `start > stop` (empty range).
/// Returns `(0, -1)` for empty collections.
pub fn normalize_range(start: i64, stop: i64, len: i64) -> (i64, i64) {
    if len == 0 {
        return (0, -1);
    }

    let s = if start < 0 {
        (len + start).max(0)
    } else {
        start
    };

    let e = if stop < 0 {
        (len + stop).max(-1)
    } else {
        stop.min(len - 1)
    };

    (s, e)
}
