//! cinder-persistence: the snapshot engine.
//!
//! Persists the keyspace as a single checksummed file: a 4-byte
//! little-endian CRC32 followed by a gzip-compressed record stream.
//! Saves are incremental (dirty keys only) and atomic (written to a
//! temp file, then renamed over the target). Loads verify the
//! checksum before touching in-memory state.

pub mod format;
pub mod snapshot;

pub use format::SnapshotError;
pub use snapshot::{SnapRecord, Snapshotter, SnapshotConfig};
