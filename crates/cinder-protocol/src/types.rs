//! RESP frame types.
//!
//! The [`Frame`] enum represents a single parsed RESP value. Bulk
//! strings use `Bytes` for cheap, reference-counted storage that
//! avoids copies when moving data through the pipeline.

use bytes::Bytes;

/// A single RESP protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Simple string response, e.g. `+OK\r\n`. Short, non-binary
    /// status replies.
    Simple(String),

    /// Error response, e.g. `-ERR unknown command\r\n`.
    Error(String),

    /// 64-bit signed integer, e.g. `:42\r\n`.
    Integer(i64),

    /// Bulk (binary-safe) string, e.g. `$5\r\nhello\r\n`.
    Bulk(Bytes),

    /// Ordered array of frames, e.g. `*2\r\n+hello\r\n+world\r\n`.
    Array(Vec<Frame>),

    /// Nil bulk string, `$-1\r\n`.
    Null,

    /// Nil array, `*-1\r\n`.
    NullArray,
}

impl Frame {
    /// Returns `true` for either nil form.
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Null | Frame::NullArray)
    }

    /// Builds a bulk-string frame from anything byte-like.
    pub fn bulk(data: impl Into<Bytes>) -> Frame {
        Frame::Bulk(data.into())
    }

    /// Builds an array of bulk strings, the shape commands take on
    /// the wire.
    pub fn command(tokens: &[impl AsRef<[u8]>]) -> Frame {
        Frame::Array(
            tokens
                .iter()
                .map(|t| Frame::Bulk(Bytes::copy_from_slice(t.as_ref())))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_equality() {
        assert_eq!(Frame::Simple("OK".into()), Frame::Simple("OK".into()));
        assert_ne!(Frame::Simple("OK".into()), Frame::Simple("ERR".into()));
        assert_eq!(Frame::Integer(42), Frame::Integer(42));
        assert_eq!(Frame::Null, Frame::Null);
        assert_ne!(Frame::Null, Frame::NullArray);
    }

    #[test]
    fn is_null_covers_both_nils() {
        assert!(Frame::Null.is_null());
        assert!(Frame::NullArray.is_null());
        assert!(!Frame::Integer(0).is_null());
        assert!(!Frame::Bulk(Bytes::new()).is_null());
    }

    #[test]
    fn command_builds_bulk_array() {
        let frame = Frame::command(&["GET", "key"]);
        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::Bulk(Bytes::from_static(b"GET")),
                Frame::Bulk(Bytes::from_static(b"key")),
            ])
        );
    }
}
