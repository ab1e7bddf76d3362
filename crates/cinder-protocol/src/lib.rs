//! cinder-protocol: the RESP wire codec.
//!
//! Frames are length-prefixed text with five kinds (simple string,
//! error, integer, bulk string, array), each line terminated by
//! `\r\n`. Commands arrive as arrays of bulk strings; replies may be
//! any kind. Parsing is a single zero-copy pass; serialization writes
//! straight into the output buffer.

pub mod command;
pub mod error;
pub mod parse;
pub mod serialize;
pub mod types;

pub use command::{Command, SetExpire, SlowLogSub};
pub use error::ProtocolError;
pub use parse::parse_frame;
pub use types::Frame;
