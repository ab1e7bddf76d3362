//! cinder-server: the TCP front end.
//!
//! Wires the keyspace engine, wire codec, and snapshot engine into a
//! running server: configuration, the connection lifecycle, command
//! dispatch, the slow log and monitor feed, and the background sweep
//! and snapshot tasks. The binary in `main.rs` adds CLI parsing and
//! signal handling on top.

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod monitor;
pub mod server;
pub mod slowlog;

pub use config::Config;
pub use server::{AppState, Server, ServerError};
