//! Per-connection handler.
//!
//! Reads frames from the TCP stream, routes them through the
//! dispatcher, and writes replies back. Pipelining is supported by
//! draining every complete frame from a read before flushing a single
//! batched write; a reply is always written before the next frame is
//! read. A connection that issues MONITOR stops executing commands
//! and streams the command feed instead.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use cinder_protocol::{parse_frame, Command, Frame};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::dispatch::{self, Outcome, Session};
use crate::server::AppState;

/// Initial read buffer capacity; covers typical commands without
/// over-allocating for PING/GET workloads.
const BUF_CAPACITY: usize = 4096;

/// Maximum read buffer size before the client is disconnected, so an
/// endless incomplete frame can't consume unbounded memory.
const MAX_BUF_SIZE: usize = 64 * 1024 * 1024;

/// Idle time after which an abandoned connection is closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Drives a single client connection to completion.
pub async fn handle(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    state.clients.fetch_add(1, Ordering::SeqCst);
    let result = drive(&mut stream, peer, &state).await;
    state.clients.fetch_sub(1, Ordering::SeqCst);
    result
}

async fn drive(
    stream: &mut TcpStream,
    peer: SocketAddr,
    state: &AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut buf = BytesMut::with_capacity(BUF_CAPACITY);
    let mut out = BytesMut::with_capacity(BUF_CAPACITY);
    let mut session = Session::new();

    loop {
        if buf.len() > MAX_BUF_SIZE {
            let mut err = BytesMut::new();
            Frame::Error("ERR max buffer size exceeded, closing connection".into())
                .serialize(&mut err);
            let _ = stream.write_all(&err).await;
            return Ok(());
        }

        // returns 0 on clean disconnect; times out to reclaim
        // abandoned connections
        match tokio::time::timeout(IDLE_TIMEOUT, stream.read_buf(&mut buf)).await {
            Ok(Ok(0)) => return Ok(()),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                debug!("closing idle connection from {peer}");
                return Ok(());
            }
        }

        // drain every complete frame in the buffer (pipelining),
        // batching the replies into one write
        out.clear();
        loop {
            match parse_frame(&buf) {
                Ok(Some((frame, consumed))) => {
                    let _ = buf.split_to(consumed);

                    let tokens = frame_tokens(&frame);
                    let started = Instant::now();
                    let outcome = match Command::from_frame(frame) {
                        Ok(cmd) => dispatch::execute(cmd, state, &mut session),
                        Err(e) => Outcome::Reply(Frame::Error(e.to_string())),
                    };

                    if !tokens.is_empty() {
                        state
                            .slowlog
                            .maybe_record(started.elapsed(), &tokens.join(" "));
                        state.monitor.publish(session.db, peer, &tokens);
                    }

                    match outcome {
                        Outcome::Reply(frame) => frame.serialize(&mut out),
                        Outcome::Monitor => {
                            // subscribe before acknowledging, so no
                            // command published after the +OK is missed
                            let feed = state.monitor.subscribe();
                            Frame::Simple("OK".into()).serialize(&mut out);
                            stream.write_all(&out).await?;
                            return monitor_loop(stream, feed).await;
                        }
                    }
                }
                Ok(None) => break, // need more data
                Err(e) => {
                    let mut err = BytesMut::new();
                    Frame::Error(format!("ERR Protocol error: {e}")).serialize(&mut err);
                    stream.write_all(&err).await?;
                    return Ok(());
                }
            }
        }

        if !out.is_empty() {
            stream.write_all(&out).await?;
        }
    }
}

/// Streams the command feed to a MONITOR connection until it
/// disconnects.
async fn monitor_loop(
    stream: &mut TcpStream,
    mut feed: crate::monitor::MonitorHandle<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (mut reader, mut writer) = stream.split();
    let mut discard = [0u8; 512];

    loop {
        tokio::select! {
            line = feed.recv() => {
                match line {
                    Some(line) => {
                        let mut out = BytesMut::new();
                        Frame::Simple(line).serialize(&mut out);
                        writer.write_all(&out).await?;
                    }
                    None => return Ok(()),
                }
            }
            read = reader.read(&mut discard) => {
                match read {
                    // any input from a monitor is ignored; 0 = closed
                    Ok(0) => return Ok(()),
                    Ok(_) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
}

/// Flattens a command frame into display tokens for the slow log and
/// the monitor feed.
fn frame_tokens(frame: &Frame) -> Vec<String> {
    let Frame::Array(items) = frame else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| match item {
            Frame::Bulk(data) => String::from_utf8_lossy(data).into_owned(),
            Frame::Simple(s) => s.clone(),
            other => format!("{other:?}"),
        })
        .collect()
}
