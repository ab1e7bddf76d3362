//! Command feed for MONITOR.
//!
//! Every executed command is published as a formatted line on a
//! broadcast channel; connections that issued MONITOR subscribe and
//! stream the lines until they disconnect. Publishing is a no-op when
//! nobody is watching.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;

/// Lines buffered per monitor before a slow consumer starts losing
/// messages.
const FEED_CAPACITY: usize = 1024;

/// The shared feed side.
pub struct MonitorFeed {
    tx: broadcast::Sender<String>,
    watchers: AtomicUsize,
}

impl MonitorFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            tx,
            watchers: AtomicUsize::new(0),
        }
    }

    /// Subscribes a new monitor connection.
    pub fn subscribe(&self) -> MonitorHandle<'_> {
        self.watchers.fetch_add(1, Ordering::SeqCst);
        MonitorHandle {
            feed: self,
            rx: self.tx.subscribe(),
        }
    }

    /// Publishes an executed command. Skipped entirely when no
    /// monitor is attached.
    pub fn publish(&self, db: usize, peer: SocketAddr, tokens: &[String]) {
        if self.watchers.load(Ordering::SeqCst) == 0 {
            return;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let mut line = format!("{}.{:06} [{db} {peer}]", now.as_secs(), now.subsec_micros());
        for token in tokens {
            line.push_str(" \"");
            line.push_str(token);
            line.push('"');
        }
        let _ = self.tx.send(line);
    }
}

impl Default for MonitorFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscribed monitor; decrements the watcher count on drop.
pub struct MonitorHandle<'a> {
    feed: &'a MonitorFeed,
    rx: broadcast::Receiver<String>,
}

impl MonitorHandle<'_> {
    /// Receives the next command line. `None` when the feed lags past
    /// the buffer (the monitor silently resumes with newer entries).
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(line) => return Some(line),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for MonitorHandle<'_> {
    fn drop(&mut self) {
        self.feed.watchers.fetch_sub(1, Ordering::SeqCst);
    }
}
