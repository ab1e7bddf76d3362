//! Slow command log.
//!
//! Records commands that exceed a latency threshold into a fixed-size
//! ring buffer. The buffer is behind a `Mutex`, but contention is
//! negligible since only slow commands (rare by definition) ever
//! acquire it.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::SlowLogConfig;

/// A single slow log entry.
#[derive(Debug, Clone)]
pub struct SlowLogEntry {
    /// Monotonically increasing entry id.
    pub id: u64,
    /// Unix timestamp (seconds) when the command ran.
    pub unix_secs: u64,
    /// How long the command took, in microseconds.
    pub duration_us: u64,
    /// Truncated command summary, e.g. "SET key value".
    pub command: String,
}

/// Longest command summary kept per entry.
const MAX_COMMAND_LEN: usize = 128;

/// Thread-safe slow command log backed by a ring buffer.
pub struct SlowLog {
    threshold: Duration,
    max_len: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    entries: VecDeque<SlowLogEntry>,
    next_id: u64,
}

impl SlowLog {
    pub fn new(config: SlowLogConfig) -> Self {
        Self {
            threshold: Duration::from_micros(config.slower_than_us),
            max_len: config.max_len,
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(config.max_len),
                next_id: 0,
            }),
        }
    }

    /// Records a command if it exceeded the threshold. Called from the
    /// connection handler after each command completes.
    pub fn maybe_record(&self, duration: Duration, command: &str) {
        if duration < self.threshold {
            return;
        }

        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        if inner.entries.len() >= self.max_len {
            inner.entries.pop_front();
        }

        let mut command = command.to_owned();
        if command.len() > MAX_COMMAND_LEN {
            command.truncate(MAX_COMMAND_LEN);
        }

        inner.entries.push_back(SlowLogEntry {
            id,
            unix_secs: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            duration_us: duration.as_micros() as u64,
            command,
        });
    }

    /// Returns the most recent entries, newest first.
    pub fn get(&self, count: Option<usize>) -> Vec<SlowLogEntry> {
        let inner = self.lock();
        let n = count.unwrap_or(inner.entries.len()).min(inner.entries.len());
        inner.entries.iter().rev().take(n).cloned().collect()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Clears all entries.
    pub fn reset(&self) {
        self.lock().entries.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
