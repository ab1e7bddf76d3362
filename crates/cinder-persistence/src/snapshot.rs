//! Snapshot save and load.
//!
//! File layout: `[crc32: u32 LE][gzip-compressed body]`. The body is a
//! record stream:
//!
//! ```text
//! [CSNP magic: 4B][version: 1B]
//! [0x01][db: u16][key][kind: 1B][payload][expire_ms: i64]   repeated
//! [0xFF]                                                    end marker
//! ```
//!
//! Kind tags: 0 string, 1 hash, 2 list, 3 set, 4 sorted set.
//! `expire_ms` is the remaining TTL in milliseconds, -1 for none.
//!
//! Saves are incremental (only keys dirtied since the last save are
//! written) and atomic: the file is built at `<filename>.temp` and
//! renamed over the target, so a crashed save never corrupts the
//! previous snapshot. A save takes a read view of each database in
//! turn; writes racing the scan may or may not be captured, which is
//! the documented persistence trade-off.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ahash::AHashMap;
use bytes::Bytes;
use cinder_core::types::{AdaptiveSet, QuickList, SortedSet, StringBuf};
use cinder_core::{Store, Value};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, error, info};

use crate::format::{self, SnapshotError};

const KIND_STRING: u8 = 0;
const KIND_HASH: u8 = 1;
const KIND_LIST: u8 = 2;
const KIND_SET: u8 = 3;
const KIND_ZSET: u8 = 4;

const RECORD_TAG: u8 = 0x01;
const END_TAG: u8 = 0xFF;

/// Snapshot engine configuration.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Target snapshot file.
    pub filename: PathBuf,
    /// Interval between scheduled saves.
    pub save_interval: Duration,
    /// gzip level, 0-9.
    pub compression_level: u32,
    /// Trigger a save once this many writes have accumulated.
    /// 0 disables the change-count trigger.
    pub auto_save_changes: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            filename: PathBuf::from("dump.rdb"),
            save_interval: Duration::from_secs(5 * 60),
            compression_level: 6,
            auto_save_changes: 1000,
        }
    }
}

/// One persisted key.
#[derive(Debug, Clone)]
pub struct SnapRecord {
    pub db: u16,
    pub key: String,
    pub value: Value,
    /// Remaining TTL in milliseconds, -1 for no expiration.
    pub expire_ms: i64,
}

/// The snapshot engine: owns the file, the in-progress gate, and the
/// save bookkeeping.
pub struct Snapshotter {
    config: SnapshotConfig,
    store: Arc<Store>,
    saving: AtomicBool,
    /// Unix seconds of the last successful save; 0 = never.
    last_save_unix: AtomicU64,
    /// Store change counter at the last successful save, for the
    /// change-count trigger.
    changes_at_last_save: AtomicU64,
}

/// Releases the in-progress gate when a save path exits.
struct SaveGate<'a>(&'a AtomicBool);

impl Drop for SaveGate<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Snapshotter {
    /// Creates a snapshot engine for the given store.
    pub fn new(store: Arc<Store>, config: SnapshotConfig) -> Self {
        Self {
            config,
            store,
            saving: AtomicBool::new(false),
            last_save_unix: AtomicU64::new(0),
            changes_at_last_save: AtomicU64::new(0),
        }
    }

    /// The configured snapshot path.
    pub fn filename(&self) -> &Path {
        &self.config.filename
    }

    /// The configured scheduled-save interval.
    pub fn save_interval(&self) -> Duration {
        self.config.save_interval
    }

    /// Unix timestamp (seconds) of the last successful save, 0 if no
    /// save has completed yet.
    pub fn last_save_unix(&self) -> u64 {
        self.last_save_unix.load(Ordering::SeqCst)
    }

    /// Returns `true` when enough writes have accumulated since the
    /// last save to trip the change-count trigger.
    pub fn should_auto_save(&self) -> bool {
        if self.config.auto_save_changes == 0 {
            return false;
        }
        let since = self
            .store
            .changes()
            .saturating_sub(self.changes_at_last_save.load(Ordering::SeqCst));
        since >= self.config.auto_save_changes && self.store.dirty_len() > 0
    }

    /// Synchronous incremental save. Fails with `SaveInProgress` when
    /// a background save is running. Returns the number of keys
    /// written (0 = nothing dirty, no file touched).
    pub fn save(&self) -> Result<usize, SnapshotError> {
        if self
            .saving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SnapshotError::SaveInProgress);
        }
        let _gate = SaveGate(&self.saving);
        self.save_incremental()
    }

    /// Full save: writes every live key rather than just the dirty
    /// set. Used for the final save on shutdown.
    pub fn save_all(&self) -> Result<usize, SnapshotError> {
        if self
            .saving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SnapshotError::SaveInProgress);
        }
        let _gate = SaveGate(&self.saving);

        let records = to_records(self.store.collect_all());
        self.write_file(&records)?;
        self.store.clear_all_dirty();
        self.mark_saved();
        info!(keys = records.len(), "full snapshot saved");
        Ok(records.len())
    }

    /// Kicks off an incremental save on a background thread. Fails
    /// immediately with `SaveInProgress` when one is already running;
    /// a failed background save is logged, never fatal.
    pub fn background_save(self: &Arc<Self>) -> Result<(), SnapshotError> {
        if self
            .saving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SnapshotError::SaveInProgress);
        }

        let this = Arc::clone(self);
        std::thread::spawn(move || {
            let _gate = SaveGate(&this.saving);
            match this.save_incremental() {
                Ok(count) => debug!(keys = count, "background snapshot complete"),
                Err(e) => error!("background snapshot failed: {e}"),
            }
        });
        Ok(())
    }

    /// Loads the snapshot file, replacing all in-memory state.
    /// Returns the number of keys restored.
    pub fn load(&self) -> Result<usize, SnapshotError> {
        let records = read_snapshot_file(&self.config.filename)?;
        self.store.flushall();
        let count = records.len();
        for record in records {
            let expire = if record.expire_ms >= 0 {
                Some(record.expire_ms as u64)
            } else {
                None
            };
            self.store
                .restore(record.db as usize, record.key, record.value, expire)
                .map_err(|e| {
                    SnapshotError::InvalidData(format!("database index out of range: {e}"))
                })?;
        }
        info!(keys = count, "snapshot loaded");
        Ok(count)
    }

    /// The incremental save body; the caller holds the gate.
    fn save_incremental(&self) -> Result<usize, SnapshotError> {
        let records = to_records(self.store.collect_dirty());
        if records.is_empty() {
            debug!("no changes since last save, skipping snapshot");
            return Ok(0);
        }

        self.write_file(&records)?;

        let saved: Vec<(u16, String)> = records
            .iter()
            .map(|record| (record.db, record.key.clone()))
            .collect();
        self.store.clear_dirty(&saved);
        self.mark_saved();
        info!(keys = records.len(), "incremental snapshot saved");
        Ok(records.len())
    }

    fn write_file(&self, records: &[SnapRecord]) -> Result<(), SnapshotError> {
        write_snapshot_file(&self.config.filename, records, self.config.compression_level)
    }

    fn mark_saved(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.last_save_unix.store(now, Ordering::SeqCst);
        self.changes_at_last_save
            .store(self.store.changes(), Ordering::SeqCst);
    }
}

fn to_records(entries: Vec<(u16, String, Value, Option<u64>)>) -> Vec<SnapRecord> {
    entries
        .into_iter()
        .map(|(db, key, value, remaining)| SnapRecord {
            db,
            key,
            value,
            expire_ms: remaining.map(|ms| ms as i64).unwrap_or(-1),
        })
        .collect()
}

/// Encodes and writes a snapshot file atomically.
pub fn write_snapshot_file(
    path: &Path,
    records: &[SnapRecord],
    compression_level: u32,
) -> Result<(), SnapshotError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(compression_level.min(9)));
    format::write_header(&mut encoder)?;
    for record in records {
        write_record(&mut encoder, record)?;
    }
    format::write_u8(&mut encoder, END_TAG)?;
    let compressed = encoder.finish()?;

    let checksum = format::crc32(&compressed);

    let tmp_path = temp_path(path);
    let result = (|| -> Result<(), SnapshotError> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&checksum.to_le_bytes())?;
        file.write_all(&compressed)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        // best-effort cleanup of the incomplete temp file
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Reads and decodes a snapshot file, verifying the checksum first.
pub fn read_snapshot_file(path: &Path) -> Result<Vec<SnapRecord>, SnapshotError> {
    let data = fs::read(path)?;
    if data.len() < 4 {
        return Err(SnapshotError::UnexpectedEof);
    }
    let stored = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let body = &data[4..];
    format::verify_crc32(body, stored)?;

    let mut decoder = GzDecoder::new(body);
    format::read_header(&mut decoder)?;

    let mut records = Vec::new();
    loop {
        match format::read_u8(&mut decoder)? {
            END_TAG => break,
            RECORD_TAG => records.push(read_record(&mut decoder)?),
            other => return Err(SnapshotError::UnknownTag(other)),
        }
    }
    Ok(records)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".temp");
    PathBuf::from(os)
}

fn write_record(w: &mut impl Write, record: &SnapRecord) -> Result<(), SnapshotError> {
    format::write_u8(w, RECORD_TAG)?;
    format::write_u16(w, record.db)?;
    format::write_bytes(w, record.key.as_bytes())?;
    write_value(w, &record.value)?;
    format::write_i64(w, record.expire_ms)?;
    Ok(())
}

fn write_value(w: &mut impl Write, value: &Value) -> Result<(), SnapshotError> {
    match value {
        Value::String(s) => {
            format::write_u8(w, KIND_STRING)?;
            format::write_bytes(w, s.as_bytes())?;
        }
        Value::Hash(map) => {
            format::write_u8(w, KIND_HASH)?;
            format::write_u32(w, map.len() as u32)?;
            for (field, value) in map {
                format::write_bytes(w, field.as_bytes())?;
                format::write_bytes(w, value)?;
            }
        }
        Value::List(list) => {
            format::write_u8(w, KIND_LIST)?;
            format::write_u32(w, list.len() as u32)?;
            for item in list.iter() {
                format::write_bytes(w, &item)?;
            }
        }
        Value::Set(set) => {
            format::write_u8(w, KIND_SET)?;
            let members = set.members();
            format::write_u32(w, members.len() as u32)?;
            for member in members {
                format::write_bytes(w, member.as_bytes())?;
            }
        }
        Value::SortedSet(zset) => {
            format::write_u8(w, KIND_ZSET)?;
            format::write_u32(w, zset.len() as u32)?;
            for (member, score) in zset.iter() {
                format::write_f64(w, score)?;
                format::write_bytes(w, member.as_bytes())?;
            }
        }
    }
    Ok(())
}

fn read_record(r: &mut impl Read) -> Result<SnapRecord, SnapshotError> {
    let db = format::read_u16(r)?;
    let key = format::read_string(r)?;
    let value = read_value(r)?;
    let expire_ms = format::read_i64(r)?;
    Ok(SnapRecord {
        db,
        key,
        value,
        expire_ms,
    })
}

fn read_value(r: &mut impl Read) -> Result<Value, SnapshotError> {
    match format::read_u8(r)? {
        KIND_STRING => {
            let data = format::read_bytes(r)?;
            Ok(Value::String(StringBuf::from_bytes(&data)))
        }
        KIND_HASH => {
            let count = format::read_u32(r)?;
            format::validate_collection_count(count, "hash field")?;
            let mut map = AHashMap::with_capacity(format::capped_capacity(count));
            for _ in 0..count {
                let field = format::read_string(r)?;
                let value = format::read_bytes(r)?;
                map.insert(field, Bytes::from(value));
            }
            Ok(Value::Hash(map))
        }
        KIND_LIST => {
            let count = format::read_u32(r)?;
            format::validate_collection_count(count, "list element")?;
            let mut list = QuickList::new();
            for _ in 0..count {
                let item = format::read_bytes(r)?;
                list.push_back(&item);
            }
            Ok(Value::List(list))
        }
        KIND_SET => {
            let count = format::read_u32(r)?;
            format::validate_collection_count(count, "set member")?;
            let mut set = AdaptiveSet::new();
            for _ in 0..count {
                let member = format::read_string(r)?;
                set.add(&member);
            }
            Ok(Value::Set(set))
        }
        KIND_ZSET => {
            let count = format::read_u32(r)?;
            format::validate_collection_count(count, "sorted set member")?;
            let mut zset = SortedSet::new();
            for _ in 0..count {
                let score = format::read_f64(r)?;
                let member = format::read_string(r)?;
                zset.insert(&member, score);
            }
            Ok(Value::SortedSet(zset))
        }
        other => Err(SnapshotError::UnknownTag(other)),
    }
}
