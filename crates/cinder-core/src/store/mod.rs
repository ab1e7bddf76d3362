//! The multi-database keyspace.
//!
//! A [`Store`] owns a fixed, ordered sequence of databases. Each
//! database is an independent keyspace: one entries map keyed by name
//! (a key holds exactly one typed value), an expiry map of absolute
//! deadlines, and the set of keys dirtied since the last snapshot, all
//! guarded together by a single reader-writer lock.
//!
//! Every operation takes the database index; which database a client
//! talks to is per-connection state kept by the server. Expired keys
//! are reaped lazily on access: command operations go through the
//! write guard since any access may delete a stale key, while the
//! snapshot engine and KEYS use the read guard and merely skip expired
//! entries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ahash::{AHashMap, AHashSet};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::StoreError;
use crate::glob::GlobPattern;
use crate::time;
use crate::types::Value;

mod hash;
mod list;
mod set;
mod string;
mod zset;

/// Default number of databases a server holds.
pub const DEFAULT_DATABASES: usize = 16;

/// Store construction parameters.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How many databases to create.
    pub databases: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            databases: DEFAULT_DATABASES,
        }
    }
}

/// Result of a TTL query, matching Redis semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TtlResult {
    /// Key exists and has a deadline. Remaining whole seconds,
    /// rounded up.
    Seconds(u64),
    /// Key exists without a deadline (wire value -1).
    NoExpiry,
    /// Key does not exist (wire value -2).
    NotFound,
}

/// One independent keyspace.
pub(crate) struct Database {
    pub(crate) entries: AHashMap<Box<str>, Value>,
    /// Absolute monotonic deadline in ms. Every key here also exists
    /// in `entries`; the reverse need not hold.
    pub(crate) expiry: AHashMap<Box<str>, u64>,
    /// Keys written since the last successful snapshot.
    pub(crate) dirty: AHashSet<Box<str>>,
}

impl Database {
    fn new() -> Self {
        Self {
            entries: AHashMap::new(),
            expiry: AHashMap::new(),
            dirty: AHashSet::new(),
        }
    }

    /// Returns `true` if the key has a deadline that has passed.
    pub(crate) fn is_key_expired(&self, key: &str) -> bool {
        self.expiry.get(key).is_some_and(|&d| time::is_expired(d))
    }

    /// Reaps the key if its deadline has passed. Returns `true` if the
    /// key was removed (the caller then treats it as absent).
    pub(crate) fn remove_if_expired(&mut self, key: &str) -> bool {
        if self.is_key_expired(key) {
            self.entries.remove(key);
            self.expiry.remove(key);
            true
        } else {
            false
        }
    }

    pub(crate) fn mark_dirty(&mut self, key: &str) {
        self.dirty.insert(Box::from(key));
    }

    /// Removes a key from every map. Returns `true` if it existed.
    fn remove_key(&mut self, key: &str) -> bool {
        let existed = self.entries.remove(key).is_some();
        self.expiry.remove(key);
        existed
    }

    /// Drops the key when its collection value has been drained to
    /// empty. Must be called after a removal-style mutation.
    pub(crate) fn drop_if_drained(&mut self, key: &str) {
        if self.entries.get(key).is_some_and(Value::is_drained) {
            self.remove_key(key);
        }
    }
}

/// The multi-database store shared by all connections.
pub struct Store {
    dbs: Vec<RwLock<Database>>,
    /// Cumulative count of write operations, read by the snapshot
    /// scheduler's change-count trigger.
    changes: AtomicU64,
}

impl Store {
    /// Creates a store with the default database count.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        let count = config.databases.max(1);
        Self {
            dbs: (0..count).map(|_| RwLock::new(Database::new())).collect(),
            changes: AtomicU64::new(0),
        }
    }

    /// Returns the number of databases.
    pub fn database_count(&self) -> usize {
        self.dbs.len()
    }

    /// Validates a database index for SELECT.
    pub fn select(&self, index: usize) -> Result<(), StoreError> {
        if index < self.dbs.len() {
            Ok(())
        } else {
            Err(StoreError::DbIndexOutOfRange)
        }
    }

    /// Cumulative write count since startup.
    pub fn changes(&self) -> u64 {
        self.changes.load(Ordering::Relaxed)
    }

    pub(crate) fn write(
        &self,
        index: usize,
    ) -> Result<RwLockWriteGuard<'_, Database>, StoreError> {
        self.dbs
            .get(index)
            .map(RwLock::write)
            .ok_or(StoreError::DbIndexOutOfRange)
    }

    pub(crate) fn read(&self, index: usize) -> Result<RwLockReadGuard<'_, Database>, StoreError> {
        self.dbs
            .get(index)
            .map(RwLock::read)
            .ok_or(StoreError::DbIndexOutOfRange)
    }

    pub(crate) fn touch_write(&self) {
        self.changes.fetch_add(1, Ordering::Relaxed);
    }

    // ------------------------------------------------------------------
    // keys family
    // ------------------------------------------------------------------

    /// Returns `true` if the key exists and hasn't expired.
    pub fn exists(&self, db: usize, key: &str) -> Result<bool, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(false);
        }
        Ok(guard.entries.contains_key(key))
    }

    /// Removes a key. Returns `true` if it existed (and wasn't expired).
    pub fn del(&self, db: usize, key: &str) -> Result<bool, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(false);
        }
        if guard.remove_key(key) {
            guard.mark_dirty(key);
            drop(guard);
            self.touch_write();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Returns the type label of the value at `key`, or `None` when
    /// the key is absent.
    pub fn key_type(&self, db: usize, key: &str) -> Result<Option<&'static str>, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(None);
        }
        Ok(guard.entries.get(key).map(Value::type_name))
    }

    /// Returns all live keys matching a glob pattern.
    ///
    /// O(n) scan of the whole database; fine for admin use, costly on
    /// large keyspaces.
    pub fn keys(&self, db: usize, pattern: &str) -> Result<Vec<String>, StoreError> {
        let guard = self.read(db)?;
        let compiled = GlobPattern::new(pattern);
        Ok(guard
            .entries
            .keys()
            .filter(|key| !guard.is_key_expired(key))
            .filter(|key| compiled.matches(key))
            .map(|key| String::from(&**key))
            .collect())
    }

    /// Sets or clears the deadline on an existing key.
    ///
    /// A non-positive duration clears any existing deadline. Returns
    /// `false` when the key doesn't exist.
    pub fn expire(&self, db: usize, key: &str, seconds: i64) -> Result<bool, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(false);
        }
        if !guard.entries.contains_key(key) {
            return Ok(false);
        }
        if seconds <= 0 {
            guard.expiry.remove(key);
        } else {
            let deadline = time::deadline_after(Duration::from_secs(seconds as u64));
            guard.expiry.insert(Box::from(key), deadline);
        }
        guard.mark_dirty(key);
        drop(guard);
        self.touch_write();
        Ok(true)
    }

    /// Returns the TTL status for a key.
    pub fn ttl(&self, db: usize, key: &str) -> Result<TtlResult, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(TtlResult::NotFound);
        }
        if !guard.entries.contains_key(key) {
            return Ok(TtlResult::NotFound);
        }
        Ok(match guard.expiry.get(key) {
            Some(&deadline) => TtlResult::Seconds(time::remaining_secs(deadline)),
            None => TtlResult::NoExpiry,
        })
    }

    /// Number of live keys in one database.
    pub fn dbsize(&self, db: usize) -> Result<usize, StoreError> {
        let guard = self.read(db)?;
        Ok(guard
            .entries
            .keys()
            .filter(|key| !guard.is_key_expired(key))
            .count())
    }

    /// Removes every key from one database.
    pub fn flushdb(&self, db: usize) -> Result<(), StoreError> {
        let mut guard = self.write(db)?;
        guard.entries.clear();
        guard.expiry.clear();
        guard.dirty.clear();
        Ok(())
    }

    /// Removes every key from every database.
    pub fn flushall(&self) {
        for db in &self.dbs {
            let mut guard = db.write();
            guard.entries.clear();
            guard.expiry.clear();
            guard.dirty.clear();
        }
    }

    // ------------------------------------------------------------------
    // snapshot support
    // ------------------------------------------------------------------

    /// Total number of dirty keys across all databases.
    pub fn dirty_len(&self) -> usize {
        self.dbs.iter().map(|db| db.read().dirty.len()).sum()
    }

    /// Clones the current value and remaining TTL of every dirty key.
    ///
    /// Databases are visited one at a time under their read lock; a
    /// dirty key that has since been deleted or expired is skipped.
    /// Readers may observe writes interleaved with the scan; snapshot
    /// persistence is documented as non-linearizable.
    pub fn collect_dirty(&self) -> Vec<(u16, String, Value, Option<u64>)> {
        self.collect(true)
    }

    /// Clones every live entry in every database (full snapshot).
    pub fn collect_all(&self) -> Vec<(u16, String, Value, Option<u64>)> {
        self.collect(false)
    }

    fn collect(&self, dirty_only: bool) -> Vec<(u16, String, Value, Option<u64>)> {
        let mut records = Vec::new();
        for (index, db) in self.dbs.iter().enumerate() {
            let guard = db.read();
            let keys: Vec<&str> = if dirty_only {
                guard.dirty.iter().map(|k| &**k).collect()
            } else {
                guard.entries.keys().map(|k| &**k).collect()
            };
            for key in keys {
                if guard.is_key_expired(key) {
                    continue;
                }
                let Some(value) = guard.entries.get(key) else {
                    continue;
                };
                let remaining = guard.expiry.get(key).map(|&d| time::remaining_ms(d));
                records.push((index as u16, key.to_owned(), value.clone(), remaining));
            }
        }
        records
    }

    /// Clears dirtiness for the given keys after a successful save.
    ///
    /// Keys written again while the save was running are deliberately
    /// cleared too; the next save picks up their latest value anyway.
    pub fn clear_dirty(&self, saved: &[(u16, String)]) {
        for (db_index, key) in saved {
            if let Some(db) = self.dbs.get(*db_index as usize) {
                db.write().dirty.remove(key.as_str());
            }
        }
    }

    /// Clears every database's dirty set, after a full save captured
    /// the whole keyspace.
    pub fn clear_all_dirty(&self) {
        for db in &self.dbs {
            db.write().dirty.clear();
        }
    }

    /// Reinserts an entry during snapshot load, bypassing dirty
    /// tracking. `remaining_ms` restores the deadline relative to now.
    pub fn restore(
        &self,
        db: usize,
        key: String,
        value: Value,
        remaining_ms: Option<u64>,
    ) -> Result<(), StoreError> {
        let mut guard = self.write(db)?;
        if let Some(ms) = remaining_ms {
            let deadline = time::deadline_after(Duration::from_millis(ms));
            guard.expiry.insert(Box::from(key.as_str()), deadline);
        } else {
            guard.expiry.remove(key.as_str());
        }
        guard.entries.insert(key.into_boxed_str(), value);
        Ok(())
    }

    // ------------------------------------------------------------------
    // expiration sweep support
    // ------------------------------------------------------------------

    /// Deletes up to `batch` expired keys from one database under a
    /// single write-lock acquisition. Returns how many were removed;
    /// a result smaller than `batch` means the database is clean.
    pub(crate) fn sweep_database(&self, index: usize, batch: usize) -> usize {
        let Some(db) = self.dbs.get(index) else {
            return 0;
        };
        let mut guard = db.write();
        let due: Vec<Box<str>> = guard
            .expiry
            .iter()
            .filter(|(_, &deadline)| time::is_expired(deadline))
            .take(batch)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &due {
            guard.entries.remove(key);
            guard.expiry.remove(key);
        }
        due.len()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats a score the way Redis prints floats: integral values drop
/// the decimal point, everything else uses the shortest round-trip
/// form.
pub fn format_score(score: f64) -> String {
    if score == score.trunc() && score.abs() < 1e17 {
        format!("{}", score as i64)
    } else {
        format!("{score}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::thread;

    fn store() -> Store {
        Store::new()
    }

    #[test]
    fn del_existing() {
        let s = store();
        s.set(0, "key", b"val", None).unwrap();
        assert!(s.del(0, "key").unwrap());
        assert_eq!(s.get(0, "key").unwrap(), None);
    }

    #[test]
    fn del_missing_returns_false() {
        let s = store();
        assert!(!s.del(0, "nope").unwrap());
    }

    #[test]
    fn del_covers_every_kind() {
        let s = store();
        s.set(0, "str", b"v", None).unwrap();
        s.rpush(0, "list", &[Bytes::from("a")]).unwrap();
        s.sadd(0, "set", &["1".into()]).unwrap();
        s.hset(0, "hash", &[("f".into(), Bytes::from("v"))]).unwrap();
        s.zadd(0, "zset", &[(1.0, "m".into())]).unwrap();

        for key in ["str", "list", "set", "hash", "zset"] {
            assert!(s.del(0, key).unwrap(), "del {key}");
            assert!(!s.exists(0, key).unwrap());
        }
    }

    #[test]
    fn exists_consults_all_kinds() {
        let s = store();
        s.rpush(0, "list", &[Bytes::from("a")]).unwrap();
        s.zadd(0, "zset", &[(1.0, "m".into())]).unwrap();
        assert!(s.exists(0, "list").unwrap());
        assert!(s.exists(0, "zset").unwrap());
        assert!(!s.exists(0, "other").unwrap());
    }

    #[test]
    fn databases_are_independent() {
        let s = store();
        s.set(0, "key", b"zero", None).unwrap();
        s.set(1, "key", b"one", None).unwrap();
        assert_eq!(s.get(0, "key").unwrap(), Some(Bytes::from("zero")));
        assert_eq!(s.get(1, "key").unwrap(), Some(Bytes::from("one")));
        s.del(0, "key").unwrap();
        assert_eq!(s.get(1, "key").unwrap(), Some(Bytes::from("one")));
    }

    #[test]
    fn select_validates_range() {
        let s = store();
        assert!(s.select(0).is_ok());
        assert!(s.select(15).is_ok());
        assert_eq!(s.select(16), Err(StoreError::DbIndexOutOfRange));
    }

    #[test]
    fn bad_db_index_is_an_error() {
        let s = store();
        assert_eq!(s.get(99, "k"), Err(StoreError::DbIndexOutOfRange));
    }

    #[test]
    fn type_labels() {
        let s = store();
        s.set(0, "str", b"v", None).unwrap();
        s.rpush(0, "list", &[Bytes::from("a")]).unwrap();
        s.sadd(0, "set", &["1".into()]).unwrap();
        s.hset(0, "hash", &[("f".into(), Bytes::from("v"))]).unwrap();
        s.zadd(0, "zset", &[(1.0, "m".into())]).unwrap();

        assert_eq!(s.key_type(0, "str").unwrap(), Some("string"));
        assert_eq!(s.key_type(0, "list").unwrap(), Some("list"));
        assert_eq!(s.key_type(0, "set").unwrap(), Some("set"));
        assert_eq!(s.key_type(0, "hash").unwrap(), Some("hash"));
        assert_eq!(s.key_type(0, "zset").unwrap(), Some("zset"));
        assert_eq!(s.key_type(0, "missing").unwrap(), None);
    }

    #[test]
    fn keys_with_pattern_skips_expired() {
        let s = store();
        s.set(0, "user:1", b"a", None).unwrap();
        s.set(0, "user:2", b"b", None).unwrap();
        s.set(0, "item:1", b"c", None).unwrap();
        s.set(0, "user:3", b"d", Some(Duration::from_millis(5))).unwrap();

        thread::sleep(Duration::from_millis(20));

        let mut keys = s.keys(0, "user:*").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["user:1", "user:2"]);
    }

    #[test]
    fn expire_and_ttl() {
        let s = store();
        s.set(0, "key", b"val", None).unwrap();
        assert_eq!(s.ttl(0, "key").unwrap(), TtlResult::NoExpiry);

        assert!(s.expire(0, "key", 60).unwrap());
        match s.ttl(0, "key").unwrap() {
            TtlResult::Seconds(secs) => assert!((59..=60).contains(&secs)),
            other => panic!("expected Seconds, got {other:?}"),
        }
    }

    #[test]
    fn expire_missing_key_returns_false() {
        let s = store();
        assert!(!s.expire(0, "nope", 60).unwrap());
    }

    #[test]
    fn non_positive_expire_clears_deadline() {
        let s = store();
        s.set(0, "key", b"val", None).unwrap();
        assert!(s.expire(0, "key", 3600).unwrap());
        assert!(matches!(s.ttl(0, "key").unwrap(), TtlResult::Seconds(_)));

        assert!(s.expire(0, "key", 0).unwrap());
        assert_eq!(s.ttl(0, "key").unwrap(), TtlResult::NoExpiry);
    }

    #[test]
    fn ttl_of_missing_key() {
        let s = store();
        assert_eq!(s.ttl(0, "missing").unwrap(), TtlResult::NotFound);
    }

    #[test]
    fn expired_key_reads_as_absent() {
        let s = store();
        s.set(0, "temp", b"val", Some(Duration::from_millis(5))).unwrap();
        thread::sleep(Duration::from_millis(20));

        assert_eq!(s.get(0, "temp").unwrap(), None);
        assert_eq!(s.ttl(0, "temp").unwrap(), TtlResult::NotFound);
        assert!(!s.exists(0, "temp").unwrap());
        assert!(!s.del(0, "temp").unwrap());
    }

    #[test]
    fn set_clears_prior_deadline() {
        let s = store();
        s.set(0, "key", b"v1", Some(Duration::from_secs(100))).unwrap();
        assert!(matches!(s.ttl(0, "key").unwrap(), TtlResult::Seconds(_)));

        s.set(0, "key", b"v2", None).unwrap();
        assert_eq!(s.ttl(0, "key").unwrap(), TtlResult::NoExpiry);
    }

    #[test]
    fn flushdb_only_clears_one_database() {
        let s = store();
        s.set(0, "a", b"1", None).unwrap();
        s.set(1, "b", b"2", None).unwrap();
        s.flushdb(0).unwrap();
        assert_eq!(s.dbsize(0).unwrap(), 0);
        assert_eq!(s.dbsize(1).unwrap(), 1);
    }

    #[test]
    fn flushall_clears_everything() {
        let s = store();
        s.set(0, "a", b"1", None).unwrap();
        s.set(3, "b", b"2", None).unwrap();
        s.flushall();
        assert_eq!(s.dbsize(0).unwrap(), 0);
        assert_eq!(s.dbsize(3).unwrap(), 0);
    }

    #[test]
    fn writes_mark_dirty_and_count_changes() {
        let s = store();
        assert_eq!(s.dirty_len(), 0);
        s.set(0, "a", b"1", None).unwrap();
        s.set(1, "b", b"2", None).unwrap();
        assert_eq!(s.dirty_len(), 2);
        assert_eq!(s.changes(), 2);

        // overwriting the same key doesn't add a second dirty entry
        s.set(0, "a", b"3", None).unwrap();
        assert_eq!(s.dirty_len(), 2);
        assert_eq!(s.changes(), 3);
    }

    #[test]
    fn collect_dirty_skips_deleted_keys() {
        let s = store();
        s.set(0, "kept", b"v", None).unwrap();
        s.set(0, "gone", b"v", None).unwrap();
        s.del(0, "gone").unwrap();

        let records = s.collect_dirty();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1, "kept");
    }

    #[test]
    fn clear_dirty_after_save() {
        let s = store();
        s.set(0, "a", b"1", None).unwrap();
        let records = s.collect_dirty();
        let saved: Vec<(u16, String)> = records.iter().map(|r| (r.0, r.1.clone())).collect();
        s.clear_dirty(&saved);
        assert_eq!(s.dirty_len(), 0);
    }

    #[test]
    fn restore_rebuilds_entry_and_deadline() {
        let s = store();
        s.restore(
            2,
            "back".into(),
            Value::String(crate::types::StringBuf::from_bytes(b"data")),
            Some(60_000),
        )
        .unwrap();

        assert_eq!(s.get(2, "back").unwrap(), Some(Bytes::from("data")));
        assert!(matches!(s.ttl(2, "back").unwrap(), TtlResult::Seconds(_)));
        // restore is not a client write
        assert_eq!(s.dirty_len(), 0);
    }

    #[test]
    fn format_score_drops_trailing_zeroes() {
        assert_eq!(format_score(11.0), "11");
        assert_eq!(format_score(1.5), "1.5");
        assert_eq!(format_score(0.0), "0");
        assert_eq!(format_score(-3.0), "-3");
    }
}
