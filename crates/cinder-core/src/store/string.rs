use std::time::Duration;

use bytes::Bytes;

use super::Store;
use crate::error::StoreError;
use crate::time;
use crate::types::{StringBuf, Value};

impl Store {
    /// Stores a string value, replacing whatever the key held before.
    ///
    /// An atomic reset: any prior deadline is cleared, then `ttl` (if
    /// given) sets a fresh one.
    pub fn set(
        &self,
        db: usize,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut guard = self.write(db)?;
        guard
            .entries
            .insert(Box::from(key), Value::String(StringBuf::from_bytes(value)));
        guard.expiry.remove(key);
        if let Some(ttl) = ttl {
            guard
                .expiry
                .insert(Box::from(key), time::deadline_after(ttl));
        }
        guard.mark_dirty(key);
        drop(guard);
        self.touch_write();
        Ok(())
    }

    /// Returns the string value, or `None` when the key is absent.
    pub fn get(&self, db: usize, key: &str) -> Result<Option<Bytes>, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(None);
        }
        match guard.entries.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(Bytes::copy_from_slice(s.as_bytes()))),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// Appends bytes to a string, creating it if absent. Returns the
    /// new length.
    pub fn append(&self, db: usize, key: &str, value: &[u8]) -> Result<usize, StoreError> {
        let mut guard = self.write(db)?;
        guard.remove_if_expired(key);

        if !matches!(guard.entries.get(key), None | Some(Value::String(_))) {
            return Err(StoreError::WrongType);
        }
        let entry = guard
            .entries
            .entry(Box::from(key))
            .or_insert_with(|| Value::String(StringBuf::new()));
        let Value::String(s) = entry else {
            unreachable!("type verified above");
        };

        let len = s.append(value);
        guard.mark_dirty(key);
        drop(guard);
        self.touch_write();
        Ok(len)
    }

    /// Returns the inclusive byte range `[start, end]`, negative
    /// indices counting from the end. Missing keys yield empty bytes.
    pub fn getrange(
        &self,
        db: usize,
        key: &str,
        start: i64,
        end: i64,
    ) -> Result<Bytes, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(Bytes::new());
        }
        match guard.entries.get(key) {
            None => Ok(Bytes::new()),
            Some(Value::String(s)) => Ok(Bytes::copy_from_slice(s.get_range(start, end))),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// Overwrites bytes at `offset`, zero-padding any gap. Creates the
    /// key if absent. Returns the new length.
    pub fn setrange(
        &self,
        db: usize,
        key: &str,
        offset: usize,
        value: &[u8],
    ) -> Result<usize, StoreError> {
        let mut guard = self.write(db)?;
        guard.remove_if_expired(key);

        if !matches!(guard.entries.get(key), None | Some(Value::String(_))) {
            return Err(StoreError::WrongType);
        }
        let entry = guard
            .entries
            .entry(Box::from(key))
            .or_insert_with(|| Value::String(StringBuf::new()));
        let Value::String(s) = entry else {
            unreachable!("type verified above");
        };

        let len = s.set_range(offset, value);
        guard.mark_dirty(key);
        drop(guard);
        self.touch_write();
        Ok(len)
    }

    /// Returns the string length; 0 when the key is absent.
    pub fn strlen(&self, db: usize, key: &str) -> Result<usize, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(0);
        }
        match guard.entries.get(key) {
            None => Ok(0),
            Some(Value::String(s)) => Ok(s.len()),
            Some(_) => Err(StoreError::WrongType),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let s = Store::new();
        s.set(0, "key", b"value", None).unwrap();
        assert_eq!(s.get(0, "key").unwrap(), Some(Bytes::from("value")));
    }

    #[test]
    fn get_missing_is_none() {
        let s = Store::new();
        assert_eq!(s.get(0, "nope").unwrap(), None);
    }

    #[test]
    fn set_overwrites_any_kind() {
        let s = Store::new();
        s.rpush(0, "key", &[Bytes::from("a")]).unwrap();
        s.set(0, "key", b"now a string", None).unwrap();
        assert_eq!(s.key_type(0, "key").unwrap(), Some("string"));
    }

    #[test]
    fn get_on_list_is_wrong_type() {
        let s = Store::new();
        s.rpush(0, "list", &[Bytes::from("a")]).unwrap();
        assert_eq!(s.get(0, "list"), Err(StoreError::WrongType));
    }

    #[test]
    fn append_creates_and_extends() {
        let s = Store::new();
        assert_eq!(s.append(0, "key", b"hi").unwrap(), 2);
        assert_eq!(s.append(0, "key", b"!").unwrap(), 3);
        assert_eq!(s.get(0, "key").unwrap(), Some(Bytes::from("hi!")));
    }

    #[test]
    fn append_wrong_type_does_not_mutate() {
        let s = Store::new();
        s.sadd(0, "set", &["1".into()]).unwrap();
        assert_eq!(s.append(0, "set", b"x"), Err(StoreError::WrongType));
        assert_eq!(s.scard(0, "set").unwrap(), 1);
    }

    #[test]
    fn getrange_variants() {
        let s = Store::new();
        s.set(0, "key", b"Hello World", None).unwrap();
        assert_eq!(s.getrange(0, "key", 0, 4).unwrap(), Bytes::from("Hello"));
        assert_eq!(s.getrange(0, "key", -5, -1).unwrap(), Bytes::from("World"));
        assert_eq!(s.getrange(0, "key", 0, -1).unwrap(), Bytes::from("Hello World"));
        assert_eq!(s.getrange(0, "key", 3, 1).unwrap(), Bytes::new());
        assert_eq!(s.getrange(0, "missing", 0, -1).unwrap(), Bytes::new());
    }

    #[test]
    fn setrange_pads_with_zeroes() {
        let s = Store::new();
        s.set(0, "key", b"ab", None).unwrap();
        assert_eq!(s.setrange(0, "key", 4, b"cd").unwrap(), 6);
        assert_eq!(s.get(0, "key").unwrap(), Some(Bytes::from(&b"ab\0\0cd"[..])));
    }

    #[test]
    fn setrange_creates_missing_key() {
        let s = Store::new();
        assert_eq!(s.setrange(0, "fresh", 2, b"xy").unwrap(), 4);
        assert_eq!(s.get(0, "fresh").unwrap(), Some(Bytes::from(&b"\0\0xy"[..])));
    }

    #[test]
    fn strlen_cases() {
        let s = Store::new();
        assert_eq!(s.strlen(0, "missing").unwrap(), 0);
        s.set(0, "key", b"hello", None).unwrap();
        assert_eq!(s.strlen(0, "key").unwrap(), 5);
    }

    #[test]
    fn set_with_ttl_expires() {
        let s = Store::new();
        s.set(0, "temp", b"v", Some(Duration::from_millis(5))).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(s.get(0, "temp").unwrap(), None);
    }
}
