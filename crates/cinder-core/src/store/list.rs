use bytes::Bytes;

use super::Store;
use crate::error::StoreError;
use crate::types::{QuickList, Value};

impl Store {
    /// Pushes values to the head of a list, one at a time, so
    /// `LPUSH k a b c` leaves the list as `c, b, a`. Creates the list
    /// if absent. Returns the new length.
    pub fn lpush(&self, db: usize, key: &str, values: &[Bytes]) -> Result<usize, StoreError> {
        self.list_push(db, key, values, true)
    }

    /// Pushes values to the tail of a list. Creates the list if
    /// absent. Returns the new length.
    pub fn rpush(&self, db: usize, key: &str, values: &[Bytes]) -> Result<usize, StoreError> {
        self.list_push(db, key, values, false)
    }

    fn list_push(
        &self,
        db: usize,
        key: &str,
        values: &[Bytes],
        left: bool,
    ) -> Result<usize, StoreError> {
        let mut guard = self.write(db)?;
        guard.remove_if_expired(key);

        if !matches!(guard.entries.get(key), None | Some(Value::List(_))) {
            return Err(StoreError::WrongType);
        }
        let entry = guard
            .entries
            .entry(Box::from(key))
            .or_insert_with(|| Value::List(QuickList::new()));
        let Value::List(list) = entry else {
            unreachable!("type verified above");
        };

        for value in values {
            if left {
                list.push_front(value);
            } else {
                list.push_back(value);
            }
        }
        let len = list.len();
        guard.mark_dirty(key);
        drop(guard);
        self.touch_write();
        Ok(len)
    }

    /// Pops the head element. `None` when the key is absent; popping
    /// the last element deletes the key.
    pub fn lpop(&self, db: usize, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.list_pop(db, key, true)
    }

    /// Pops the tail element. `None` when the key is absent.
    pub fn rpop(&self, db: usize, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.list_pop(db, key, false)
    }

    fn list_pop(&self, db: usize, key: &str, left: bool) -> Result<Option<Bytes>, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(None);
        }
        let popped = match guard.entries.get_mut(key) {
            None => return Ok(None),
            Some(Value::List(list)) => {
                if left {
                    list.pop_front()
                } else {
                    list.pop_back()
                }
            }
            Some(_) => return Err(StoreError::WrongType),
        };
        if popped.is_some() {
            guard.drop_if_drained(key);
            guard.mark_dirty(key);
            drop(guard);
            self.touch_write();
        }
        Ok(popped.map(Bytes::from))
    }

    /// Length of the list; 0 when the key is absent.
    pub fn llen(&self, db: usize, key: &str) -> Result<usize, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(0);
        }
        match guard.entries.get(key) {
            None => Ok(0),
            Some(Value::List(list)) => Ok(list.len()),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// Elements in the inclusive rank range, with negative indices and
    /// clamping. Missing keys and inverted ranges yield empty.
    pub fn lrange(
        &self,
        db: usize,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<Bytes>, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(Vec::new());
        }
        match guard.entries.get(key) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => {
                Ok(list.range(start, stop).into_iter().map(Bytes::from).collect())
            }
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// The element at `index` (negative counts from the tail), or
    /// `None` when the key or index doesn't exist.
    pub fn lindex(&self, db: usize, key: &str, index: i64) -> Result<Option<Bytes>, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(None);
        }
        match guard.entries.get(key) {
            None => Ok(None),
            Some(Value::List(list)) => Ok(list.get(index).map(Bytes::from)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// Replaces the element at `index`. Fails with `NoSuchKey` when
    /// the key is absent and `IndexOutOfRange` when the index is.
    pub fn lset(
        &self,
        db: usize,
        key: &str,
        index: i64,
        value: &[u8],
    ) -> Result<(), StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Err(StoreError::NoSuchKey);
        }
        match guard.entries.get_mut(key) {
            None => Err(StoreError::NoSuchKey),
            Some(Value::List(list)) => {
                if !list.set(index, value) {
                    return Err(StoreError::IndexOutOfRange);
                }
                guard.mark_dirty(key);
                drop(guard);
                self.touch_write();
                Ok(())
            }
            Some(_) => Err(StoreError::WrongType),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(items: &[&str]) -> Vec<Bytes> {
        items.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    #[test]
    fn rpush_then_lrange() {
        let s = Store::new();
        assert_eq!(s.rpush(0, "q", &bytes(&["a", "b", "c"])).unwrap(), 3);
        assert_eq!(s.lrange(0, "q", 0, -1).unwrap(), bytes(&["a", "b", "c"]));
    }

    #[test]
    fn lpush_reverses_argument_order() {
        let s = Store::new();
        s.lpush(0, "q", &bytes(&["a", "b", "c"])).unwrap();
        // each value lands at the head, so the final order is c, b, a
        assert_eq!(s.lrange(0, "q", 0, -1).unwrap(), bytes(&["c", "b", "a"]));
    }

    #[test]
    fn pops_from_both_ends() {
        let s = Store::new();
        s.rpush(0, "q", &bytes(&["a", "b", "c"])).unwrap();
        assert_eq!(s.lpop(0, "q").unwrap(), Some(Bytes::from("a")));
        assert_eq!(s.rpop(0, "q").unwrap(), Some(Bytes::from("c")));
        assert_eq!(s.llen(0, "q").unwrap(), 1);
    }

    #[test]
    fn pop_missing_key_is_none() {
        let s = Store::new();
        assert_eq!(s.lpop(0, "nope").unwrap(), None);
        assert_eq!(s.rpop(0, "nope").unwrap(), None);
    }

    #[test]
    fn draining_deletes_the_key() {
        let s = Store::new();
        s.rpush(0, "q", &bytes(&["only"])).unwrap();
        assert_eq!(s.lpop(0, "q").unwrap(), Some(Bytes::from("only")));
        assert!(!s.exists(0, "q").unwrap());
        assert_eq!(s.lpop(0, "q").unwrap(), None);
    }

    #[test]
    fn lrange_clamps_and_inverts() {
        let s = Store::new();
        s.rpush(0, "q", &bytes(&["a", "b", "c"])).unwrap();
        assert_eq!(s.lrange(0, "q", -2, -1).unwrap(), bytes(&["b", "c"]));
        assert_eq!(s.lrange(0, "q", -100, 100).unwrap().len(), 3);
        assert!(s.lrange(0, "q", 2, 1).unwrap().is_empty());
        assert!(s.lrange(0, "missing", 0, -1).unwrap().is_empty());
    }

    #[test]
    fn lindex_positive_and_negative() {
        let s = Store::new();
        s.rpush(0, "q", &bytes(&["a", "b", "c"])).unwrap();
        assert_eq!(s.lindex(0, "q", 0).unwrap(), Some(Bytes::from("a")));
        assert_eq!(s.lindex(0, "q", -1).unwrap(), Some(Bytes::from("c")));
        assert_eq!(s.lindex(0, "q", 5).unwrap(), None);
    }

    #[test]
    fn lset_replaces_or_errors() {
        let s = Store::new();
        s.rpush(0, "q", &bytes(&["a", "b"])).unwrap();
        s.lset(0, "q", 1, b"B").unwrap();
        assert_eq!(s.lindex(0, "q", 1).unwrap(), Some(Bytes::from("B")));

        assert_eq!(s.lset(0, "q", 5, b"x"), Err(StoreError::IndexOutOfRange));
        assert_eq!(s.lset(0, "missing", 0, b"x"), Err(StoreError::NoSuchKey));
    }

    #[test]
    fn list_ops_reject_other_kinds() {
        let s = Store::new();
        s.set(0, "str", b"v", None).unwrap();
        assert_eq!(s.lpush(0, "str", &bytes(&["a"])), Err(StoreError::WrongType));
        assert_eq!(s.llen(0, "str"), Err(StoreError::WrongType));
        assert_eq!(s.lrange(0, "str", 0, -1), Err(StoreError::WrongType));
        // the string is untouched
        assert_eq!(s.get(0, "str").unwrap(), Some(Bytes::from("v")));
    }

    #[test]
    fn long_lists_span_segments() {
        let s = Store::new();
        let values: Vec<Bytes> = (0..300).map(|i| Bytes::from(format!("v{i}"))).collect();
        assert_eq!(s.rpush(0, "big", &values).unwrap(), 300);
        assert_eq!(s.llen(0, "big").unwrap(), 300);
        assert_eq!(s.lindex(0, "big", 250).unwrap(), Some(Bytes::from("v250")));
        let tail = s.lrange(0, "big", -3, -1).unwrap();
        assert_eq!(tail, bytes(&["v297", "v298", "v299"]));
    }
}
