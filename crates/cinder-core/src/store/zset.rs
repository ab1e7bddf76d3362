use super::Store;
use crate::error::StoreError;
use crate::types::{SortedSet, Value};

impl Store {
    /// Adds (score, member) pairs, creating the sorted set if absent.
    /// Returns how many members were newly added; score updates of
    /// existing members don't count.
    pub fn zadd(
        &self,
        db: usize,
        key: &str,
        pairs: &[(f64, String)],
    ) -> Result<usize, StoreError> {
        let mut guard = self.write(db)?;
        guard.remove_if_expired(key);

        if !matches!(guard.entries.get(key), None | Some(Value::SortedSet(_))) {
            return Err(StoreError::WrongType);
        }
        let entry = guard
            .entries
            .entry(Box::from(key))
            .or_insert_with(|| Value::SortedSet(SortedSet::new()));
        let Value::SortedSet(zset) = entry else {
            unreachable!("type verified above");
        };

        let added = pairs
            .iter()
            .filter(|(score, member)| zset.insert(member, *score))
            .count();
        guard.mark_dirty(key);
        drop(guard);
        self.touch_write();
        Ok(added)
    }

    /// Returns the score of a member.
    pub fn zscore(&self, db: usize, key: &str, member: &str) -> Result<Option<f64>, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(None);
        }
        match guard.entries.get(key) {
            None => Ok(None),
            Some(Value::SortedSet(zset)) => Ok(zset.score(member)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// Removes members. Returns how many were actually removed;
    /// removing the last member deletes the key.
    pub fn zrem(&self, db: usize, key: &str, members: &[String]) -> Result<usize, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(0);
        }
        let removed = match guard.entries.get_mut(key) {
            None => return Ok(0),
            Some(Value::SortedSet(zset)) => {
                members.iter().filter(|m| zset.remove(m)).count()
            }
            Some(_) => return Err(StoreError::WrongType),
        };
        if removed > 0 {
            guard.drop_if_drained(key);
            guard.mark_dirty(key);
            drop(guard);
            self.touch_write();
        }
        Ok(removed)
    }

    /// Number of members; 0 when the key is absent.
    pub fn zcard(&self, db: usize, key: &str) -> Result<usize, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(0);
        }
        match guard.entries.get(key) {
            None => Ok(0),
            Some(Value::SortedSet(zset)) => Ok(zset.len()),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// Adds `delta` to the member's score, creating both the key and
    /// the member as needed. Returns the new score.
    pub fn zincrby(
        &self,
        db: usize,
        key: &str,
        delta: f64,
        member: &str,
    ) -> Result<f64, StoreError> {
        let mut guard = self.write(db)?;
        guard.remove_if_expired(key);

        if !matches!(guard.entries.get(key), None | Some(Value::SortedSet(_))) {
            return Err(StoreError::WrongType);
        }
        let entry = guard
            .entries
            .entry(Box::from(key))
            .or_insert_with(|| Value::SortedSet(SortedSet::new()));
        let Value::SortedSet(zset) = entry else {
            unreachable!("type verified above");
        };

        let score = zset.incr_by(member, delta);
        guard.mark_dirty(key);
        drop(guard);
        self.touch_write();
        Ok(score)
    }

    /// Members in the inclusive rank range, in (score, member)
    /// ascending order.
    pub fn zrange(
        &self,
        db: usize,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(Vec::new());
        }
        match guard.entries.get(key) {
            None => Ok(Vec::new()),
            Some(Value::SortedSet(zset)) => Ok(zset.range_by_rank(start, stop)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// Members with `min <= score <= max` in score order.
    pub fn zrange_by_score(
        &self,
        db: usize,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(Vec::new());
        }
        match guard.entries.get(key) {
            None => Ok(Vec::new()),
            Some(Value::SortedSet(zset)) => Ok(zset.range_by_score(min, max)),
            Some(_) => Err(StoreError::WrongType),
        }
    }
}
