use super::Store;
use crate::error::StoreError;
use crate::types::{AdaptiveSet, Value};

impl Store {
    /// Adds members to a set, creating it if absent. Returns how many
    /// were actually added (duplicates don't count).
    pub fn sadd(&self, db: usize, key: &str, members: &[String]) -> Result<usize, StoreError> {
        let mut guard = self.write(db)?;
        guard.remove_if_expired(key);

        if !matches!(guard.entries.get(key), None | Some(Value::Set(_))) {
            return Err(StoreError::WrongType);
        }
        let entry = guard
            .entries
            .entry(Box::from(key))
            .or_insert_with(|| Value::Set(AdaptiveSet::new()));
        let Value::Set(set) = entry else {
            unreachable!("type verified above");
        };

        let added = members.iter().filter(|m| set.add(m)).count();
        guard.mark_dirty(key);
        drop(guard);
        self.touch_write();
        Ok(added)
    }

    /// Removes members from a set. Returns how many were actually
    /// removed; removing the last member deletes the key.
    pub fn srem(&self, db: usize, key: &str, members: &[String]) -> Result<usize, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(0);
        }
        let removed = match guard.entries.get_mut(key) {
            None => return Ok(0),
            Some(Value::Set(set)) => members.iter().filter(|m| set.remove(m)).count(),
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

    /// All members. Numeric-sorted while the set is integer-encoded,
    /// arbitrary order after promotion.
    pub fn smembers(&self, db: usize, key: &str) -> Result<Vec<String>, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(Vec::new());
        }
        match guard.entries.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Set(set)) => Ok(set.members()),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// Number of members; 0 when the key is absent.
    pub fn scard(&self, db: usize, key: &str) -> Result<usize, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(0);
        }
        match guard.entries.get(key) {
            None => Ok(0),
            Some(Value::Set(set)) => Ok(set.len()),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// Returns `true` if `member` is in the set.
    pub fn sismember(&self, db: usize, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(false);
        }
        match guard.entries.get(key) {
            None => Ok(false),
            Some(Value::Set(set)) => Ok(set.contains(member)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// Union of the named sets. Absent keys behave as empty sets.
    pub fn sunion(&self, db: usize, keys: &[String]) -> Result<Vec<String>, StoreError> {
        self.set_algebra(db, keys, |acc, set| acc.union(set))
    }

    /// Intersection of the named sets.
    pub fn sinter(&self, db: usize, keys: &[String]) -> Result<Vec<String>, StoreError> {
        self.set_algebra(db, keys, |acc, set| acc.intersection(set))
    }

    /// Members of the first set not present in any of the rest.
    pub fn sdiff(&self, db: usize, keys: &[String]) -> Result<Vec<String>, StoreError> {
        self.set_algebra(db, keys, |acc, set| acc.difference(set))
    }

    fn set_algebra(
        &self,
        db: usize,
        keys: &[String],
        combine: fn(&AdaptiveSet, &AdaptiveSet) -> AdaptiveSet,
    ) -> Result<Vec<String>, StoreError> {
        let mut guard = self.write(db)?;
        let empty = AdaptiveSet::new();

        // type-check every operand before combining anything
        for key in keys {
            guard.remove_if_expired(key);
            if !matches!(guard.entries.get(key.as_str()), None | Some(Value::Set(_))) {
                return Err(StoreError::WrongType);
            }
        }

        let mut iter = keys.iter();
        let Some(first) = iter.next() else {
            return Ok(Vec::new());
        };
        let mut acc = match guard.entries.get(first.as_str()) {
            Some(Value::Set(set)) => set.clone(),
            _ => AdaptiveSet::new(),
        };
        for key in iter {
            let set = match guard.entries.get(key.as_str()) {
                Some(Value::Set(set)) => set,
                _ => &empty,
            };
            acc = combine(&acc, set);
        }
        Ok(acc.members())
    }
}
