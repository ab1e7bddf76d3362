use ahash::AHashMap;
use bytes::Bytes;

use super::Store;
use crate::error::StoreError;
use crate::types::Value;

impl Store {
    /// Sets hash fields, creating the hash if absent. Returns how many
    /// fields were newly created (updates don't count).
    ///
    /// Applies all pairs or none: the type check happens before any
    /// mutation and the database lock is held for the duration.
    pub fn hset(
        &self,
        db: usize,
        key: &str,
        fields: &[(String, Bytes)],
    ) -> Result<usize, StoreError> {
        let mut guard = self.write(db)?;
        guard.remove_if_expired(key);

        if !matches!(guard.entries.get(key), None | Some(Value::Hash(_))) {
            return Err(StoreError::WrongType);
        }
        let entry = guard
            .entries
            .entry(Box::from(key))
            .or_insert_with(|| Value::Hash(AHashMap::new()));
        let Value::Hash(map) = entry else {
            unreachable!("type verified above");
        };

        let mut created = 0;
        for (field, value) in fields {
            if map.insert(field.clone(), value.clone()).is_none() {
                created += 1;
            }
        }
        guard.mark_dirty(key);
        drop(guard);
        self.touch_write();
        Ok(created)
    }

    /// Returns the value of a hash field.
    pub fn hget(&self, db: usize, key: &str, field: &str) -> Result<Option<Bytes>, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(None);
        }
        match guard.entries.get(key) {
            None => Ok(None),
            Some(Value::Hash(map)) => Ok(map.get(field).cloned()),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// Deletes hash fields. Returns how many were actually removed;
    /// removing the last field deletes the key.
    pub fn hdel(&self, db: usize, key: &str, fields: &[String]) -> Result<usize, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(0);
        }
        let removed = match guard.entries.get_mut(key) {
            None => return Ok(0),
            Some(Value::Hash(map)) => fields
                .iter()
                .filter(|field| map.remove(field.as_str()).is_some())
                .count(),
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

    /// Number of fields in a hash; 0 when the key is absent.
    pub fn hlen(&self, db: usize, key: &str) -> Result<usize, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(0);
        }
        match guard.entries.get(key) {
            None => Ok(0),
            Some(Value::Hash(map)) => Ok(map.len()),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// Returns `true` if the hash contains the field.
    pub fn hexists(&self, db: usize, key: &str, field: &str) -> Result<bool, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(false);
        }
        match guard.entries.get(key) {
            None => Ok(false),
            Some(Value::Hash(map)) => Ok(map.contains_key(field)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// All field names, in arbitrary order.
    pub fn hkeys(&self, db: usize, key: &str) -> Result<Vec<String>, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(Vec::new());
        }
        match guard.entries.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Hash(map)) => Ok(map.keys().cloned().collect()),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// All field values, in arbitrary order.
    pub fn hvals(&self, db: usize, key: &str) -> Result<Vec<Bytes>, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(Vec::new());
        }
        match guard.entries.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Hash(map)) => Ok(map.values().cloned().collect()),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// All (field, value) pairs, in arbitrary order.
    pub fn hgetall(&self, db: usize, key: &str) -> Result<Vec<(String, Bytes)>, StoreError> {
        let mut guard = self.write(db)?;
        if guard.remove_if_expired(key) {
            return Ok(Vec::new());
        }
        match guard.entries.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Hash(map)) => {
                Ok(map.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
            }
            Some(_) => Err(StoreError::WrongType),
        }
    }
}
