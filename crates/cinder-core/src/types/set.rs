//! Set value with an adaptive internal encoding.
//!
//! Starts as a sorted array of `i64` while every member is canonical
//! decimal text. The first non-integer member promotes the set to a
//! hash table, converting the existing integers to their decimal form.
//! Promotion is one-way.

use ahash::AHashSet;

/// Parses a member as a canonical decimal integer: the parse must
/// round-trip so "007" or "+1" never masquerade as 7 or 1.
fn canonical_int(member: &str) -> Option<i64> {
    let n: i64 = member.parse().ok()?;
    if n.to_string() == member {
        Some(n)
    } else {
        None
    }
}

#[derive(Debug, Clone)]
enum Repr {
    /// Sorted, deduplicated integer array. Insert/remove via binary search.
    Ints(Vec<i64>),
    /// General string members after promotion.
    Table(AHashSet<String>),
}

/// An unordered set of unique string members.
#[derive(Debug, Clone)]
pub struct AdaptiveSet {
    repr: Repr,
}

impl AdaptiveSet {
    /// Creates an empty set in the integer encoding.
    pub fn new() -> Self {
        Self {
            repr: Repr::Ints(Vec::new()),
        }
    }

    /// Returns `true` while the set is in the integer encoding.
    pub fn is_int_encoded(&self) -> bool {
        matches!(self.repr, Repr::Ints(_))
    }

    /// Adds a member. Returns `true` if it was newly inserted.
    ///
    /// A non-integer member promotes the set to the hash-table encoding
    /// before inserting.
    pub fn add(&mut self, member: &str) -> bool {
        if let Repr::Ints(ints) = &mut self.repr {
            match canonical_int(member) {
                Some(n) => {
                    return match ints.binary_search(&n) {
                        Ok(_) => false,
                        Err(pos) => {
                            ints.insert(pos, n);
                            true
                        }
                    };
                }
                None => self.promote(),
            }
        }
        match &mut self.repr {
            Repr::Table(table) => table.insert(member.to_owned()),
            Repr::Ints(_) => unreachable!("promoted above"),
        }
    }

    /// Removes a member. Returns `true` if it was present.
    pub fn remove(&mut self, member: &str) -> bool {
        match &mut self.repr {
            Repr::Ints(ints) => match canonical_int(member) {
                Some(n) => match ints.binary_search(&n) {
                    Ok(pos) => {
                        ints.remove(pos);
                        true
                    }
                    Err(_) => false,
                },
                None => false,
            },
            Repr::Table(table) => table.remove(member),
        }
    }

    /// Returns `true` if the member is in the set.
    pub fn contains(&self, member: &str) -> bool {
        match &self.repr {
            Repr::Ints(ints) => canonical_int(member)
                .map(|n| ints.binary_search(&n).is_ok())
                .unwrap_or(false),
            Repr::Table(table) => table.contains(member),
        }
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Ints(ints) => ints.len(),
            Repr::Table(table) => table.len(),
        }
    }

    /// Returns `true` if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all members. Numeric-sorted while integer-encoded,
    /// arbitrary order after promotion; callers must not rely on
    /// ordering.
    pub fn members(&self) -> Vec<String> {
        match &self.repr {
            Repr::Ints(ints) => ints.iter().map(i64::to_string).collect(),
            Repr::Table(table) => table.iter().cloned().collect(),
        }
    }

    /// Converts the integer array to a hash table. No-op once promoted.
    fn promote(&mut self) {
        if let Repr::Ints(ints) = &self.repr {
            let table: AHashSet<String> = ints.iter().map(i64::to_string).collect();
            self.repr = Repr::Table(table);
        }
    }

    /// Members present in either set.
    pub fn union(&self, other: &AdaptiveSet) -> AdaptiveSet {
        let mut result = AdaptiveSet::new();
        for member in self.members() {
            result.add(&member);
        }
        for member in other.members() {
            result.add(&member);
        }
        result
    }

    /// Members present in both sets.
    pub fn intersection(&self, other: &AdaptiveSet) -> AdaptiveSet {
        let mut result = AdaptiveSet::new();
        for member in self.members() {
            if other.contains(&member) {
                result.add(&member);
            }
        }
        result
    }

    /// Members present in `self` but not in `other`.
    pub fn difference(&self, other: &AdaptiveSet) -> AdaptiveSet {
        let mut result = AdaptiveSet::new();
        for member in self.members() {
            if !other.contains(&member) {
                result.add(&member);
            }
        }
        result
    }
}

impl Default for AdaptiveSet {
    fn default() -> Self {
        Self::new()
    }
}
