//! Sorted set: a height-capped skip list with rank spans.
//!
//! Members are ordered by `(score, member)`; ties in score break
//! lexicographically. Each level link records how many base-level nodes
//! its forward pointer skips, giving O(log n) rank queries. A side map
//! `member → node` provides O(1) score lookup and removal.
//!
//! Nodes live in an arena (`Vec` plus a free list) and link by index,
//! so the backward spine needs no shared ownership.

use ahash::AHashMap;

/// Maximum number of levels.
const MAX_LEVEL: usize = 32;

/// Probability of promoting a node one more level.
const LEVEL_P: f64 = 0.25;

/// Sentinel node index meaning "no node".
const NIL: u32 = u32::MAX;

/// Arena index of the header sentinel.
const HEAD: u32 = 0;

#[derive(Debug, Clone, Copy)]
struct Link {
    forward: u32,
    /// Base-level nodes skipped by `forward`, counting the target.
    span: usize,
}

impl Link {
    const EMPTY: Self = Self {
        forward: NIL,
        span: 0,
    };
}

#[derive(Debug, Clone)]
struct Node {
    member: String,
    score: f64,
    backward: u32,
    links: Vec<Link>,
}

/// A set of (member, score) pairs with two orderings: by rank and by
/// score.
#[derive(Debug, Clone)]
pub struct SortedSet {
    nodes: Vec<Node>,
    free: Vec<u32>,
    tail: u32,
    level: usize,
    len: usize,
    index: AHashMap<String, u32>,
}

impl SortedSet {
    /// Creates an empty sorted set.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                member: String::new(),
                score: 0.0,
                backward: NIL,
                links: vec![Link::EMPTY; MAX_LEVEL],
            }],
            free: Vec::new(),
            tail: NIL,
            level: 1,
            len: 0,
            index: AHashMap::new(),
        }
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adds a member or updates its score. Returns `true` when the
    /// member was newly added, `false` when an existing score was
    /// updated (or unchanged).
    pub fn insert(&mut self, member: &str, score: f64) -> bool {
        if let Some(&node) = self.index.get(member) {
            if self.nodes[node as usize].score == score {
                return false;
            }
            self.remove(member);
            self.insert_new(member, score);
            return false;
        }
        self.insert_new(member, score);
        true
    }

    /// Removes a member. Returns `true` if it was present.
    pub fn remove(&mut self, member: &str) -> bool {
        let Some(&target) = self.index.get(member) else {
            return false;
        };
        let score = self.nodes[target as usize].score;

        let mut update = [HEAD; MAX_LEVEL];
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            loop {
                let link = self.nodes[x as usize].links[i];
                if link.forward == NIL {
                    break;
                }
                let fwd = &self.nodes[link.forward as usize];
                if fwd.score < score || (fwd.score == score && fwd.member.as_str() < member) {
                    x = link.forward;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let found = self.nodes[update[0] as usize].links[0].forward;
        debug_assert_eq!(found, target, "index out of sync with skip list");
        self.unlink(target, &update);
        self.index.remove(member);
        true
    }

    /// Returns the score of a member.
    pub fn score(&self, member: &str) -> Option<f64> {
        self.index
            .get(member)
            .map(|&node| self.nodes[node as usize].score)
    }

    /// Adds `delta` to the member's score, creating it at `delta` if
    /// absent. Returns the new score.
    pub fn incr_by(&mut self, member: &str, delta: f64) -> f64 {
        let new_score = self.score(member).unwrap_or(0.0) + delta;
        self.remove(member);
        self.insert_new(member, new_score);
        new_score
    }

    /// Returns the 0-based rank of a member (lowest (score, member)
    /// first). O(log n) via span accumulation.
    pub fn rank(&self, member: &str) -> Option<usize> {
        let &node = self.index.get(member)?;
        let score = self.nodes[node as usize].score;

        let mut rank = 0usize;
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            loop {
                let link = self.nodes[x as usize].links[i];
                if link.forward == NIL {
                    break;
                }
                let fwd = &self.nodes[link.forward as usize];
                if fwd.score < score || (fwd.score == score && fwd.member.as_str() <= member) {
                    rank += link.span;
                    x = link.forward;
                } else {
                    break;
                }
            }
            if x != HEAD && self.nodes[x as usize].member == member {
                return Some(rank - 1);
            }
        }
        None
    }

    /// Returns members in the inclusive rank range, negative indices
    /// counting from the highest rank.
    pub fn range_by_rank(&self, start: i64, stop: i64) -> Vec<(String, f64)> {
        let (s, e) = super::normalize_range(start, stop, self.len as i64);
        if s > e {
            return Vec::new();
        }

        let mut result = Vec::with_capacity((e - s + 1) as usize);
        let mut x = match self.node_at_rank(s as usize) {
            Some(node) => node,
            None => return result,
        };
        for _ in s..=e {
            let node = &self.nodes[x as usize];
            result.push((node.member.clone(), node.score));
            x = node.links[0].forward;
            if x == NIL {
                break;
            }
        }
        result
    }

    /// Returns members with `min <= score <= max` in score order.
    pub fn range_by_score(&self, min: f64, max: f64) -> Vec<(String, f64)> {
        let mut result = Vec::new();

        // descend to the last node with score < min
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            loop {
                let link = self.nodes[x as usize].links[i];
                if link.forward != NIL && self.nodes[link.forward as usize].score < min {
                    x = link.forward;
                } else {
                    break;
                }
            }
        }

        let mut x = self.nodes[x as usize].links[0].forward;
        while x != NIL {
            let node = &self.nodes[x as usize];
            if node.score > max {
                break;
            }
            result.push((node.member.clone(), node.score));
            x = node.links[0].forward;
        }
        result
    }

    /// Iterates all (member, score) pairs in (score, member) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        let mut x = self.nodes[HEAD as usize].links[0].forward;
        std::iter::from_fn(move || {
            if x == NIL {
                return None;
            }
            let node = &self.nodes[x as usize];
            x = node.links[0].forward;
            Some((node.member.as_str(), node.score))
        })
    }

    /// Picks a level for a new node: geometric distribution with
    /// p = 0.25, capped at [`MAX_LEVEL`].
    fn random_level(&self) -> usize {
        use rand::Rng;

        let mut rng = rand::rng();
        let mut level = 1;
        while level < MAX_LEVEL && rng.random::<f64>() < LEVEL_P {
            level += 1;
        }
        level
    }

    /// Allocates an arena slot, reusing a freed one when available.
    fn alloc(&mut self, member: &str, score: f64, level: usize) -> u32 {
        let node = Node {
            member: member.to_owned(),
            score,
            backward: NIL,
            links: vec![Link::EMPTY; level],
        };
        match self.free.pop() {
            Some(id) => {
                self.nodes[id as usize] = node;
                id
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as u32
            }
        }
    }

    /// Inserts a member known to be absent.
    fn insert_new(&mut self, member: &str, score: f64) {
        let mut update = [HEAD; MAX_LEVEL];
        let mut rank = [0usize; MAX_LEVEL];

        let mut x = HEAD;
        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
            loop {
                let link = self.nodes[x as usize].links[i];
                if link.forward == NIL {
                    break;
                }
                let fwd = &self.nodes[link.forward as usize];
                if fwd.score < score || (fwd.score == score && fwd.member.as_str() < member) {
                    rank[i] += link.span;
                    x = link.forward;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let level = self.random_level();
        if level > self.level {
            for i in self.level..level {
                rank[i] = 0;
                update[i] = HEAD;
                self.nodes[HEAD as usize].links[i].span = self.len;
            }
            self.level = level;
        }

        let id = self.alloc(member, score, level);
        for i in 0..level {
            let upstream = self.nodes[update[i] as usize].links[i];
            self.nodes[id as usize].links[i] = Link {
                forward: upstream.forward,
                span: upstream.span - (rank[0] - rank[i]),
            };
            self.nodes[update[i] as usize].links[i] = Link {
                forward: id,
                span: rank[0] - rank[i] + 1,
            };
        }
        // levels above the new node just got one more node under them
        for i in level..self.level {
            self.nodes[update[i] as usize].links[i].span += 1;
        }

        self.nodes[id as usize].backward = if update[0] == HEAD { NIL } else { update[0] };
        let next = self.nodes[id as usize].links[0].forward;
        if next != NIL {
            self.nodes[next as usize].backward = id;
        } else {
            self.tail = id;
        }

        self.len += 1;
        self.index.insert(member.to_owned(), id);
    }

    /// Detaches a node given the per-level predecessors.
    fn unlink(&mut self, x: u32, update: &[u32; MAX_LEVEL]) {
        for i in 0..self.level {
            let pred = update[i] as usize;
            if self.nodes[pred].links[i].forward == x {
                let removed = self.nodes[x as usize].links[i];
                let link = &mut self.nodes[pred].links[i];
                link.span += removed.span - 1;
                link.forward = removed.forward;
            } else {
                self.nodes[pred].links[i].span -= 1;
            }
        }

        let next = self.nodes[x as usize].links[0].forward;
        let prev = self.nodes[x as usize].backward;
        if next != NIL {
            self.nodes[next as usize].backward = prev;
        } else {
            self.tail = prev;
        }

        while self.level > 1 && self.nodes[HEAD as usize].links[self.level - 1].forward == NIL {
            self.level -= 1;
        }
        self.len -= 1;

        // release the member string before parking the slot
        self.nodes[x as usize].member = String::new();
        self.nodes[x as usize].links = Vec::new();
        self.free.push(x);
    }

    /// Returns the node at a 0-based rank using span arithmetic.
    fn node_at_rank(&self, rank: usize) -> Option<u32> {
        let target = rank + 1;
        let mut traversed = 0usize;
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            loop {
                let link = self.nodes[x as usize].links[i];
                if link.forward != NIL && traversed + link.span <= target {
                    traversed += link.span;
                    x = link.forward;
                } else {
                    break;
                }
            }
            if traversed == target {
                return Some(x);
            }
        }
        None
    }
}

impl Default for SortedSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(pairs: &[(String, f64)]) -> Vec<&str> {
        pairs.iter().map(|(m, _)| m.as_str()).collect()
    }

    #[test]
    fn insert_and_score() {
        let mut zs = SortedSet::new();
        assert!(zs.insert("alice", 100.0));
        assert_eq!(zs.score("alice"), Some(100.0));
        assert_eq!(zs.len(), 1);
    }

    #[test]
    fn update_returns_false() {
        let mut zs = SortedSet::new();
        assert!(zs.insert("alice", 100.0));
        assert!(!zs.insert("alice", 200.0));
        assert_eq!(zs.score("alice"), Some(200.0));
        assert_eq!(zs.len(), 1);
    }

    #[test]
    fn same_score_reinsert_is_noop() {
        let mut zs = SortedSet::new();
        zs.insert("alice", 1.0);
        assert!(!zs.insert("alice", 1.0));
        assert_eq!(zs.len(), 1);
    }

    #[test]
    fn ordering_by_score_then_member() {
        let mut zs = SortedSet::new();
        zs.insert("b", 2.0);
        zs.insert("a", 1.0);
        zs.insert("c", 1.5);

        let all = zs.range_by_rank(0, -1);
        assert_eq!(members(&all), vec!["a", "c", "b"]);

        zs.insert("bob", 1.0);
        zs.insert("amy", 1.0);
        let all = zs.range_by_rank(0, -1);
        assert_eq!(members(&all), vec!["a", "amy", "bob", "c", "b"]);
    }

    #[test]
    fn rank_is_zero_based() {
        let mut zs = SortedSet::new();
        zs.insert("c", 300.0);
        zs.insert("a", 100.0);
        zs.insert("b", 200.0);

        assert_eq!(zs.rank("a"), Some(0));
        assert_eq!(zs.rank("b"), Some(1));
        assert_eq!(zs.rank("c"), Some(2));
        assert_eq!(zs.rank("missing"), None);
    }

    #[test]
    fn remove_updates_ranks() {
        let mut zs = SortedSet::new();
        for (m, s) in [("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)] {
            zs.insert(m, s);
        }
        assert!(zs.remove("b"));
        assert!(!zs.remove("b"));
        assert_eq!(zs.len(), 3);
        assert_eq!(zs.rank("a"), Some(0));
        assert_eq!(zs.rank("c"), Some(1));
        assert_eq!(zs.rank("d"), Some(2));
        assert_eq!(zs.score("b"), None);
    }

    #[test]
    fn spans_stay_consistent_under_churn() {
        let mut zs = SortedSet::new();
        for i in 0..200 {
            zs.insert(&format!("m{i:03}"), i as f64);
        }
        // remove every third member
        for i in (0..200).step_by(3) {
            zs.remove(&format!("m{i:03}"));
        }
        // every surviving member's rank must match its position in the
        // full enumeration
        let all = zs.range_by_rank(0, -1);
        assert_eq!(all.len(), zs.len());
        for (expected_rank, (member, _)) in all.iter().enumerate() {
            assert_eq!(zs.rank(member), Some(expected_rank), "rank of {member}");
        }
    }

    #[test]
    fn range_by_rank_negative_indices() {
        let mut zs = SortedSet::new();
        for (m, s) in [("a", 1.0), ("b", 2.0), ("c", 3.0)] {
            zs.insert(m, s);
        }
        assert_eq!(members(&zs.range_by_rank(-2, -1)), vec!["b", "c"]);
        assert_eq!(members(&zs.range_by_rank(0, 100)), vec!["a", "b", "c"]);
        assert!(zs.range_by_rank(2, 1).is_empty());
        assert!(SortedSet::new().range_by_rank(0, -1).is_empty());
    }

    #[test]
    fn range_by_score_inclusive() {
        let mut zs = SortedSet::new();
        for (m, s) in [("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)] {
            zs.insert(m, s);
        }
        assert_eq!(members(&zs.range_by_score(2.0, 3.0)), vec!["b", "c"]);
        assert_eq!(members(&zs.range_by_score(0.0, 10.0)), vec!["a", "b", "c", "d"]);
        assert!(zs.range_by_score(5.0, 10.0).is_empty());
        assert!(zs.range_by_score(3.0, 2.0).is_empty());
    }

    #[test]
    fn incr_by_creates_and_reorders() {
        let mut zs = SortedSet::new();
        zs.insert("a", 1.0);
        zs.insert("b", 2.0);
        zs.insert("c", 1.5);

        // matches ZINCRBY semantics: create at delta when absent
        assert_eq!(zs.incr_by("new", 3.0), 3.0);
        assert_eq!(zs.incr_by("a", 10.0), 11.0);

        let all = zs.range_by_rank(0, -1);
        assert_eq!(members(&all), vec!["c", "b", "new", "a"]);
    }

    #[test]
    fn update_score_changes_rank() {
        let mut zs = SortedSet::new();
        zs.insert("a", 10.0);
        zs.insert("b", 20.0);
        zs.insert("c", 30.0);

        zs.insert("a", 50.0);
        assert_eq!(zs.rank("a"), Some(2));
        assert_eq!(zs.rank("b"), Some(0));
    }

    #[test]
    fn infinities_sort_at_the_ends() {
        let mut zs = SortedSet::new();
        zs.insert("mid", 0.0);
        zs.insert("top", f64::INFINITY);
        zs.insert("bottom", f64::NEG_INFINITY);

        let all = zs.range_by_rank(0, -1);
        assert_eq!(members(&all), vec!["bottom", "mid", "top"]);
    }

    #[test]
    fn iter_matches_range() {
        let mut zs = SortedSet::new();
        for i in 0..50 {
            zs.insert(&format!("m{i}"), (50 - i) as f64);
        }
        let via_iter: Vec<String> = zs.iter().map(|(m, _)| m.to_owned()).collect();
        let via_range: Vec<String> = zs
            .range_by_rank(0, -1)
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        assert_eq!(via_iter, via_range);
    }

    #[test]
    fn arena_slots_are_reused() {
        let mut zs = SortedSet::new();
        for i in 0..10 {
            zs.insert(&format!("m{i}"), i as f64);
        }
        let allocated = zs.nodes.len();
        for i in 0..10 {
            zs.remove(&format!("m{i}"));
        }
        for i in 0..10 {
            zs.insert(&format!("n{i}"), i as f64);
        }
        assert_eq!(zs.nodes.len(), allocated);
        assert_eq!(zs.len(), 10);
    }

    #[test]
    fn drain_to_empty_and_refill() {
        let mut zs = SortedSet::new();
        zs.insert("only", 1.0);
        zs.remove("only");
        assert!(zs.is_empty());
        assert!(zs.range_by_rank(0, -1).is_empty());
        assert!(zs.iter().next().is_none());

        zs.insert("back", 2.0);
        assert_eq!(zs.rank("back"), Some(0));
    }
}
