// SPDX-License-Identifier: MIT OR Apache-2.0
//! Skip-list ordered index.
//!
//! The slab keys every live block by its highest owned record index here, so
//! the current upload size is one lookup of the maximum instead of a scan
//! over all blocks. Nodes live in an arena and link to each other by slot
//! index.

const MAX_LEVEL: usize = 24;
const NIL: usize = usize::MAX;
const HEAD: usize = 0;

#[derive(Debug, Clone)]
struct SkipNode<K, V> {
    /// `None` only for the head sentinel and vacant slots
    entry: Option<(K, V)>,
    /// Successor per level; `forward.len()` is the node height
    forward: Vec<usize>,
}

/// Ordered map with expected O(log n) insert, remove and lookup
#[derive(Debug, Clone)]
pub struct OrderIndex<K, V> {
    nodes: Vec<SkipNode<K, V>>,
    vacant: Vec<usize>,
    /// Last node on level 0, `HEAD` when empty
    tail: usize,
    level: usize,
    len: usize,
    rng: u64,
}

impl<K: Ord + Copy, V: Copy> OrderIndex<K, V> {
    /// Create an empty index
    pub fn new() -> Self {
        Self::with_seed(0x9E37_79B9_7F4A_7C15)
    }

    /// Create an empty index whose level generator starts from `seed`
    pub fn with_seed(seed: u64) -> Self {
        Self {
            nodes: vec![SkipNode {
                entry: None,
                forward: vec![NIL; MAX_LEVEL],
            }],
            vacant: Vec::new(),
            tail: HEAD,
            level: 1,
            len: 0,
            rng: seed | 1,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entry with the largest key
    pub fn max(&self) -> Option<(K, V)> {
        self.nodes[self.tail].entry
    }

    /// Entry with the smallest key
    pub fn min(&self) -> Option<(K, V)> {
        match self.nodes[HEAD].forward[0] {
            NIL => None,
            first => self.nodes[first].entry,
        }
    }

    /// Value stored under `key`
    pub fn get(&self, key: &K) -> Option<V> {
        let mut current = HEAD;
        for lvl in (0..self.level).rev() {
            current = self.advance(current, lvl, key);
        }
        match self.nodes[current].forward[0] {
            NIL => None,
            next => match self.nodes[next].entry {
                Some((k, v)) if k == *key => Some(v),
                _ => None,
            },
        }
    }

    /// Whether `key` is present
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace the value under `key`, returning the previous value
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let update = self.search_path(&key);

        let candidate = self.nodes[update[0]].forward[0];
        if candidate != NIL {
            if let Some((k, v)) = self.nodes[candidate].entry.as_mut() {
                if *k == key {
                    return Some(std::mem::replace(v, value));
                }
            }
        }

        let height = self.random_level();
        if height > self.level {
            self.level = height;
        }

        let slot = self.allocate(key, value, height);
        for (lvl, &pred) in update.iter().enumerate().take(height) {
            self.nodes[slot].forward[lvl] = self.nodes[pred].forward[lvl];
            self.nodes[pred].forward[lvl] = slot;
        }

        if self.nodes[slot].forward[0] == NIL {
            self.tail = slot;
        }

        self.len += 1;
        None
    }

    /// Remove `key`, returning its value
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let update = self.search_path(key);

        let target = self.nodes[update[0]].forward[0];
        if target == NIL {
            return None;
        }
        let (k, v) = self.nodes[target].entry?;
        if k != *key {
            return None;
        }

        let height = self.nodes[target].forward.len();
        for (lvl, &pred) in update.iter().enumerate().take(height) {
            if self.nodes[pred].forward[lvl] == target {
                self.nodes[pred].forward[lvl] = self.nodes[target].forward[lvl];
            }
        }

        if self.tail == target {
            self.tail = update[0];
        }

        while self.level > 1 && self.nodes[HEAD].forward[self.level - 1] == NIL {
            self.level -= 1;
        }

        self.nodes[target].entry = None;
        self.nodes[target].forward.clear();
        self.vacant.push(target);
        self.len -= 1;
        Some(v)
    }

    /// Entries in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = (K, V)> + '_ {
        let mut current = self.nodes[HEAD].forward[0];
        std::iter::from_fn(move || {
            if current == NIL {
                return None;
            }
            let node = &self.nodes[current];
            current = node.forward[0];
            node.entry
        })
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[HEAD].forward.iter_mut().for_each(|f| *f = NIL);
        self.vacant.clear();
        self.tail = HEAD;
        self.level = 1;
        self.len = 0;
    }

    /// Furthest node on `lvl` whose key is below `key`, starting at `from`
    fn advance(&self, mut from: usize, lvl: usize, key: &K) -> usize {
        loop {
            let next = self.nodes[from].forward[lvl];
            if next == NIL {
                return from;
            }
            match &self.nodes[next].entry {
                Some((k, _)) if k < key => from = next,
                _ => return from,
            }
        }
    }

    /// Predecessor of `key` on every level
    fn search_path(&self, key: &K) -> [usize; MAX_LEVEL] {
        let mut update = [HEAD; MAX_LEVEL];
        let mut current = HEAD;
        for lvl in (0..self.level).rev() {
            current = self.advance(current, lvl, key);
            update[lvl] = current;
        }
        update
    }

    fn allocate(&mut self, key: K, value: V, height: usize) -> usize {
        let node = SkipNode {
            entry: Some((key, value)),
            forward: vec![NIL; height],
        };
        match self.vacant.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Geometric height with p = 1/2 from an xorshift64 stream
    fn random_level(&mut self) -> usize {
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 7;
        self.rng ^= self.rng << 17;
        (self.rng.trailing_ones() as usize + 1).min(MAX_LEVEL)
    }
}

impl<K: Ord + Copy, V: Copy> Default for OrderIndex<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_max() {
        let mut index = OrderIndex::new();
        assert_eq!(index.max(), None);

        index.insert(5usize, 'a');
        index.insert(2, 'b');
        index.insert(9, 'c');
        index.insert(7, 'd');

        assert_eq!(index.len(), 4);
        assert_eq!(index.max(), Some((9, 'c')));
        assert_eq!(index.min(), Some((2, 'b')));
        assert_eq!(index.get(&7), Some('d'));
        assert_eq!(index.get(&6), None);
    }

    #[test]
    fn test_remove_max_falls_back() {
        let mut index = OrderIndex::new();
        for k in [3usize, 1, 4, 10, 5] {
            index.insert(k, k * 10);
        }

        assert_eq!(index.remove(&10), Some(100));
        assert_eq!(index.max(), Some((5, 50)));
        assert_eq!(index.remove(&5), Some(50));
        assert_eq!(index.max(), Some((4, 40)));
        assert_eq!(index.remove(&42), None);

        for k in [1usize, 3, 4] {
            index.remove(&k);
        }
        assert!(index.is_empty());
        assert_eq!(index.max(), None);
        assert_eq!(index.min(), None);
    }

    #[test]
    fn test_replace_existing() {
        let mut index = OrderIndex::new();
        assert_eq!(index.insert(1u32, 1u32), None);
        assert_eq!(index.insert(1, 2), Some(1));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&1), Some(2));
    }

    #[test]
    fn test_matches_sorted_model() {
        let mut index = OrderIndex::with_seed(7);
        let mut model = std::collections::BTreeMap::new();

        // Deterministic pseudo-random sequence of inserts and removals
        let mut x: u64 = 12345;
        for _ in 0..5000 {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let key = (x >> 33) % 500;
            if x % 3 == 0 {
                assert_eq!(index.remove(&key), model.remove(&key));
            } else {
                assert_eq!(index.insert(key, x), model.insert(key, x));
            }
            assert_eq!(index.len(), model.len());
            assert_eq!(index.max(), model.last_key_value().map(|(k, v)| (*k, *v)));
        }

        let collected: Vec<_> = index.iter().collect();
        let expected: Vec<_> = model.into_iter().collect();
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_slots_are_reused() {
        let mut index = OrderIndex::new();
        for k in 0..100usize {
            index.insert(k, ());
        }
        for k in 0..100usize {
            index.remove(&k);
        }
        for k in 0..100usize {
            index.insert(k, ());
        }
        assert_eq!(index.nodes.len(), 101);

        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.iter().count(), 0);
    }
}
