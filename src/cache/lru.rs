//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
struct Node<K> {
    key: K,
    prev: Option<usize>,
    next: Option<usize>,
}

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Keys live in a doubly linked list whose nodes are stored in a slot vector
/// and linked by index, plus a key -> slot index for O(1) lookup:
/// - Head = Least recently used
/// - Tail = Most recently used
///
/// `touch`, `remove` and `evict_oldest` are all O(1).
#[derive(Debug)]
pub struct LruTracker<K> {
    slots: Vec<Option<Node<K>>>,
    free: Vec<usize>,
    index: HashMap<K, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K> Default for LruTracker<K>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> LruTracker<K>
where
    K: Hash + Eq + Clone,
{
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    // == Touch ==
    /// Marks a key as most recently used (moves it to the tail).
    ///
    /// Unknown keys are inserted at the tail.
    pub fn touch(&mut self, key: &K) {
        if let Some(&slot) = self.index.get(key) {
            if self.tail != Some(slot) {
                self.detach(slot);
                self.attach_tail(slot);
            }
            return;
        }

        let node = Node {
            key: key.clone(),
            prev: None,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.index.insert(key.clone(), slot);
        self.attach_tail(slot);
    }

    // == Remove ==
    /// Removes a key from the tracker. Returns whether it was tracked.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(slot) => {
                self.release(slot);
                true
            }
            None => false,
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<K> {
        let slot = self.head?;
        let key = self.release(slot)?;
        self.index.remove(&key);
        Some(key)
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    // == Contains ==
    /// Checks if a key is being tracked.
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Iterates keys from least to most recently used.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            tracker: self,
            cursor: self.head,
        }
    }

    /// Collects the keys held in up to `max` slots starting at slot `start`.
    ///
    /// Returns the keys found and the slot to resume from, `None` once the
    /// slot vector is exhausted. Slot order is unrelated to recency; a key
    /// inserted between two calls may be skipped.
    pub fn scan(&self, start: usize, max: usize) -> (Vec<&K>, Option<usize>) {
        let end = start.saturating_add(max.max(1)).min(self.slots.len());
        let keys = self
            .slots
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .flatten()
            .map(|node| &node.key)
            .collect();
        let next = (end < self.slots.len()).then_some(end);
        (keys, next)
    }

    /// Drops every key.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    /// Releases spare capacity held by the slot vector and index.
    ///
    /// Trailing free slots are dropped; interior holes stay on the free list.
    pub fn shrink_to_fit(&mut self) {
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        let live = self.slots.len();
        self.free.retain(|&slot| slot < live);
        self.slots.shrink_to_fit();
        self.free.shrink_to_fit();
        self.index.shrink_to_fit();
    }

    /// Walks the list and checks it against the index.
    ///
    /// Returns a description of the first inconsistency found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = 0usize;
        let mut prev: Option<usize> = None;
        let mut cursor = self.head;

        while let Some(slot) = cursor {
            let node = self
                .node(slot)
                .ok_or_else(|| format!("list references empty slot {}", slot))?;
            if node.prev != prev {
                return Err(format!("broken back-link at slot {}", slot));
            }
            if self.index.get(&node.key) != Some(&slot) {
                return Err(format!("slot {} is not indexed under its key", slot));
            }
            seen += 1;
            if seen > self.index.len() {
                return Err("list is longer than the index".to_string());
            }
            prev = Some(slot);
            cursor = node.next;
        }

        if prev != self.tail {
            return Err("tail does not match the last node".to_string());
        }
        if seen != self.index.len() {
            return Err(format!(
                "list holds {} keys but index holds {}",
                seen,
                self.index.len()
            ));
        }
        Ok(())
    }

    fn node(&self, slot: usize) -> Option<&Node<K>> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, slot: usize) -> Option<&mut Node<K>> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// Unlinks a slot and puts it on the free list, returning its key.
    fn release(&mut self, slot: usize) -> Option<K> {
        self.detach(slot);
        let node = self.slots.get_mut(slot)?.take()?;
        self.free.push(slot);
        Some(node.key)
    }

    fn detach(&mut self, slot: usize) {
        let (prev, next) = match self.node(slot) {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.node_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.node_mut(slot) {
            node.prev = None;
            node.next = None;
        }
    }

    fn attach_tail(&mut self, slot: usize) {
        let old_tail = self.tail;
        if let Some(node) = self.node_mut(slot) {
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail {
            Some(t) => {
                if let Some(node) = self.node_mut(t) {
                    node.next = Some(slot);
                }
            }
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }
}

/// Iterator over tracked keys, least recently used first.
pub struct Iter<'a, K> {
    tracker: &'a LruTracker<K>,
    cursor: Option<usize>,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let tracker = self.tracker;
        let slot = self.cursor?;
        let node = tracker.slots.get(slot)?.as_ref()?;
        self.cursor = node.next;
        Some(&node.key)
    }
}
