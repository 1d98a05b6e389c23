// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recency-ordered index.
//!
//! Entries live in an arena and are threaded into a doubly-linked list by slot
//! index, oldest-used at the head and most-recently-used at the tail. A hash map
//! gives key lookup. All operations are O(1) except [`RecencyIndex::clear`] and
//! iteration.

use std::hash::Hash;

use hashbrown::HashMap;

use crate::entry::Entry;

/// Index of a node slot in the arena.
pub(crate) type NodeIndex = usize;

#[derive(Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) entry: Entry<V>,
    prev: Option<NodeIndex>,
    next: Option<NodeIndex>,
}

#[derive(Debug)]
pub(crate) struct RecencyIndex<K, V> {
    map: HashMap<K, NodeIndex>,

    /// Slot storage; `None` marks a free slot.
    nodes: Vec<Option<Node<K, V>>>,

    /// Free slots available for reuse.
    free: Vec<NodeIndex>,

    /// Least recently used.
    head: Option<NodeIndex>,

    /// Most recently used.
    tail: Option<NodeIndex>,
}

impl<K, V> Default for RecencyIndex<K, V> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }
}

impl<K, V> RecencyIndex<K, V>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn find(&self, key: &K) -> Option<NodeIndex> {
        self.map.get(key).copied()
    }

    /// The least recently used node.
    pub(crate) const fn front(&self) -> Option<NodeIndex> {
        self.head
    }

    pub(crate) fn node(&self, idx: NodeIndex) -> &Node<K, V> {
        self.nodes[idx].as_ref().expect("linked node index must refer to an occupied slot")
    }

    pub(crate) fn node_mut(&mut self, idx: NodeIndex) -> &mut Node<K, V> {
        self.nodes[idx].as_mut().expect("linked node index must refer to an occupied slot")
    }

    /// Links a new entry at the tail and registers it under `key`.
    ///
    /// The key must not already be present.
    pub(crate) fn push_back(&mut self, key: K, entry: Entry<V>) -> NodeIndex {
        debug_assert!(!self.map.contains_key(&key), "key is already indexed");

        let node = Node {
            key: key.clone(),
            entry,
            prev: None,
            next: None,
        };

        let idx = if let Some(idx) = self.free.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        };

        self.attach_back(idx);
        self.map.insert(key, idx);
        idx
    }

    /// Unlinks a node, erases its key and revokes its membership.
    ///
    /// Returns `None` if the slot is already free.
    pub(crate) fn remove(&mut self, idx: NodeIndex) -> Option<Node<K, V>> {
        if self.nodes.get(idx).is_none_or(Option::is_none) {
            return None;
        }

        self.detach(idx);
        let node = self.nodes[idx].take()?;
        debug_assert!(node.entry.membership().is_member(), "an occupied slot must hold a member entry");
        self.map.remove(&node.key);
        node.entry.membership().revoke();
        self.free.push(idx);
        Some(node)
    }

    /// Removes and returns the least recently used node.
    pub(crate) fn pop_front(&mut self) -> Option<Node<K, V>> {
        self.remove(self.head?)
    }

    /// Marks a node as most recently used.
    pub(crate) fn move_to_back(&mut self, idx: NodeIndex) {
        if self.tail == Some(idx) {
            return;
        }
        self.detach(idx);
        self.attach_back(idx);
    }

    /// Drops every node, revoking membership so waiters holding a revoked entry
    /// never touch a recycled slot.
    pub(crate) fn clear(&mut self) {
        for node in self.nodes.iter().flatten() {
            node.entry.membership().revoke();
        }
        self.map.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }

    /// Iterates nodes from least to most recently used.
    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            index: self,
            cursor: self.head,
        }
    }

    fn detach(&mut self, idx: NodeIndex) {
        let (prev, next) = {
            let node = self.node_mut(idx);
            (node.prev.take(), node.next.take())
        };

        match prev {
            Some(prev) => self.node_mut(prev).next = next,
            None => self.head = next,
        }

        match next {
            Some(next) => self.node_mut(next).prev = prev,
            None => self.tail = prev,
        }
    }

    fn attach_back(&mut self, idx: NodeIndex) {
        let old_tail = self.tail;
        {
            let node = self.node_mut(idx);
            node.prev = old_tail;
            node.next = None;
        }

        match old_tail {
            Some(tail) => self.node_mut(tail).next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    /// Asserts that the map and the chain describe the same set of nodes and that
    /// the chain is a well-formed doubly-linked list.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let mut walked = 0;
        let mut prev = None;
        let mut cursor = self.head;

        while let Some(idx) = cursor {
            let node = self.node(idx);
            assert_eq!(node.prev, prev, "back link of node {idx} is broken");
            assert_eq!(self.map.get(&node.key), Some(&idx), "node {idx} is not indexed under its key");
            assert!(node.entry.membership().is_member(), "linked node {idx} lost its membership");
            walked += 1;
            prev = Some(idx);
            cursor = node.next;
        }

        assert_eq!(self.tail, prev, "tail does not match the end of the chain");
        assert_eq!(walked, self.map.len(), "chain length differs from the index size");
        assert_eq!(
            self.nodes.iter().filter(|slot| slot.is_some()).count(),
            walked,
            "occupied slots differ from the chain length"
        );
    }
}

/// Iterator over the nodes of a [`RecencyIndex`] in recency order.
#[derive(Debug)]
pub(crate) struct Iter<'a, K, V> {
    index: &'a RecencyIndex<K, V>,
    cursor: Option<NodeIndex>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V>
where
    K: Eq + Hash + Clone,
{
    type Item = &'a Node<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.index.node(self.cursor?);
        self.cursor = node.next;
        Some(node)
    }
}
