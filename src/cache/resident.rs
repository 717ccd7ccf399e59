//! Indexed resident set
//!
//! A map that also supports picking a uniformly random entry in O(1): entries
//! live in a dense vector, a hash index maps key → position, and removal
//! swaps the last entry into the hole.

use std::collections::HashMap;

use rand::Rng;

pub(crate) struct IndexedMap<V> {
    entries: Vec<(String, V)>,
    positions: HashMap<String, usize>,
}

impl<V> IndexedMap<V> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    pub(crate) fn get(&self, key: &str) -> Option<&V> {
        self.positions.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        match self.positions.get(key) {
            Some(&pos) => Some(&mut self.entries[pos].1),
            None => None,
        }
    }

    /// Insert or replace; returns the previous value
    pub(crate) fn insert(&mut self, key: &str, value: V) -> Option<V> {
        if let Some(&pos) = self.positions.get(key) {
            return Some(std::mem::replace(&mut self.entries[pos].1, value));
        }
        self.positions.insert(key.to_string(), self.entries.len());
        self.entries.push((key.to_string(), value));
        None
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<V> {
        let pos = self.positions.remove(key)?;
        let (_, value) = self.entries.swap_remove(pos);
        if let Some((moved, _)) = self.entries.get(pos) {
            self.positions.insert(moved.clone(), pos);
        }
        Some(value)
    }

    /// Uniformly random key
    pub(crate) fn pick<R: Rng>(&self, rng: &mut R) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let pos = rng.gen_range(0..self.entries.len());
        Some(self.entries[pos].0.clone())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
