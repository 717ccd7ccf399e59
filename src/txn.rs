//! Transactions
//!
//! A transaction names keys to read back, expected values that gate the
//! writes, and the writes themselves. Conditions are evaluated first, all at
//! once, before any write of the same transaction is applied.

use std::collections::{BTreeMap, HashSet};

use crate::dict::Value;

/// One optimistic transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    /// Client-chosen identifier echoed in the reply
    pub id: String,

    /// Keys to report after the transaction resolves (duplicates allowed)
    pub reads: Vec<String>,

    /// Expected values; `None` means the key must be absent
    pub conditions: BTreeMap<String, Option<Value>>,

    /// New values; `None` removes the key
    pub writes: BTreeMap<String, Option<Value>>,
}

impl Transaction {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn read(mut self, key: impl Into<String>) -> Self {
        self.reads.push(key.into());
        self
    }

    /// Require `key` to hold `value` (an empty value also matches absence)
    pub fn expect(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(key.into(), Some(value.into()));
        self
    }

    /// Require `key` to be absent
    pub fn expect_absent(mut self, key: impl Into<String>) -> Self {
        self.conditions.insert(key.into(), None);
        self
    }

    pub fn write(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.writes.insert(key.into(), Some(value.into()));
        self
    }

    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.writes.insert(key.into(), None);
        self
    }

    /// Every key the transaction touches, possibly repeated
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.reads
            .iter()
            .map(String::as_str)
            .chain(self.conditions.keys().map(String::as_str))
            .chain(self.writes.keys().map(String::as_str))
    }

    /// `reads` with duplicates collapsed, first occurrence wins
    pub fn unique_reads(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.reads
            .iter()
            .map(String::as_str)
            .filter(|key| seen.insert(*key))
            .collect()
    }

    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Whether the stored `current` value satisfies `expected`
///
/// An expected empty value matches both an empty value and absence; an
/// expected `None` matches absence only.
pub fn condition_holds(expected: Option<&[u8]>, current: Option<&[u8]>) -> bool {
    match (expected, current) {
        (None, None) => true,
        (None, Some(_)) => false,
        (Some(expected), None) => expected.is_empty(),
        (Some(expected), Some(current)) => expected == current,
    }
}

/// Result of executing a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnOutcome {
    /// Whether every condition held and the writes were applied
    pub applied: bool,

    /// Value of each distinct read key after the transaction resolved
    pub values: Vec<(String, Option<Value>)>,
}

impl TxnOutcome {
    /// Value reported for `key`; `None` if the key was not read or is absent
    pub fn value(&self, key: &str) -> Option<&[u8]> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }
}
