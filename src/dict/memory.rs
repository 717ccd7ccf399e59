//! Sequential-access dictionary
//!
//! The baseline partition: a plain in-memory map.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

use super::{Dictionary, Value, ENTRY_OVERHEAD};

/// In-memory partition; serialization comes from the owning shard lock
#[derive(Debug, Default)]
pub struct MemoryDictionary {
    entries: HashMap<String, Value>,
    footprint: usize,
}

impl MemoryDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Dictionary for MemoryDictionary {
    async fn read(&mut self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).cloned())
    }

    async fn write(&mut self, key: &str, value: Value) -> Result<()> {
        let added = value.len();
        match self.entries.insert(key.to_string(), value) {
            Some(old) => self.footprint = self.footprint - old.len() + added,
            None => self.footprint += key.len() + added + ENTRY_OVERHEAD,
        }
        Ok(())
    }

    async fn remove(&mut self, key: &str) -> Result<()> {
        if let Some(old) = self.entries.remove(key) {
            self.footprint -= key.len() + old.len() + ENTRY_OVERHEAD;
        }
        Ok(())
    }

    fn footprint(&self) -> usize {
        self.footprint
    }
}
