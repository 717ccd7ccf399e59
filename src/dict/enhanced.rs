//! Enhanced dictionary
//!
//! Keeps the key map resident but stores every value in a swap allocator,
//! so large or cold values stay out of the live heap.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::swap::{SwapAllocator, SwapHandle};

use super::{Dictionary, Value, ENTRY_OVERHEAD};

/// Partition of key → swap handle
///
/// Each handle is owned by exactly one entry. A write allocates the new blob
/// before freeing the old one, so an exhausted allocator leaves the previous
/// value intact and fails the write.
pub struct EnhancedDictionary {
    entries: HashMap<String, SwapHandle>,
    allocator: Arc<dyn SwapAllocator>,
    footprint: usize,
}

impl EnhancedDictionary {
    pub fn new(allocator: Arc<dyn SwapAllocator>) -> Self {
        Self {
            entries: HashMap::new(),
            allocator,
            footprint: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Dictionary for EnhancedDictionary {
    async fn read(&mut self, key: &str) -> Result<Option<Value>> {
        match self.entries.get_mut(key) {
            Some(handle) => self.allocator.read(handle).map(Some),
            None => Ok(None),
        }
    }

    async fn write(&mut self, key: &str, value: Value) -> Result<()> {
        let handle = self.allocator.allocate(&value)?;

        match self.entries.insert(key.to_string(), handle) {
            Some(previous) => self.allocator.free(previous)?,
            None => self.footprint += key.len() + ENTRY_OVERHEAD,
        }
        Ok(())
    }

    async fn remove(&mut self, key: &str) -> Result<()> {
        if let Some(handle) = self.entries.remove(key) {
            self.footprint -= key.len() + ENTRY_OVERHEAD;
            self.allocator.free(handle)?;
        }
        Ok(())
    }

    fn footprint(&self) -> usize {
        self.footprint
    }
}

impl Drop for EnhancedDictionary {
    fn drop(&mut self) {
        for (_, handle) in self.entries.drain() {
            if let Err(e) = self.allocator.free(handle) {
                tracing::warn!("Failed to release swap handle on drop: {}", e);
            }
        }
    }
}
