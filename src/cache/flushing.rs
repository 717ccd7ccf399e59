//! Flushing cache
//!
//! Writes stay in memory as dirty entries and reach the backing store in
//! batches. Until a dirty entry is flushed the cache is its only owner; once
//! flushed, durability of that value belongs to the backing store.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::dict::{apply, Dictionary, Value};
use crate::error::Result;

use super::resident::IndexedMap;
use super::{entry_cost, CacheEntry, CacheStats};

/// Dirty entries sampled per `maintain` call
pub const DEFAULT_FLUSH_BATCH: usize = 64;

/// Write-back cache with random flush and random eviction
pub struct FlushingCache<D> {
    backing: D,
    resident: IndexedMap<CacheEntry>,
    dirty: IndexedMap<()>,
    footprint: usize,
    soft_limit: usize,
    flush_batch: usize,
    stale_after: Duration,
    rng: SmallRng,
    stats: CacheStats,
}

impl<D: Dictionary> FlushingCache<D> {
    /// `stale_after`: minimum idle time before `maintain` flushes a dirty entry
    pub fn new(backing: D, soft_limit: usize, stale_after: Duration) -> Self {
        Self {
            backing,
            resident: IndexedMap::new(),
            dirty: IndexedMap::new(),
            footprint: 0,
            soft_limit,
            flush_batch: DEFAULT_FLUSH_BATCH,
            stale_after,
            rng: SmallRng::from_entropy(),
            stats: CacheStats::default(),
        }
    }

    /// Override how many dirty entries `maintain` samples
    pub fn with_flush_batch(mut self, batch: usize) -> Self {
        self.flush_batch = batch.max(1);
        self
    }

    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    pub fn resident_len(&self) -> usize {
        self.resident.len()
    }

    pub fn resident_bytes(&self) -> usize {
        self.footprint
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn backing(&self) -> &D {
        &self.backing
    }

    fn store(&mut self, key: &str, entry: CacheEntry) {
        let cost = entry_cost(key, &entry.value);
        if entry.dirty {
            self.dirty.insert(key, ());
        }
        if let Some(old) = self.resident.insert(key, entry) {
            self.footprint -= entry_cost(key, &old.value);
        }
        self.footprint += cost;
    }

    /// Write one dirty entry to the backing store and mark it clean
    async fn flush_key(&mut self, key: &str) -> Result<()> {
        let value = match self.resident.get(key) {
            Some(entry) if entry.dirty => entry.value.clone(),
            _ => {
                self.dirty.remove(key);
                return Ok(());
            }
        };

        apply(&mut self.backing, key, value).await?;

        if let Some(entry) = self.resident.get_mut(key) {
            entry.dirty = false;
        }
        self.dirty.remove(key);
        self.stats.flushes += 1;
        Ok(())
    }

    /// Evict random entries (flushing them first if dirty) until under budget
    async fn relieve_pressure(&mut self) -> Result<()> {
        while self.footprint > self.soft_limit {
            let Some(victim) = self.resident.pick(&mut self.rng) else {
                break;
            };
            if self.dirty.contains(&victim) {
                self.flush_key(&victim).await?;
            }
            if let Some(entry) = self.resident.remove(&victim) {
                self.footprint -= entry_cost(&victim, &entry.value);
                self.stats.evictions += 1;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<D: Dictionary> Dictionary for FlushingCache<D> {
    async fn read(&mut self, key: &str) -> Result<Option<Value>> {
        if let Some(entry) = self.resident.get_mut(key) {
            entry.touched = Instant::now();
            self.stats.hits += 1;
            return Ok(entry.value.clone());
        }

        self.stats.misses += 1;
        let value = self.backing.read(key).await?;
        self.store(key, CacheEntry::clean(value.clone()));
        self.relieve_pressure().await?;
        Ok(value)
    }

    async fn write(&mut self, key: &str, value: Value) -> Result<()> {
        self.store(key, CacheEntry::dirty(Some(value)));
        self.relieve_pressure().await
    }

    async fn remove(&mut self, key: &str) -> Result<()> {
        self.store(key, CacheEntry::dirty(None));
        self.relieve_pressure().await
    }

    fn footprint(&self) -> usize {
        self.footprint + self.backing.footprint()
    }

    fn needs_flush(&self) -> bool {
        self.backing.needs_flush()
    }

    /// Write back every dirty entry, then flush the backing store
    async fn flush(&mut self) -> Result<()> {
        let keys: Vec<String> = self.dirty.iter().map(|(k, _)| k.to_string()).collect();
        for key in keys {
            self.flush_key(&key).await?;
        }
        self.backing.flush().await
    }

    /// Flush a random sample of dirty entries that have been idle long enough
    async fn maintain(&mut self) -> Result<()> {
        let samples = self.flush_batch.min(self.dirty.len());
        for _ in 0..samples {
            let Some(key) = self.dirty.pick(&mut self.rng) else {
                break;
            };
            let stale = self
                .resident
                .get(&key)
                .map_or(true, |entry| entry.touched.elapsed() >= self.stale_after);
            if stale {
                self.flush_key(&key).await?;
            }
        }
        self.backing.maintain().await
    }
}
