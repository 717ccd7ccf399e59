//! Write-through cache

use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::dict::{Dictionary, Value};
use crate::error::Result;

use super::resident::IndexedMap;
use super::{entry_cost, CacheEntry, CacheStats};

/// Read cache whose writes always reach the backing store first
///
/// A failed backing write leaves the cache untouched, so the cache never
/// holds a value the backing store does not.
pub struct WriteThroughCache<D> {
    backing: D,
    resident: IndexedMap<CacheEntry>,
    footprint: usize,
    soft_limit: usize,
    rng: SmallRng,
    stats: CacheStats,
}

impl<D: Dictionary> WriteThroughCache<D> {
    pub fn new(backing: D, soft_limit: usize) -> Self {
        Self {
            backing,
            resident: IndexedMap::new(),
            footprint: 0,
            soft_limit,
            rng: SmallRng::from_entropy(),
            stats: CacheStats::default(),
        }
    }

    /// Bytes held by resident entries (backing store excluded)
    pub fn resident_bytes(&self) -> usize {
        self.footprint
    }

    pub fn resident_len(&self) -> usize {
        self.resident.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn backing(&self) -> &D {
        &self.backing
    }

    fn store(&mut self, key: &str, value: Option<Value>) {
        let cost = entry_cost(key, &value);
        if let Some(old) = self.resident.insert(key, CacheEntry::clean(value)) {
            self.footprint -= entry_cost(key, &old.value);
        }
        self.footprint += cost;
        self.evict();
    }

    fn evict(&mut self) {
        while self.footprint > self.soft_limit {
            let Some(victim) = self.resident.pick(&mut self.rng) else {
                break;
            };
            if let Some(entry) = self.resident.remove(&victim) {
                self.footprint -= entry_cost(&victim, &entry.value);
                self.stats.evictions += 1;
            }
        }
    }
}

#[async_trait]
impl<D: Dictionary> Dictionary for WriteThroughCache<D> {
    async fn read(&mut self, key: &str) -> Result<Option<Value>> {
        if let Some(entry) = self.resident.get_mut(key) {
            entry.touched = std::time::Instant::now();
            self.stats.hits += 1;
            return Ok(entry.value.clone());
        }

        self.stats.misses += 1;
        let value = self.backing.read(key).await?;
        self.store(key, value.clone());
        Ok(value)
    }

    async fn write(&mut self, key: &str, value: Value) -> Result<()> {
        self.backing.write(key, value.clone()).await?;
        self.store(key, Some(value));
        Ok(())
    }

    async fn remove(&mut self, key: &str) -> Result<()> {
        self.backing.remove(key).await?;
        self.store(key, None);
        Ok(())
    }

    fn footprint(&self) -> usize {
        self.footprint + self.backing.footprint()
    }

    fn needs_flush(&self) -> bool {
        self.backing.needs_flush()
    }

    async fn flush(&mut self) -> Result<()> {
        self.backing.flush().await
    }

    async fn maintain(&mut self) -> Result<()> {
        self.backing.maintain().await
    }
}
