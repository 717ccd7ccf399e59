//! Sharded dictionary
//!
//! Routes each key to one of N partitions by `hash(key) mod N`. Every partition
//! sits behind its own async mutex; there is no ordering between shards.

use std::collections::{BTreeMap, BTreeSet};

use tokio::sync::{Mutex, MutexGuard};

use crate::error::{OptiError, Result};

use super::{apply, hash_key, Dictionary, Value};

type Shard = Box<dyn Dictionary>;

/// N independently serialized dictionary partitions
pub struct ShardedDictionary {
    shards: Vec<Mutex<Shard>>,
}

impl ShardedDictionary {
    pub fn new(shards: Vec<Shard>) -> Result<Self> {
        if shards.is_empty() {
            return Err(OptiError::Config(
                "sharded dictionary needs at least one shard".to_string(),
            ));
        }
        Ok(Self {
            shards: shards.into_iter().map(Mutex::new).collect(),
        })
    }

    /// Number of shards
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard owning `key`
    pub fn shard_for(&self, key: &str) -> usize {
        (hash_key(key) % self.shards.len() as u64) as usize
    }

    /// Lock every shard owning one of `keys`
    ///
    /// Shards are acquired in ascending index order, so two transactions with
    /// overlapping key sets can never deadlock. The guard keeps all of them
    /// held until dropped.
    pub async fn lock<'k, I>(&self, keys: I) -> ShardGuard<'_>
    where
        I: IntoIterator<Item = &'k str>,
    {
        let indices: BTreeSet<usize> = keys.into_iter().map(|k| self.shard_for(k)).collect();
        self.lock_indices(indices).await
    }

    /// Lock every shard (checkpoints, shutdown)
    pub async fn lock_all(&self) -> ShardGuard<'_> {
        self.lock_indices(0..self.shards.len()).await
    }

    async fn lock_indices<I>(&self, indices: I) -> ShardGuard<'_>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut guards = BTreeMap::new();
        for index in indices {
            guards.insert(index, self.shards[index].lock().await);
        }
        ShardGuard {
            router: self,
            guards,
        }
    }

    // =========================================================================
    // Single-key convenience (each call locks one shard)
    // =========================================================================

    pub async fn read(&self, key: &str) -> Result<Option<Value>> {
        self.shards[self.shard_for(key)].lock().await.read(key).await
    }

    pub async fn write(&self, key: &str, value: Value) -> Result<()> {
        self.shards[self.shard_for(key)]
            .lock()
            .await
            .write(key, value)
            .await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.shards[self.shard_for(key)].lock().await.remove(key).await
    }

    /// Flush every shard under a single all-shard lock, `last` key's shard last
    pub async fn checkpoint(&self, last: Option<&str>) -> Result<()> {
        self.lock_all().await.flush(last).await
    }

    /// Run housekeeping on each shard, one shard lock at a time
    pub async fn maintain(&self) -> Result<()> {
        for shard in &self.shards {
            shard.lock().await.maintain().await?;
        }
        Ok(())
    }

    /// Sum of shard footprints
    pub async fn footprint(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock().await.footprint();
        }
        total
    }
}

/// A set of locked shards
///
/// Reads and writes through the guard go straight to the owning partition;
/// touching a key whose shard is not part of the set is an error.
pub struct ShardGuard<'a> {
    router: &'a ShardedDictionary,
    guards: BTreeMap<usize, MutexGuard<'a, Shard>>,
}

impl<'a> ShardGuard<'a> {
    fn shard_mut(&mut self, key: &str) -> Result<&mut Shard> {
        let index = self.router.shard_for(key);
        self.guards
            .get_mut(&index)
            .map(|guard| &mut **guard)
            .ok_or_else(|| {
                OptiError::Storage(format!("shard {} for key '{}' is not locked", index, key))
            })
    }

    pub async fn read(&mut self, key: &str) -> Result<Option<Value>> {
        self.shard_mut(key)?.read(key).await
    }

    pub async fn write(&mut self, key: &str, value: Value) -> Result<()> {
        self.shard_mut(key)?.write(key, value).await
    }

    pub async fn remove(&mut self, key: &str) -> Result<()> {
        self.shard_mut(key)?.remove(key).await
    }

    /// Write `Some(value)` or remove on `None`
    pub async fn apply(&mut self, key: &str, value: Option<Value>) -> Result<()> {
        apply(self.shard_mut(key)?, key, value).await
    }

    /// Number of shards held
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Whether any held shard wants a flush
    pub fn needs_flush(&self) -> bool {
        self.guards.values().any(|shard| shard.needs_flush())
    }

    /// Flush every held shard; the shard owning `last` (if held) goes last
    pub async fn flush(&mut self, last: Option<&str>) -> Result<()> {
        let deferred = last.map(|key| self.router.shard_for(key));

        for (index, shard) in self.guards.iter_mut() {
            if Some(*index) != deferred {
                shard.flush().await?;
            }
        }
        if let Some(index) = deferred {
            if let Some(shard) = self.guards.get_mut(&index) {
                shard.flush().await?;
            }
        }
        Ok(())
    }
}
