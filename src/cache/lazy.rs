//! Lazy fan-out backing store
//!
//! The flushing cache's backing: a fixed number of slots, each holding a
//! dictionary built by a factory the first time a key routed to it is flushed.

use async_trait::async_trait;

use crate::dict::{hash_key, Dictionary, Value};
use crate::error::{OptiError, Result};

type Factory<D> = Box<dyn FnMut(usize) -> Result<D> + Send>;

pub struct LazyFanout<D> {
    slots: Vec<Option<D>>,
    factory: Factory<D>,
}

impl<D: Dictionary> LazyFanout<D> {
    /// `width` slots; `factory(index)` builds the dictionary for slot `index`
    pub fn new<F>(width: usize, factory: F) -> Result<Self>
    where
        F: FnMut(usize) -> Result<D> + Send + 'static,
    {
        if width == 0 {
            return Err(OptiError::Config("fan-out width must be at least 1".to_string()));
        }
        Ok(Self {
            slots: (0..width).map(|_| None).collect(),
            factory: Box::new(factory),
        })
    }

    /// Number of slots whose dictionary has been built
    pub fn materialized(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    fn index(&self, key: &str) -> usize {
        // Rotate so slot choice is independent of the shard choice made with
        // the same hash one layer up
        (hash_key(key).rotate_left(32) % self.slots.len() as u64) as usize
    }

    fn slot_or_build(&mut self, index: usize) -> Result<&mut D> {
        if self.slots[index].is_none() {
            let built = (self.factory)(index)?;
            self.slots[index] = Some(built);
        }
        self.slots[index]
            .as_mut()
            .ok_or_else(|| OptiError::Storage(format!("fan-out slot {} unavailable", index)))
    }
}

#[async_trait]
impl<D: Dictionary> Dictionary for LazyFanout<D> {
    async fn read(&mut self, key: &str) -> Result<Option<Value>> {
        let index = self.index(key);
        match self.slots[index].as_mut() {
            Some(dict) => dict.read(key).await,
            None => Ok(None),
        }
    }

    async fn write(&mut self, key: &str, value: Value) -> Result<()> {
        let index = self.index(key);
        self.slot_or_build(index)?.write(key, value).await
    }

    async fn remove(&mut self, key: &str) -> Result<()> {
        let index = self.index(key);
        match self.slots[index].as_mut() {
            Some(dict) => dict.remove(key).await,
            None => Ok(()),
        }
    }

    fn footprint(&self) -> usize {
        self.slots.iter().flatten().map(|dict| dict.footprint()).sum()
    }

    fn needs_flush(&self) -> bool {
        self.slots.iter().flatten().any(|dict| dict.needs_flush())
    }

    async fn flush(&mut self) -> Result<()> {
        for dict in self.slots.iter_mut().flatten() {
            dict.flush().await?;
        }
        Ok(())
    }

    async fn maintain(&mut self) -> Result<()> {
        for dict in self.slots.iter_mut().flatten() {
            dict.maintain().await?;
        }
        Ok(())
    }
}
