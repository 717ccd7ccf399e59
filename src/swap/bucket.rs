//! Swap bucket
//!
//! A fixed-capacity arena carved out of an anonymous memory map, plus a
//! generation-stamped slot table that hands out (slot, stamp) pairs.

use std::collections::BTreeMap;

use memmap2::MmapMut;

use crate::error::{OptiError, Result};

/// A contiguous byte range inside the arena
#[derive(Debug, Clone, Copy)]
struct Extent {
    offset: usize,
    len: usize,
}

#[derive(Debug)]
struct Slot {
    stamp: u32,
    extent: Option<Extent>,
}

/// One bucket of a swap allocator
///
/// Free space is kept as a map of offset → length; neighbouring extents are
/// merged on release so the arena never fragments into unusable slivers when
/// blobs of the same sizes are freed and reallocated.
pub(super) struct Bucket {
    arena: MmapMut,
    free: BTreeMap<usize, usize>,
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    used: usize,
    live: usize,
}

impl Bucket {
    /// Map a new anonymous arena of `capacity` bytes
    pub(super) fn new(capacity: usize) -> Result<Self> {
        let arena = MmapMut::map_anon(capacity)?;
        let mut free = BTreeMap::new();
        free.insert(0, capacity);

        Ok(Self {
            arena,
            free,
            slots: Vec::new(),
            vacant: Vec::new(),
            used: 0,
            live: 0,
        })
    }

    /// Copy `bytes` into the arena; `None` when no free extent is large enough
    pub(super) fn place(&mut self, bytes: &[u8]) -> Option<(u32, u32)> {
        let extent = self.carve(bytes.len())?;
        self.arena[extent.offset..extent.offset + extent.len].copy_from_slice(bytes);

        let slot = match self.vacant.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(Slot { stamp: 0, extent: None });
                (self.slots.len() - 1) as u32
            }
        };

        let entry = &mut self.slots[slot as usize];
        entry.extent = Some(extent);
        self.used += extent.len;
        self.live += 1;

        Some((slot, entry.stamp))
    }

    /// Copy the blob out of `slot`, validating the stamp
    pub(super) fn read(&self, slot: u32, stamp: u32) -> Result<Vec<u8>> {
        let extent = self.lookup(slot, stamp)?;
        Ok(self.arena[extent.offset..extent.offset + extent.len].to_vec())
    }

    /// Return `slot`'s extent to the free map and retire its stamp
    pub(super) fn release(&mut self, slot: u32, stamp: u32) -> Result<usize> {
        let extent = self.lookup(slot, stamp)?;

        let entry = &mut self.slots[slot as usize];
        entry.extent = None;
        entry.stamp = entry.stamp.wrapping_add(1);
        self.vacant.push(slot);

        self.used -= extent.len;
        self.live -= 1;
        self.give_back(extent);

        Ok(extent.len)
    }

    pub(super) fn capacity(&self) -> usize {
        self.arena.len()
    }

    pub(super) fn used(&self) -> usize {
        self.used
    }

    pub(super) fn live(&self) -> usize {
        self.live
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn lookup(&self, slot: u32, stamp: u32) -> Result<Extent> {
        let entry = self
            .slots
            .get(slot as usize)
            .ok_or_else(|| OptiError::InvalidHandle(format!("slot {} was never issued", slot)))?;

        match entry.extent {
            Some(extent) if entry.stamp == stamp => Ok(extent),
            _ => Err(OptiError::InvalidHandle(format!(
                "slot {} stamp {} is stale",
                slot, stamp
            ))),
        }
    }

    /// First-fit allocation out of the free map
    fn carve(&mut self, len: usize) -> Option<Extent> {
        if len == 0 {
            return Some(Extent { offset: 0, len: 0 });
        }

        let (offset, available) = self
            .free
            .iter()
            .find(|(_, available)| **available >= len)
            .map(|(&offset, &available)| (offset, available))?;

        self.free.remove(&offset);
        if available > len {
            self.free.insert(offset + len, available - len);
        }

        Some(Extent { offset, len })
    }

    /// Insert an extent into the free map, merging with its neighbours
    fn give_back(&mut self, extent: Extent) {
        if extent.len == 0 {
            return;
        }

        let mut offset = extent.offset;
        let mut len = extent.len;

        if let Some((&prev_offset, &prev_len)) = self.free.range(..offset).next_back() {
            if prev_offset + prev_len == offset {
                self.free.remove(&prev_offset);
                offset = prev_offset;
                len += prev_len;
            }
        }

        if let Some(&next_len) = self.free.get(&(offset + len)) {
            self.free.remove(&(offset + len));
            len += next_len;
        }

        self.free.insert(offset, len);
    }
}
