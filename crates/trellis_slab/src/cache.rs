// SPDX-License-Identifier: MIT OR Apache-2.0
//! The slab cache: one flat, growable array of fixed-size records.
//!
//! Callers request blocks of records, write typed fields into them and
//! release them again. The cache mirrors one GPU buffer, so the only size
//! that matters for uploads is [`SlabCache::active_size`]: one past the
//! highest record still owned by a live block. Gaps below that point are
//! uploaded too, which is why [`SlabCache::fill_all`] exists (seed a
//! harmless sentinel such as a primitive-restart index) and why
//! [`SlabCache::release_and_repack`] exists (pull the topmost block down
//! into a gap).

use crate::error::{Result, SlabError};
use crate::free_list::FreeRanges;
use crate::layout::{FieldLocation, FieldValue, RecordLayout};
use crate::order_index::OrderIndex;
use bytemuck::Pod;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;
use uuid::Uuid;

/// Unique identifier for a slab cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheId(pub Uuid);

impl CacheId {
    /// Create a new random cache ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CacheId {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a block of records owned by one caller
///
/// The handle stays valid across growth and repacking; it goes stale once
/// the block is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId {
    cache: CacheId,
    slot: u32,
    generation: u32,
}

impl BlockId {
    /// Cache this block was allocated from
    pub fn cache(&self) -> CacheId {
        self.cache
    }
}

#[derive(Debug, Clone)]
struct BlockSlot {
    generation: u32,
    /// Owned record runs in ascending order, `None` when the slot is vacant
    runs: Option<Vec<Range<usize>>>,
}

/// Data movement performed by [`SlabCache::release_and_repack`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// The block that moved; its handle is still valid
    pub block: BlockId,
    /// Record runs the block owned before the move
    pub old: Vec<Range<usize>>,
    /// Record runs the block owns now
    pub new: Vec<Range<usize>>,
}

impl Relocation {
    /// `(old_index, new_index)` for every record of the moved block, in block order
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.old
            .iter()
            .flat_map(Clone::clone)
            .zip(self.new.iter().flat_map(Clone::clone))
    }
}

/// Snapshot of cache occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlabStats {
    /// Records the backing storage can hold
    pub capacity: usize,
    /// Upload length in records
    pub active_size: usize,
    /// Records owned by live blocks
    pub live_records: usize,
    /// Records in the free list
    pub free_records: usize,
    /// Number of live blocks
    pub live_blocks: usize,
    /// Number of disjoint free ranges
    pub free_ranges: usize,
}

/// Flat record array with first-fit block allocation
///
/// Not internally synchronized; callers serialize access (see
/// [`crate::context::ContextLock`] for the render-thread convention).
#[derive(Debug, Clone)]
pub struct SlabCache {
    id: CacheId,
    layout: RecordLayout,
    storage: Vec<u8>,
    capacity: usize,
    free: FreeRanges,
    /// Live blocks keyed by their highest owned record index
    live: OrderIndex<usize, BlockId>,
    slots: Vec<BlockSlot>,
    vacant: Vec<u32>,
    live_records: usize,
    /// Record written by the last `fill_all`, also used for grown regions
    fill_pattern: Option<Vec<u8>>,
}

impl SlabCache {
    /// Create a cache for `layout` with room for `initial_capacity` records
    pub fn new(layout: RecordLayout, initial_capacity: usize) -> Self {
        let capacity = initial_capacity.max(1);
        Self {
            id: CacheId::new(),
            storage: vec![0; capacity * layout.record_size()],
            layout,
            capacity,
            free: FreeRanges::with_range(0..capacity),
            live: OrderIndex::new(),
            slots: Vec::new(),
            vacant: Vec::new(),
            live_records: 0,
            fill_pattern: None,
        }
    }

    /// Identifier of this cache
    pub fn id(&self) -> CacheId {
        self.id
    }

    /// Record layout
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Size of one record in bytes
    pub fn record_size(&self) -> usize {
        self.layout.record_size()
    }

    /// Records the backing storage can hold
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Upload length in records: one past the highest live record, or 0
    pub fn active_size(&self) -> usize {
        self.live.max().map_or(0, |(highest, _)| highest + 1)
    }

    /// Upload length in bytes
    pub fn active_bytesize(&self) -> usize {
        self.active_size() * self.record_size()
    }

    /// Bytes to upload: the storage prefix up to [`Self::active_bytesize`]
    pub fn active_bytes(&self) -> &[u8] {
        &self.storage[..self.active_bytesize()]
    }

    /// The whole backing storage
    pub fn storage(&self) -> &[u8] {
        &self.storage
    }

    /// Allocate a block of `size` records
    ///
    /// Prefers the lowest free range that holds the whole block, otherwise
    /// stitches the lowest ranges together. Capacity doubles until enough
    /// records are free.
    pub fn request_block(&mut self, size: usize) -> Result<BlockId> {
        if size == 0 {
            return Err(SlabError::InvalidSize(size));
        }

        let runs = loop {
            if let Some(run) = self.free.take_first_fit(size) {
                break vec![run];
            }
            if let Some(runs) = self.free.take_ascending(size) {
                break runs;
            }
            self.grow();
        };

        let id = self.attach(runs);
        debug!(
            "Allocated block of {} records, active size {}",
            size,
            self.active_size()
        );
        Ok(id)
    }

    /// Release a block, optionally resetting its records to `reset`
    ///
    /// `reset` must be exactly one record long. Releasing a stale or foreign
    /// handle fails with [`SlabError::BlockNotOwned`].
    pub fn release(&mut self, block: BlockId, reset: Option<&[u8]>) -> Result<()> {
        if let Some(record) = reset {
            self.check_record(record)?;
        }
        let runs = self.detach(block)?;

        if let Some(record) = reset {
            for index in runs.iter().flat_map(Clone::clone) {
                self.write_record_at(index, record);
            }
        }
        for run in runs {
            self.free.insert(run);
        }
        Ok(())
    }

    /// Release a block, then move the topmost live block into the lowest gap
    ///
    /// This is a single best-effort compaction step, not a defragmentation.
    /// It copies the moved block's records, so calling it for every release
    /// of a large batch is considerably slower than plain [`Self::release`];
    /// use it when churn is low or `active_size` has drifted upwards.
    ///
    /// The moved block lands in one contiguous range when one is free below
    /// its old top record, and is only split across runs otherwise. Records
    /// it vacates are overwritten with `reset`, or with the [`Self::fill_all`]
    /// pattern when no reset is given.
    ///
    /// Returns the relocation so callers can rewrite external references to
    /// the moved records, or `None` when nothing needed moving.
    pub fn release_and_repack(
        &mut self,
        block: BlockId,
        reset: Option<&[u8]>,
    ) -> Result<Option<Relocation>> {
        self.release(block, reset)?;
        let reset = reset.map(<[u8]>::to_vec).or_else(|| self.fill_pattern.clone());
        Ok(self.repack_top(reset.as_deref()))
    }

    /// Move the block holding the highest index into the lowest free records
    fn repack_top(&mut self, reset: Option<&[u8]>) -> Option<Relocation> {
        let first_free = self.free.first()?;
        if first_free.start >= self.active_size() {
            return None;
        }
        let (highest, mover) = self.live.max()?;

        let slot = mover.slot as usize;
        let old = self.slots[slot].runs.take()?;
        let size: usize = old.iter().map(ExactSizeIterator::len).sum();

        let record_size = self.record_size();
        let mut data = Vec::with_capacity(size * record_size);
        for index in old.iter().flat_map(Clone::clone) {
            data.extend_from_slice(&self.storage[index * record_size..(index + 1) * record_size]);
        }

        // The mover's own records count as free, so the new position never
        // ends above the old one.
        for run in &old {
            self.free.insert(run.clone());
        }
        let new = match self.free.take_first_fit(size) {
            Some(run) if run.end <= highest + 1 => vec![run],
            Some(run) => {
                self.free.insert(run);
                self.free.take_lowest(size)
            }
            None => self.free.take_lowest(size),
        };

        if let Some(record) = reset {
            for index in old.iter().flat_map(Clone::clone) {
                if !new.iter().any(|run| run.contains(&index)) {
                    self.write_record_at(index, record);
                }
            }
        }
        for (index, record) in new
            .iter()
            .flat_map(Clone::clone)
            .zip(data.chunks_exact(record_size))
        {
            self.write_record_at(index, record);
        }

        self.live.remove(&highest);
        self.live.insert(highest_of(&new), mover);
        self.slots[slot].runs = Some(new.clone());

        if new == old {
            return None;
        }
        debug!(
            "Repacked block of {} records, active size {}",
            size,
            self.active_size()
        );
        Some(Relocation {
            block: mover,
            old,
            new,
        })
    }

    /// Broadcast one value into `field` of every record of the block
    pub fn set<T: FieldValue>(&mut self, block: BlockId, field: &str, value: T) -> Result<()> {
        let location = self.layout.require(field)?;
        check_field::<T>(field, &location)?;

        let record_size = self.layout.record_size();
        let bytes = bytemuck::bytes_of(&value);
        let runs = resolve(&self.slots, self.id, block)?;
        for index in runs.iter().flat_map(Clone::clone) {
            let at = index * record_size + location.offset;
            self.storage[at..at + bytes.len()].copy_from_slice(bytes);
        }
        Ok(())
    }

    /// Assign `values` positionally into `field`, one value per record
    pub fn set_each<T: FieldValue>(&mut self, block: BlockId, field: &str, values: &[T]) -> Result<()> {
        let location = self.layout.require(field)?;
        check_field::<T>(field, &location)?;

        let record_size = self.layout.record_size();
        let runs = resolve(&self.slots, self.id, block)?;
        let size = runs.iter().map(ExactSizeIterator::len).sum();
        if values.len() != size {
            return Err(SlabError::ShapeMismatch {
                expected: size,
                actual: values.len(),
            });
        }

        for (index, value) in runs.iter().flat_map(Clone::clone).zip(values) {
            let bytes = bytemuck::bytes_of(value);
            let at = index * record_size + location.offset;
            self.storage[at..at + bytes.len()].copy_from_slice(bytes);
        }
        Ok(())
    }

    /// Read `field` from every record of the block, in block order
    pub fn get<T: FieldValue>(&self, block: BlockId, field: &str) -> Result<Vec<T>> {
        let location = self.layout.require(field)?;
        check_field::<T>(field, &location)?;

        let record_size = self.layout.record_size();
        let runs = resolve(&self.slots, self.id, block)?;
        Ok(runs
            .iter()
            .flat_map(Clone::clone)
            .map(|index| {
                let at = index * record_size + location.offset;
                bytemuck::pod_read_unaligned(&self.storage[at..at + location.byte_size()])
            })
            .collect())
    }

    /// Overwrite every record of the block with `record`
    pub fn write_record(&mut self, block: BlockId, record: &[u8]) -> Result<()> {
        self.check_record(record)?;
        let runs = resolve(&self.slots, self.id, block)?.to_vec();
        for index in runs.into_iter().flatten() {
            self.write_record_at(index, record);
        }
        Ok(())
    }

    /// Raw bytes of the block's records, in block order
    pub fn record_bytes(&self, block: BlockId) -> Result<Vec<u8>> {
        let record_size = self.record_size();
        let runs = resolve(&self.slots, self.id, block)?;
        Ok(runs
            .iter()
            .flat_map(|run| &self.storage[run.start * record_size..run.end * record_size])
            .copied()
            .collect())
    }

    /// Overwrite the entire backing storage with `record`
    ///
    /// The pattern is remembered and written into records created by later
    /// growth, so unallocated slots keep reading as the sentinel.
    pub fn fill_all(&mut self, record: &[u8]) -> Result<()> {
        self.check_record(record)?;
        for chunk in self.storage.chunks_exact_mut(record.len()) {
            chunk.copy_from_slice(record);
        }
        self.fill_pattern = Some(record.to_vec());
        Ok(())
    }

    /// [`Self::fill_all`] with a typed record value
    pub fn fill_all_with<T: Pod>(&mut self, record: &T) -> Result<()> {
        self.fill_all(bytemuck::bytes_of(record))
    }

    /// Number of records owned by the block
    pub fn block_size(&self, block: BlockId) -> Result<usize> {
        let runs = resolve(&self.slots, self.id, block)?;
        Ok(runs.iter().map(ExactSizeIterator::len).sum())
    }

    /// Record runs owned by the block, ascending
    pub fn block_runs(&self, block: BlockId) -> Result<&[Range<usize>]> {
        resolve(&self.slots, self.id, block)
    }

    /// Record indices owned by the block, ascending
    pub fn block_indices(&self, block: BlockId) -> Result<Vec<usize>> {
        let runs = resolve(&self.slots, self.id, block)?;
        Ok(runs.iter().flat_map(Clone::clone).collect())
    }

    /// Whether the handle refers to a live block of this cache
    pub fn is_live(&self, block: BlockId) -> bool {
        resolve(&self.slots, self.id, block).is_ok()
    }

    /// Free ranges in ascending order
    pub fn free_ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.free.iter()
    }

    /// Live blocks ordered by their highest record index
    pub fn live_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.live.iter().map(|(_, block)| block)
    }

    /// Number of live blocks
    pub fn live_block_count(&self) -> usize {
        self.live.len()
    }

    /// Occupancy snapshot
    pub fn stats(&self) -> SlabStats {
        SlabStats {
            capacity: self.capacity,
            active_size: self.active_size(),
            live_records: self.live_records,
            free_records: self.free.total(),
            live_blocks: self.live.len(),
            free_ranges: self.free.len(),
        }
    }

    /// Double capacity, keeping existing records at their indices
    fn grow(&mut self) {
        let old_capacity = self.capacity;
        let new_capacity = old_capacity * 2;
        let record_size = self.record_size();

        self.storage.resize(new_capacity * record_size, 0);
        if let Some(pattern) = &self.fill_pattern {
            for chunk in self.storage[old_capacity * record_size..].chunks_exact_mut(record_size) {
                chunk.copy_from_slice(pattern);
            }
        }
        self.capacity = new_capacity;
        self.free.insert(old_capacity..new_capacity);

        debug!("Slab grew from {} to {} records", old_capacity, new_capacity);
    }

    fn attach(&mut self, runs: Vec<Range<usize>>) -> BlockId {
        let highest = highest_of(&runs);
        self.live_records += runs.iter().map(ExactSizeIterator::len).sum::<usize>();

        let slot = match self.vacant.pop() {
            Some(slot) => {
                self.slots[slot as usize].runs = Some(runs);
                slot
            }
            None => {
                self.slots.push(BlockSlot {
                    generation: 0,
                    runs: Some(runs),
                });
                (self.slots.len() - 1) as u32
            }
        };

        let id = BlockId {
            cache: self.id,
            slot,
            generation: self.slots[slot as usize].generation,
        };
        self.live.insert(highest, id);
        id
    }

    fn detach(&mut self, block: BlockId) -> Result<Vec<Range<usize>>> {
        if block.cache != self.id {
            return Err(SlabError::BlockNotOwned(block));
        }
        let slot = self
            .slots
            .get_mut(block.slot as usize)
            .filter(|slot| slot.generation == block.generation && slot.runs.is_some())
            .ok_or(SlabError::BlockNotOwned(block))?;

        let runs = slot.runs.take().unwrap_or_default();
        slot.generation = slot.generation.wrapping_add(1);
        self.vacant.push(block.slot);

        self.live.remove(&highest_of(&runs));
        self.live_records -= runs.iter().map(ExactSizeIterator::len).sum::<usize>();
        Ok(runs)
    }

    fn check_record(&self, record: &[u8]) -> Result<()> {
        if record.len() != self.record_size() {
            return Err(SlabError::ShapeMismatch {
                expected: self.record_size(),
                actual: record.len(),
            });
        }
        Ok(())
    }

    fn write_record_at(&mut self, index: usize, record: &[u8]) {
        let record_size = record.len();
        self.storage[index * record_size..(index + 1) * record_size].copy_from_slice(record);
    }
}

/// Runs of a live block, or the reason the handle is unusable
fn resolve(slots: &[BlockSlot], cache: CacheId, block: BlockId) -> Result<&[Range<usize>]> {
    if block.cache != cache {
        return Err(SlabError::BlockNotOwned(block));
    }
    let slot = slots
        .get(block.slot as usize)
        .ok_or(SlabError::BlockNotOwned(block))?;
    match &slot.runs {
        Some(runs) if slot.generation == block.generation => Ok(runs),
        _ => Err(SlabError::UseAfterRelease(block)),
    }
}

fn check_field<T: FieldValue>(field: &str, location: &FieldLocation) -> Result<()> {
    if !location.holds::<T>() {
        return Err(SlabError::FieldTypeMismatch {
            field: field.to_string(),
            expected: location.ty,
            expected_count: location.count,
            actual: T::TYPE,
            actual_count: T::COUNT,
        });
    }
    Ok(())
}

fn highest_of(runs: &[Range<usize>]) -> usize {
    runs.last().map_or(0, |run| run.end - 1)
}
