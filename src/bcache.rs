//! The block cache: a fully-associative, write-back cache of whole blocks.
//!
//! Grounded on the teacher's `bio.rs` buffer cache (one fixed-size slot array,
//! install-on-miss, write-back-on-evict) with the concurrency machinery
//! stripped out — the specification is explicitly single-threaded — and the
//! eviction rule replaced with the age-counter LRU approximation the course
//! assignment's `sfs_block.c` uses (`get_oldest_block`): scan for an empty
//! slot first, otherwise the slot with the smallest age, ties going to the
//! lowest index.

use crate::device::BlockDevice;
use crate::error::DeviceError;
use crate::param::{BLOCK_CACHE_SIZE, BSIZE};

struct Slot {
    /// `None` means the slot has never held a block since `init`.
    block: Option<u32>,
    age: u16,
    data: Box<[u8]>,
}

impl Slot {
    fn empty() -> Self {
        Self {
            block: None,
            age: 0,
            data: vec![0u8; BSIZE].into_boxed_slice(),
        }
    }
}

/// The only module allowed to call `BlockDevice::read_blocks`/`write_blocks`.
pub struct BlockCache<D: BlockDevice> {
    device: D,
    slots: [Slot; BLOCK_CACHE_SIZE],
    rolling_counter: u16,
}

impl<D: BlockDevice> BlockCache<D> {
    /// Wraps `device` in a freshly invalidated cache (§4.1 `init`).
    pub fn new(device: D) -> Self {
        Self {
            device,
            slots: array_macro::array![_ => Slot::empty(); BLOCK_CACHE_SIZE],
            rolling_counter: 1,
        }
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    fn find(&self, block: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.block == Some(block))
    }

    /// Evict a slot per the policy in §4.1, writing its contents back first
    /// if it held a valid block. Returns the now-empty slot's index.
    fn evict(&mut self) -> Result<usize, DeviceError> {
        let mut oldest = 0;
        for i in 0..BLOCK_CACHE_SIZE {
            if self.slots[i].block.is_none() {
                return Ok(i);
            }
            if self.slots[i].age < self.slots[oldest].age {
                oldest = i;
            }
        }
        if let Some(block) = self.slots[oldest].block {
            self.device
                .write_blocks(block, 1, &self.slots[oldest].data)?;
        }
        self.rolling_counter = self.rolling_counter.wrapping_add(1);
        self.slots[oldest].block = None;
        Ok(oldest)
    }

    /// Read block `n` into `out` (exactly `BSIZE` bytes), via the cache.
    pub fn read(&mut self, n: u32, out: &mut [u8]) -> Result<(), DeviceError> {
        debug_assert_eq!(out.len(), BSIZE);
        if let Some(i) = self.find(n) {
            self.slots[i].age = self.rolling_counter;
            out.copy_from_slice(&self.slots[i].data);
            return Ok(());
        }
        let i = self.evict()?;
        self.device.read_blocks(n, 1, &mut self.slots[i].data)?;
        self.slots[i].block = Some(n);
        self.slots[i].age = self.rolling_counter;
        out.copy_from_slice(&self.slots[i].data);
        Ok(())
    }

    /// Overwrite block `n` with `buf` (exactly `BSIZE` bytes) in the cache,
    /// without reading the old contents from the device first.
    pub fn write(&mut self, n: u32, buf: &[u8]) -> Result<(), DeviceError> {
        debug_assert_eq!(buf.len(), BSIZE);
        if let Some(i) = self.find(n) {
            self.slots[i].data.copy_from_slice(buf);
            self.slots[i].age = self.rolling_counter;
            return Ok(());
        }
        let i = self.evict()?;
        self.slots[i].data.copy_from_slice(buf);
        self.slots[i].block = Some(n);
        self.slots[i].age = self.rolling_counter;
        Ok(())
    }

    /// Write every occupied slot back to the device without invalidating it.
    pub fn flush(&mut self) -> Result<(), DeviceError> {
        for slot in &self.slots {
            if let Some(block) = slot.block {
                self.device.write_blocks(block, 1, &slot.data)?;
            }
        }
        Ok(())
    }
}
