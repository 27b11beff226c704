//! On-disk inode layout, the inode cache, and direct/indirect block I/O.
//!
//! The on-disk record (`DiskInode`) and its direct/indirect addressing are
//! grounded on the teacher's `fs/ufs/inode.rs` `Dinode` (packed `#[repr(C)]`
//! record read with `zerocopy`, `NDIRECT` direct pointers plus one indirect
//! block) and on the course assignment's `sfs_inode.c`. The eviction rule is
//! the one place this cache differs from the plain LRU-ish block cache: when
//! a slot is evicted, every cached inode mapping to the same inode block is
//! flushed together, preserving the packed 16-per-block layout without
//! losing sibling edits (`sfs_inode.c::get_oldest_inode`).

use static_assertions::const_assert_eq;
use zerocopy::{AsBytes, FromBytes};

use crate::bcache::BlockCache;
use crate::bitmap::Bitmap;
use crate::device::BlockDevice;
use crate::error::SfsError;
use crate::param::{
    BSIZE, INODES_PER_BLOCK, INODE_CACHE_SIZE, INODE_SIZE, MAX_FILE_BLOCKS, NDIRECT, NINDIRECT,
    SENTINEL,
};
use crate::superblock::SuperblockRecord;

/// On-disk inode record: 64 bytes, 16 per block (§3).
#[repr(C)]
#[derive(Copy, Clone, AsBytes, FromBytes)]
pub struct DiskInode {
    pub mode: u32,
    pub link_count: u32,
    pub size: u32,
    pub direct: [u32; NDIRECT],
    pub indirect: u32,
}

const_assert_eq!(core::mem::size_of::<DiskInode>(), INODE_SIZE);

impl DiskInode {
    /// A freed slot: `link_count = 0` is the sole "in use" marker (§3).
    pub fn free() -> Self {
        Self {
            mode: 0,
            link_count: 0,
            size: 0,
            direct: [SENTINEL; NDIRECT],
            indirect: SENTINEL,
        }
    }

    /// A freshly allocated, empty inode with one live link and no blocks.
    pub fn new_file() -> Self {
        Self {
            link_count: 1,
            ..Self::free()
        }
    }

    pub fn in_use(&self) -> bool {
        self.link_count != 0
    }

    fn from_block(buf: &[u8], idx: u32) -> Self {
        let off = (idx as usize % INODES_PER_BLOCK) * INODE_SIZE;
        DiskInode::read_from(&buf[off..off + INODE_SIZE]).expect("slice is INODE_SIZE bytes")
    }
}

fn inode_block_of(idx: u32) -> u32 {
    idx / INODES_PER_BLOCK as u32
}

struct Slot {
    idx: Option<u32>,
    age: u16,
    node: DiskInode,
}

impl Slot {
    fn empty() -> Self {
        Self {
            idx: None,
            age: 0,
            node: DiskInode::free(),
        }
    }
}

/// Write-back cache of inode records, grouped by inode block on eviction.
pub struct InodeCache {
    slots: [Slot; INODE_CACHE_SIZE],
    rolling_counter: u16,
}

impl InodeCache {
    pub fn new() -> Self {
        Self {
            slots: array_macro::array![_ => Slot::empty(); INODE_CACHE_SIZE],
            rolling_counter: 1,
        }
    }

    fn find(&self, idx: u32) -> Option<usize> {
        self.slots.iter().position(|s| s.idx == Some(idx))
    }

    /// Writes every cached inode mapping to `block` into one combined write
    /// of that inode block, leaving the cache entries themselves untouched.
    fn flush_block<D: BlockDevice>(
        &self,
        cache: &mut BlockCache<D>,
        block: u32,
    ) -> Result<(), SfsError> {
        let mut buf = vec![0u8; BSIZE];
        cache.read(block + 1, &mut buf)?;
        for slot in &self.slots {
            if let Some(idx) = slot.idx {
                if inode_block_of(idx) == block {
                    let off = (idx as usize % INODES_PER_BLOCK) * INODE_SIZE;
                    buf[off..off + INODE_SIZE].copy_from_slice(slot.node.as_bytes());
                }
            }
        }
        cache.write(block + 1, &buf)?;
        Ok(())
    }

    /// Evicts a slot (empty slots preferred, else smallest age, ties to the
    /// lowest index), flushing the whole inode block it belonged to.
    fn evict<D: BlockDevice>(&mut self, cache: &mut BlockCache<D>) -> Result<usize, SfsError> {
        let mut oldest = 0;
        for i in 0..INODE_CACHE_SIZE {
            if self.slots[i].idx.is_none() {
                return Ok(i);
            }
            if self.slots[i].age < self.slots[oldest].age {
                oldest = i;
            }
        }
        let block = inode_block_of(self.slots[oldest].idx.expect("occupied"));
        self.flush_block(cache, block)?;
        self.rolling_counter = self.rolling_counter.wrapping_add(1);
        for slot in &mut self.slots {
            if slot.idx.map_or(false, |i| inode_block_of(i) == block) {
                slot.idx = None;
            }
        }
        Ok(oldest)
    }

    /// Returns a copy of inode `idx`, fetching it through the block cache on
    /// a miss (§4.3 `get`).
    pub fn get<D: BlockDevice>(
        &mut self,
        cache: &mut BlockCache<D>,
        idx: u32,
    ) -> Result<DiskInode, SfsError> {
        if let Some(i) = self.find(idx) {
            self.slots[i].age = self.rolling_counter;
            return Ok(self.slots[i].node);
        }
        let i = self.evict(cache)?;
        let mut buf = vec![0u8; BSIZE];
        cache.read(inode_block_of(idx) + 1, &mut buf)?;
        let node = DiskInode::from_block(&buf, idx);
        self.slots[i] = Slot {
            idx: Some(idx),
            age: self.rolling_counter,
            node,
        };
        Ok(node)
    }

    /// Writes `node` into slot `idx`, growing the inode region contiguously
    /// if `idx`'s block is one past the current end (§4.3 `write_inode`).
    pub fn write<D: BlockDevice>(
        &mut self,
        cache: &mut BlockCache<D>,
        bitmap: &Bitmap,
        sb: &mut SuperblockRecord,
        idx: u32,
        node: DiskInode,
    ) -> Result<(), SfsError> {
        let block = inode_block_of(idx);
        if block >= sb.inode_table_length {
            if block != sb.inode_table_length {
                return Err(SfsError::LayoutError);
            }
            let next_block = block + 1;
            if !bitmap.is_free(cache, next_block)? {
                return Err(SfsError::OutOfSpace);
            }
            bitmap.set(cache, next_block, true)?;
            sb.inode_table_length += 1;
            sb.write(cache)?;
        }
        let i = match self.find(idx) {
            Some(i) => i,
            None => self.evict(cache)?,
        };
        self.slots[i] = Slot {
            idx: Some(idx),
            age: self.rolling_counter,
            node,
        };
        Ok(())
    }

    /// Scans the inode region for the first free slot (`link_count == 0`);
    /// if none is found, returns the first index of the block that would be
    /// grown into next (§4.3 `next_free_inode`).
    pub fn next_free<D: BlockDevice>(
        &mut self,
        cache: &mut BlockCache<D>,
        sb: &SuperblockRecord,
    ) -> Result<u32, SfsError> {
        for block in 0..sb.inode_table_length {
            let mut buf = vec![0u8; BSIZE];
            cache.read(block + 1, &mut buf)?;
            for j in 0..INODES_PER_BLOCK {
                let off = j * INODE_SIZE;
                let node =
                    DiskInode::read_from(&buf[off..off + INODE_SIZE]).expect("INODE_SIZE slice");
                if !node.in_use() {
                    return Ok(block * INODES_PER_BLOCK as u32 + j as u32);
                }
            }
        }
        Ok(sb.inode_table_length * INODES_PER_BLOCK as u32)
    }

    /// Flushes every cached inode to disk, grouped by inode block, without
    /// invalidating the cache (mirrors `BlockCache::flush`).
    pub fn flush<D: BlockDevice>(&self, cache: &mut BlockCache<D>) -> Result<(), SfsError> {
        let mut seen = [false; INODE_CACHE_SIZE];
        for (i, slot) in self.slots.iter().enumerate() {
            if seen[i] {
                continue;
            }
            if let Some(idx) = slot.idx {
                let block = inode_block_of(idx);
                self.flush_block(cache, block)?;
                for (j, other) in self.slots.iter().enumerate() {
                    if other.idx.map_or(false, |o| inode_block_of(o) == block) {
                        seen[j] = true;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Resolves logical block `i` of `node` to a physical block number, reading
/// the indirect block through the cache if `i` falls past the direct range
/// (§4.4 `blk`).
pub fn blk<D: BlockDevice>(
    cache: &mut BlockCache<D>,
    node: &DiskInode,
    i: usize,
) -> Result<u32, SfsError> {
    if i < NDIRECT {
        return Ok(node.direct[i]);
    }
    let mut buf = vec![0u8; BSIZE];
    cache.read(node.indirect, &mut buf)?;
    let off = (i - NDIRECT) * 4;
    Ok(u32::from_le_bytes(buf[off..off + 4].try_into().unwrap()))
}

fn set_indirect_entry<D: BlockDevice>(
    cache: &mut BlockCache<D>,
    indirect_block: u32,
    slot: usize,
    value: u32,
) -> Result<(), SfsError> {
    let mut buf = vec![0u8; BSIZE];
    cache.read(indirect_block, &mut buf)?;
    let off = slot * 4;
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
    cache.write(indirect_block, &buf)?;
    Ok(())
}

/// Reads up to `size` bytes starting at `offset` out of `node`'s payload,
/// clamped to the file's current length (§4.4 `read`). Returns the number
/// of bytes actually copied into `out`.
pub fn read<D: BlockDevice>(
    cache: &mut BlockCache<D>,
    node: &DiskInode,
    offset: u32,
    out: &mut [u8],
) -> Result<usize, SfsError> {
    if offset >= node.size {
        return Ok(0);
    }
    let size = (out.len() as u32).min(node.size - offset) as usize;
    let mut block_num = (offset as usize) / BSIZE;
    let mut block_off = (offset as usize) % BSIZE;
    let mut done = 0;
    let mut buf = vec![0u8; BSIZE];
    while done < size {
        let phys = blk(cache, node, block_num)?;
        cache.read(phys, &mut buf)?;
        let n = (BSIZE - block_off).min(size - done);
        out[done..done + n].copy_from_slice(&buf[block_off..block_off + n]);
        done += n;
        block_num += 1;
        block_off = 0;
    }
    Ok(done)
}

/// Writes `data` into `node`'s payload starting at `offset`, extending the
/// allocation and `node.size` on demand (§4.4 `write`). Persists `node`
/// itself through the inode cache before copying any bytes, since the
/// extension step may have touched `direct`/`indirect`/`size` even if the
/// data write below fails partway through.
#[allow(clippy::too_many_arguments)]
pub fn write<D: BlockDevice>(
    cache: &mut BlockCache<D>,
    bitmap: &Bitmap,
    inodes: &mut InodeCache,
    sb: &mut SuperblockRecord,
    inode_idx: u32,
    node: &mut DiskInode,
    offset: u32,
    data: &[u8],
) -> Result<usize, SfsError> {
    let new_size = offset as u64 + data.len() as u64;
    if (new_size / BSIZE as u64) as usize >= MAX_FILE_BLOCKS {
        return Err(SfsError::FileTooLarge);
    }
    let new_size = new_size as u32;

    if new_size > node.size {
        let first_new = (node.size as usize) / BSIZE;
        let last_new = (new_size as usize - 1) / BSIZE;
        for p in first_new..=last_new {
            let assigned = if p < NDIRECT {
                node.direct[p] != SENTINEL
            } else if node.indirect == SENTINEL {
                false
            } else {
                blk(cache, node, p)? != SENTINEL
            };
            if assigned {
                continue;
            }
            let block = bitmap.next_free(cache)?;
            bitmap.set(cache, block, true)?;
            if p < NDIRECT {
                node.direct[p] = block;
            } else {
                if node.indirect == SENTINEL {
                    let ib = bitmap.next_free(cache)?;
                    bitmap.set(cache, ib, true)?;
                    let mut fresh = vec![0u8; BSIZE];
                    for slot in fresh.chunks_mut(4) {
                        slot.copy_from_slice(&SENTINEL.to_le_bytes());
                    }
                    cache.write(ib, &fresh)?;
                    node.indirect = ib;
                }
                set_indirect_entry(cache, node.indirect, p - NDIRECT, block)?;
            }
        }
        node.size = new_size;
    }
    inodes.write(cache, bitmap, sb, inode_idx, *node)?;

    let mut block_num = (offset as usize) / BSIZE;
    let mut block_off = (offset as usize) % BSIZE;
    let mut done = 0;
    let mut buf = vec![0u8; BSIZE];
    while done < data.len() {
        let phys = blk(cache, node, block_num)?;
        cache.read(phys, &mut buf)?;
        let n = (BSIZE - block_off).min(data.len() - done);
        buf[block_off..block_off + n].copy_from_slice(&data[done..done + n]);
        cache.write(phys, &buf)?;
        done += n;
        block_num += 1;
        block_off = 0;
    }
    Ok(done)
}

/// Frees every block reachable from `node` (direct, indirect payload, and
/// the indirect block itself), zeroes `size`, and clears the pointers
/// (§4.3 `remove`, the free-block half of inode removal).
pub fn truncate<D: BlockDevice>(
    cache: &mut BlockCache<D>,
    bitmap: &Bitmap,
    node: &mut DiskInode,
) -> Result<(), SfsError> {
    for d in node.direct.iter_mut() {
        if *d != SENTINEL {
            bitmap.set(cache, *d, false)?;
            *d = SENTINEL;
        }
    }
    if node.indirect != SENTINEL {
        let mut buf = vec![0u8; BSIZE];
        cache.read(node.indirect, &mut buf)?;
        for i in 0..NINDIRECT {
            let off = i * 4;
            let b = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
            if b != SENTINEL {
                bitmap.set(cache, b, false)?;
            }
        }
        bitmap.set(cache, node.indirect, false)?;
        node.indirect = SENTINEL;
    }
    node.size = 0;
    Ok(())
}
