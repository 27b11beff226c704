//! The superblock: a single, fixed-layout record at block 0.
//!
//! Grounded on the teacher's `fs/superblock.rs` (`Superblock::new` reads the
//! whole record out of a cached block and checks `magic`), generalized from
//! five named fields the teacher computes from `mkfs` arguments to the five
//! the specification fixes (§3): `magic`, `block_size`, `file_system_size`,
//! `inode_table_length`, `root_dir_inode`.

use static_assertions::const_assert_eq;
use zerocopy::{AsBytes, FromBytes};

use crate::bcache::BlockCache;
use crate::device::BlockDevice;
use crate::error::SfsError;
use crate::param::{BSIZE, MAGIC_NUMBER, ROOT_INODE};

/// On-disk superblock record. Only the first 20 bytes of block 0 are
/// meaningful; the rest of the block is zero-padded (§3).
#[repr(C)]
#[derive(Copy, Clone, AsBytes, FromBytes)]
pub struct SuperblockRecord {
    pub magic: u32,
    pub block_size: u32,
    pub file_system_size: u32,
    pub inode_table_length: u32,
    pub root_dir_inode: u32,
}

const_assert_eq!(core::mem::size_of::<SuperblockRecord>(), 20);

impl SuperblockRecord {
    pub fn fresh(block_size: u32, file_system_size: u32) -> Self {
        Self {
            magic: MAGIC_NUMBER,
            block_size,
            file_system_size,
            inode_table_length: 1,
            root_dir_inode: ROOT_INODE,
        }
    }

    /// Reads and validates the superblock at block 0 through the cache.
    pub fn read<D: BlockDevice>(cache: &mut BlockCache<D>) -> Result<Self, SfsError> {
        let mut buf = vec![0u8; BSIZE];
        cache.read(0, &mut buf)?;
        let record = SuperblockRecord::read_from_prefix(&buf[..]).expect("block is BSIZE bytes");
        if record.magic != MAGIC_NUMBER {
            return Err(SfsError::Device(crate::error::DeviceError::OpenFailed));
        }
        Ok(record)
    }

    /// Writes this record back to block 0 through the cache, zero-padding
    /// the rest of the block.
    pub fn write<D: BlockDevice>(&self, cache: &mut BlockCache<D>) -> Result<(), SfsError> {
        let mut buf = vec![0u8; BSIZE];
        buf[..core::mem::size_of::<Self>()].copy_from_slice(self.as_bytes());
        cache.write(0, &buf)?;
        Ok(())
    }
}
