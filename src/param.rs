//! Fixed constants shared by every layer of the storage engine.
//!
//! `BSIZE`/`NUM_BLOCKS` are on-disk contracts (see the superblock layout):
//! once a volume is formatted with a given pair, a later mount must use the
//! same pair or the magic/size checks in `Superblock::validate` reject it.
//! The rest are in-memory sizing knobs.

/// Bytes per block. Authoritative build value is 1024.
pub const BSIZE: usize = 1024;

/// Blocks in the volume. Authoritative build value is 2048.
pub const NUM_BLOCKS: u32 = 2048;

/// Block cache slots.
pub const BLOCK_CACHE_SIZE: usize = 16;

/// Inode cache slots.
pub const INODE_CACHE_SIZE: usize = 16;

/// On-disk inode size in bytes (16 inodes per block).
pub const INODE_SIZE: usize = 64;

/// Inodes packed per block.
pub const INODES_PER_BLOCK: usize = BSIZE / INODE_SIZE;

/// Direct block pointers per inode.
pub const NDIRECT: usize = 12;

/// Block-number pointers held in a single indirect block.
pub const NINDIRECT: usize = BSIZE / 4;

/// Maximum file size in blocks: direct pointers plus one indirect block's worth.
pub const MAX_FILE_BLOCKS: usize = NDIRECT + NINDIRECT;

/// On-disk directory entry size in bytes (16 per block).
pub const DIRENT_SIZE: usize = 64;

/// Longest filename, excluding the NUL terminator.
pub const MAX_NAME: usize = 58;

/// Open file handles.
pub const MAX_OPEN_FILES: usize = 16;

/// Superblock magic number.
pub const MAGIC_NUMBER: u32 = 0xABCD_0005;

/// Sentinel meaning "no block"/"unassigned" in an on-disk pointer field.
pub const SENTINEL: u32 = 0xFFFF_FFFF;

/// Root directory's inode number.
pub const ROOT_INODE: u32 = 0;
