//! The mounted volume: owns every collaborator and exposes the public
//! operations listed in §6 of the specification.
//!
//! Grounded on the course assignment's `sfs_api.c`, which plays the same
//! role (a single set of module-level globals tying the block cache,
//! bitmap, inode cache, directory table, and open-file table together
//! behind `mksfs`/`sfs_fopen`/etc.), reshaped into an owned struct the way
//! the teacher's `FileSystem` trait ties `Superblock`, `Bcache`, and the
//! inode layer together in `fs/mod.rs`.

use std::path::Path;

use crate::bcache::BlockCache;
use crate::bitmap::Bitmap;
use crate::device::BlockDevice;
use crate::dir::DirTable;
use crate::error::SfsError;
use crate::inode::{self, DiskInode, InodeCache};
use crate::openfile::OpenFileTable;
use crate::param::{BSIZE, NUM_BLOCKS, ROOT_INODE};
use crate::superblock::SuperblockRecord;

pub struct Volume<D: BlockDevice> {
    cache: BlockCache<D>,
    bitmap: Bitmap,
    sb: SuperblockRecord,
    inodes: InodeCache,
    root: DiskInode,
    dir: DirTable,
    open_files: OpenFileTable,
    name_cursor: usize,
}

impl<D: BlockDevice> Volume<D> {
    /// Mounts the volume at `path`, formatting a fresh one first when
    /// `fresh` is set, using the authoritative `NUM_BLOCKS` volume size
    /// (§4.7 `format`).
    pub fn format(path: &Path, fresh: bool) -> Result<Self, SfsError> {
        if fresh {
            Self::make_fresh(path, NUM_BLOCKS)
        } else {
            Self::mount_existing(path)
        }
    }

    /// Like [`Volume::format`] with `fresh = true`, but against a volume of
    /// `num_blocks` blocks rather than the authoritative `NUM_BLOCKS`. §3
    /// notes `B`/`N` are configuration constants with defaults; this lets a
    /// test exercise the engine at a much smaller `N` (e.g. the §8 scenario
    /// 5 out-of-space test with `N = 32`) without touching the rest of the
    /// engine, since every layer below already takes the volume size as a
    /// parameter rather than assuming the constant.
    pub fn format_sized(path: &Path, num_blocks: u32) -> Result<Self, SfsError> {
        Self::make_fresh(path, num_blocks)
    }

    fn make_fresh(path: &Path, num_blocks: u32) -> Result<Self, SfsError> {
        let device = D::init_fresh_disk(path, BSIZE, num_blocks)?;
        let mut cache = BlockCache::new(device);
        let bitmap = Bitmap::new(num_blocks);
        let mut sb = SuperblockRecord::fresh(BSIZE as u32, num_blocks);

        // Block 0 (superblock) and block 1 (the first inode block) are
        // always allocated; so are whichever trailing blocks the bitmap
        // itself occupies.
        bitmap.set(&mut cache, 0, true)?;
        bitmap.set(&mut cache, 1, true)?;
        let bits_per_block = (8 * BSIZE) as u32;
        let bitmap_blocks = (num_blocks + bits_per_block - 1) / bits_per_block;
        for i in 0..bitmap_blocks {
            bitmap.set(&mut cache, num_blocks - 1 - i, true)?;
        }

        // Root directory init (`sfs_api.c::init_root_node`): allocate one
        // data block for its payload, sized to exactly one block of
        // zeroed (free) directory-entry slots, with the remaining direct
        // pointers and the indirect pointer left unassigned.
        let mut root = DiskInode::new_file();
        let root_block = bitmap.next_free(&mut cache)?;
        bitmap.set(&mut cache, root_block, true)?;
        cache.write(root_block, &vec![0u8; BSIZE])?;
        root.direct[0] = root_block;
        root.size = BSIZE as u32;

        let mut inodes = InodeCache::new();
        inodes.write(&mut cache, &bitmap, &mut sb, ROOT_INODE, root)?;
        sb.write(&mut cache)?;

        let dir = DirTable::load(&mut cache, &root)?;
        cache.flush()?;
        inodes.flush(&mut cache)?;

        Ok(Self {
            cache,
            bitmap,
            sb,
            inodes,
            root,
            dir,
            open_files: OpenFileTable::new(),
            name_cursor: 0,
        })
    }

    fn mount_existing(path: &Path) -> Result<Self, SfsError> {
        // The volume's block count isn't known until the superblock is
        // read, so derive it from the image's length (itself a multiple of
        // BSIZE by construction) rather than assuming NUM_BLOCKS; this lets
        // a volume formatted with `format_sized` at some other `N` remount
        // correctly too.
        let len = std::fs::metadata(path)
            .map_err(|_| crate::error::DeviceError::OpenFailed)?
            .len();
        let num_blocks = (len / BSIZE as u64) as u32;
        let device = D::init_disk(path, BSIZE, num_blocks)?;
        let mut cache = BlockCache::new(device);
        let sb = SuperblockRecord::read(&mut cache)?;
        let bitmap = Bitmap::new(sb.file_system_size);
        let mut inodes = InodeCache::new();
        let root = inodes.get(&mut cache, ROOT_INODE)?;
        let dir = DirTable::load(&mut cache, &root)?;
        Ok(Self {
            cache,
            bitmap,
            sb,
            inodes,
            root,
            dir,
            open_files: OpenFileTable::new(),
            name_cursor: 0,
        })
    }

    /// Returns the next unreturned name in directory order, or `None` once
    /// the table is exhausted; the cursor never resets on its own (§4.6).
    pub fn next_name(&mut self) -> Option<String> {
        let name = self.dir.nth(self.name_cursor).map(|s| s.to_string());
        if name.is_some() {
            self.name_cursor += 1;
        }
        name
    }

    pub fn file_size(&mut self, name: &str) -> Result<u32, SfsError> {
        let idx = self.dir.find(name).ok_or(SfsError::NameNotFound)?;
        let node = self.inodes.get(&mut self.cache, idx)?;
        Ok(node.size)
    }

    /// Counts free blocks across the whole volume (§8 bitmap-integrity
    /// property; not part of the public §6 operation table).
    pub fn free_block_count(&mut self) -> Result<u32, SfsError> {
        self.bitmap.count_free(&mut self.cache)
    }

    /// Opens `name`, creating it if it has no directory entry yet, and
    /// reusing the existing descriptor if it is already open (§4.6 `open`).
    pub fn open(&mut self, name: &str) -> Result<i32, SfsError> {
        if let Some(fd) = self.open_files.already_open(name) {
            return Ok(fd);
        }
        // Checked before any inode/directory mutation on the miss path
        // below: a `HandleTableFull` failure must leave state unchanged,
        // not behind a freshly created, never-openable file (§7).
        if !self.open_files.has_free_slot() {
            return Err(SfsError::HandleTableFull);
        }
        let (idx, size) = match self.dir.find(name) {
            Some(idx) => {
                let node = self.inodes.get(&mut self.cache, idx)?;
                (idx, node.size)
            }
            None => {
                let idx = self.inodes.next_free(&mut self.cache, &self.sb)?;
                let node = DiskInode::new_file();
                self.inodes
                    .write(&mut self.cache, &self.bitmap, &mut self.sb, idx, node)?;
                self.dir.put(
                    &mut self.cache,
                    &self.bitmap,
                    &mut self.inodes,
                    &mut self.sb,
                    ROOT_INODE,
                    &mut self.root,
                    name,
                    idx,
                )?;
                (idx, 0)
            }
        };
        self.open_files.open(idx, name, size)
    }

    /// Closes `fd`, flushing both caches to disk (§4.6 `close`).
    pub fn close(&mut self, fd: i32) -> Result<(), SfsError> {
        self.open_files.close(fd)?;
        self.inodes.flush(&mut self.cache)?;
        self.cache.flush()?;
        Ok(())
    }

    pub fn write(&mut self, fd: i32, data: &[u8]) -> Result<usize, SfsError> {
        let idx = self.open_files.inode_of(fd)?;
        let offset = self.open_files.offset_of(fd)?;
        let mut node = self.inodes.get(&mut self.cache, idx)?;
        let n = inode::write(
            &mut self.cache,
            &self.bitmap,
            &mut self.inodes,
            &mut self.sb,
            idx,
            &mut node,
            offset,
            data,
        )?;
        if idx == ROOT_INODE {
            self.root = node;
        }
        self.open_files.advance(fd, n as u32)?;
        Ok(n)
    }

    /// Reads into `buf`, per §4.6: the handle's offset always advances by
    /// `buf.len()`, not by the number of bytes actually copied.
    pub fn read(&mut self, fd: i32, buf: &mut [u8]) -> Result<usize, SfsError> {
        let idx = self.open_files.inode_of(fd)?;
        let offset = self.open_files.offset_of(fd)?;
        let node = self.inodes.get(&mut self.cache, idx)?;
        let n = inode::read(&mut self.cache, &node, offset, buf)?;
        self.open_files.advance(fd, buf.len() as u32)?;
        Ok(n)
    }

    pub fn seek(&mut self, fd: i32, offset: i64) -> Result<(), SfsError> {
        if offset < 0 {
            return Err(SfsError::NegativeSeek);
        }
        self.open_files.set_offset(fd, offset as u32)
    }

    /// Removes `name`: frees its data blocks, frees its inode, and drops
    /// its directory entry (§4.5/§4.6 `remove`).
    pub fn remove(&mut self, name: &str) -> Result<(), SfsError> {
        let idx = self.dir.remove(
            &mut self.cache,
            &self.bitmap,
            &mut self.inodes,
            &mut self.sb,
            ROOT_INODE,
            &mut self.root,
            name,
        )?;
        let mut node = self.inodes.get(&mut self.cache, idx)?;
        node.link_count = 0;
        inode::truncate(&mut self.cache, &self.bitmap, &mut node)?;
        self.inodes
            .write(&mut self.cache, &self.bitmap, &mut self.sb, idx, node)?;
        Ok(())
    }
}
