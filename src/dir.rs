//! The root directory table: a flat list of name-to-inode entries stored as
//! the root inode's payload and mirrored in memory.
//!
//! Grounded on the course assignment's `sfs_dir.c` (`read_dir_table` loads
//! the whole table out of the root inode in one shot; `write_to_dir_table`
//! rewrites a single entry in place) and on the teacher's `Dirent` in
//! `fs/ufs/inode.rs` for the packed, `zerocopy`-backed entry layout and its
//! NUL-padded name encoding. Unlike the teacher's directories (and unlike
//! the course assignment's own first draft, which never implemented
//! removal), entries are compacted on remove rather than left as tombstoned
//! "invalid" slots, so the table never carries dead weight between runs.

use static_assertions::const_assert_eq;
use zerocopy::{AsBytes, FromBytes};

use crate::bcache::BlockCache;
use crate::bitmap::Bitmap;
use crate::device::BlockDevice;
use crate::error::SfsError;
use crate::inode::{self, DiskInode, InodeCache};
use crate::param::{DIRENT_SIZE, MAX_NAME};
use crate::superblock::SuperblockRecord;

#[repr(C)]
#[derive(Copy, Clone, AsBytes, FromBytes)]
pub struct DirEntry {
    pub inode: u32,
    pub valid: u8,
    pub name: [u8; MAX_NAME],
    _pad: u8,
}

const_assert_eq!(core::mem::size_of::<DirEntry>(), DIRENT_SIZE);

impl DirEntry {
    fn new(name: &str, inode: u32) -> Self {
        let mut buf = [0u8; MAX_NAME];
        let bytes = name.as_bytes();
        let n = bytes.len().min(MAX_NAME - 1);
        buf[..n].copy_from_slice(&bytes[..n]);
        Self {
            inode,
            valid: 1,
            name: buf,
            _pad: 0,
        }
    }

    /// A slot with `valid=0` or `inode=0` is free (§3).
    fn is_free(&self) -> bool {
        self.valid == 0 || self.inode == 0
    }

    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(MAX_NAME);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

/// In-memory mirror of the root inode's directory payload (§4.5).
pub struct DirTable {
    entries: Vec<DirEntry>,
}

impl DirTable {
    /// Loads the whole table out of the root inode's current payload.
    pub fn load<D: BlockDevice>(
        cache: &mut BlockCache<D>,
        root: &DiskInode,
    ) -> Result<Self, SfsError> {
        let mut buf = vec![0u8; root.size as usize];
        inode::read(cache, root, 0, &mut buf)?;
        let entries = buf
            .chunks(DIRENT_SIZE)
            .map(|chunk| DirEntry::read_from(chunk).expect("DIRENT_SIZE chunk"))
            .collect();
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn find(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| !e.is_free() && e.name() == name)
            .map(|e| e.inode)
    }

    /// The name of the `i`-th live entry in iteration order, skipping free
    /// slots, for the stateful `next_name` cursor (§4.5/§4.6).
    pub fn nth(&self, i: usize) -> Option<&str> {
        self.entries
            .iter()
            .filter(|e| !e.is_free())
            .nth(i)
            .map(|e| {
                let end = e.name.iter().position(|&b| b == 0).unwrap_or(MAX_NAME);
                std::str::from_utf8(&e.name[..end]).unwrap_or("")
            })
    }

    /// Returns the index of the first free slot (`inode == 0`, per §3), or
    /// `entries.len()` if the table has none (§4.5 `free_slot`).
    fn free_slot(&self) -> usize {
        self.entries
            .iter()
            .position(|e| e.is_free())
            .unwrap_or(self.len())
    }

    /// Installs a new entry for `name` -> `inode`, reusing the first free
    /// slot (§4.5 `free_slot`) and only growing the root inode's payload
    /// when there is none.
    #[allow(clippy::too_many_arguments)]
    pub fn put<D: BlockDevice>(
        &mut self,
        cache: &mut BlockCache<D>,
        bitmap: &Bitmap,
        inodes: &mut InodeCache,
        sb: &mut SuperblockRecord,
        root_idx: u32,
        root: &mut DiskInode,
        name: &str,
        inode_num: u32,
    ) -> Result<(), SfsError> {
        let entry = DirEntry::new(name, inode_num);
        let slot = self.free_slot();
        let offset = (slot * DIRENT_SIZE) as u32;
        inode::write(cache, bitmap, inodes, sb, root_idx, root, offset, entry.as_bytes())?;
        if slot < self.entries.len() {
            self.entries[slot] = entry;
        } else {
            self.entries.push(entry);
        }
        Ok(())
    }

    /// Removes the entry for `name`: shifts every later entry one slot
    /// down and shrinks the root inode's payload by one record (§4.5
    /// `remove`). Returns the inode number that was freed.
    #[allow(clippy::too_many_arguments)]
    pub fn remove<D: BlockDevice>(
        &mut self,
        cache: &mut BlockCache<D>,
        bitmap: &Bitmap,
        inodes: &mut InodeCache,
        sb: &mut SuperblockRecord,
        root_idx: u32,
        root: &mut DiskInode,
        name: &str,
    ) -> Result<u32, SfsError> {
        let pos = self
            .entries
            .iter()
            .position(|e| !e.is_free() && e.name() == name)
            .ok_or(SfsError::NameNotFound)?;
        let freed = self.entries[pos].inode;
        self.entries.remove(pos);
        for i in pos..self.entries.len() {
            let offset = (i * DIRENT_SIZE) as u32;
            inode::write(cache, bitmap, inodes, sb, root_idx, root, offset, self.entries[i].as_bytes())?;
        }
        root.size -= DIRENT_SIZE as u32;
        inodes.write(cache, bitmap, sb, root_idx, *root)?;
        Ok(freed)
    }
}
