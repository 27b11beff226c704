//! The open-file table: a fixed array of handles mapping a small integer
//! descriptor to an inode and a current byte offset.
//!
//! Grounded on the course assignment's `sfs_api.c` (`sfs_fopen`'s
//! already-open/linear-scan-then-free-slot flow, append-on-open semantics)
//! and on the teacher's `RcFile`/`FTableTag` pattern in `file.rs` for the
//! shape of a fixed-capacity handle table, with the reference-counting
//! dropped since the specification forbids a name being open twice under
//! different descriptors (§4.6).

use crate::error::SfsError;
use crate::param::MAX_OPEN_FILES;

struct Handle {
    inode: Option<u32>,
    name: String,
    offset: u32,
}

impl Handle {
    fn empty() -> Self {
        Self {
            inode: None,
            name: String::new(),
            offset: 0,
        }
    }
}

pub struct OpenFileTable {
    handles: [Handle; MAX_OPEN_FILES],
}

impl OpenFileTable {
    pub fn new() -> Self {
        Self {
            handles: array_macro::array![_ => Handle::empty(); MAX_OPEN_FILES],
        }
    }

    fn find_by_name(&self, name: &str) -> Option<usize> {
        self.handles
            .iter()
            .position(|h| h.inode.is_some() && h.name == name)
    }

    /// Returns the descriptor already open on `name`, if any.
    pub fn already_open(&self, name: &str) -> Option<i32> {
        self.find_by_name(name).map(|i| i as i32)
    }

    /// `true` iff a call to `open` would find a free slot. Callers that
    /// need to create a directory entry / inode for a not-yet-existing
    /// name must check this *first* (`sfs_fopen` checks for a free
    /// descriptor before touching the directory or inode tables at all),
    /// so a `HandleTableFull` failure never leaves a freshly created file
    /// behind (§7: API-level errors leave state unchanged).
    pub fn has_free_slot(&self) -> bool {
        self.handles.iter().any(|h| h.inode.is_none())
    }

    /// Installs a new handle for `inode_num`/`name`, positioned at `size`
    /// bytes (append-on-open, §4.6). Fails if every slot is busy.
    pub fn open(&mut self, inode_num: u32, name: &str, size: u32) -> Result<i32, SfsError> {
        let slot = self
            .handles
            .iter()
            .position(|h| h.inode.is_none())
            .ok_or(SfsError::HandleTableFull)?;
        self.handles[slot] = Handle {
            inode: Some(inode_num),
            name: name.to_string(),
            offset: size,
        };
        Ok(slot as i32)
    }

    fn slot(&self, fd: i32) -> Result<usize, SfsError> {
        if fd < 0 || fd as usize >= MAX_OPEN_FILES {
            return Err(SfsError::InvalidHandle);
        }
        let i = fd as usize;
        if self.handles[i].inode.is_none() {
            return Err(SfsError::InvalidHandle);
        }
        Ok(i)
    }

    pub fn inode_of(&self, fd: i32) -> Result<u32, SfsError> {
        let i = self.slot(fd)?;
        Ok(self.handles[i].inode.expect("checked by slot()"))
    }

    pub fn offset_of(&self, fd: i32) -> Result<u32, SfsError> {
        let i = self.slot(fd)?;
        Ok(self.handles[i].offset)
    }

    pub fn set_offset(&mut self, fd: i32, offset: u32) -> Result<(), SfsError> {
        let i = self.slot(fd)?;
        self.handles[i].offset = offset;
        Ok(())
    }

    pub fn advance(&mut self, fd: i32, by: u32) -> Result<(), SfsError> {
        let i = self.slot(fd)?;
        self.handles[i].offset += by;
        Ok(())
    }

    pub fn close(&mut self, fd: i32) -> Result<(), SfsError> {
        let i = self.slot(fd)?;
        self.handles[i] = Handle::empty();
        Ok(())
    }
}
