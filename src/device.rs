//! The block-device collaborator.
//!
//! Out of scope for the storage engine proper (§1 of the specification treats
//! it as an external collaborator), but the engine needs something concrete
//! to call `read`/`write` whole blocks through. `FileBackedDevice` plays the
//! role the course assignment's `disk_emu.c` played: a flat host file standing
//! in for a block device, addressed by block index.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::DeviceError;

/// Whole-block synchronous I/O over a fixed-size, fixed-block-count volume.
///
/// Every method operates on block indices, not byte offsets; `block_size` is
/// the size of one block, fixed for the file's lifetime.
pub trait BlockDevice {
    /// Create a new backing store of `num_blocks * block_size` bytes,
    /// zero-filled, replacing any existing image at `path`.
    fn init_fresh_disk(
        path: &Path,
        block_size: usize,
        num_blocks: u32,
    ) -> Result<Self, DeviceError>
    where
        Self: Sized;

    /// Open an existing backing store, validating that its length matches
    /// `block_size * num_blocks`.
    fn init_disk(path: &Path, block_size: usize, num_blocks: u32) -> Result<Self, DeviceError>
    where
        Self: Sized;

    /// Read `count` consecutive blocks starting at `start` into `buf`, which
    /// must be exactly `count * block_size` bytes.
    fn read_blocks(&mut self, start: u32, count: u32, buf: &mut [u8]) -> Result<(), DeviceError>;

    /// Write `count` consecutive blocks starting at `start` from `buf`, which
    /// must be exactly `count * block_size` bytes.
    fn write_blocks(&mut self, start: u32, count: u32, buf: &[u8]) -> Result<(), DeviceError>;
}

/// A `BlockDevice` backed by a single flat file on the host filesystem.
pub struct FileBackedDevice {
    file: File,
    block_size: usize,
}

impl FileBackedDevice {
    fn offset_of(&self, block: u32) -> u64 {
        block as u64 * self.block_size as u64
    }
}

impl BlockDevice for FileBackedDevice {
    fn init_fresh_disk(
        path: &Path,
        block_size: usize,
        num_blocks: u32,
    ) -> Result<Self, DeviceError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|_| DeviceError::CreateFailed)?;
        let total = block_size as u64 * num_blocks as u64;
        file.set_len(total).map_err(|_| DeviceError::CreateFailed)?;
        let zeros = vec![0u8; block_size];
        file.seek(SeekFrom::Start(0))
            .map_err(|_| DeviceError::CreateFailed)?;
        for _ in 0..num_blocks {
            file.write_all(&zeros).map_err(|_| DeviceError::CreateFailed)?;
        }
        Ok(Self { file, block_size })
    }

    fn init_disk(path: &Path, block_size: usize, num_blocks: u32) -> Result<Self, DeviceError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|_| DeviceError::OpenFailed)?;
        let expected = block_size as u64 * num_blocks as u64;
        let actual = file.metadata().map_err(|_| DeviceError::OpenFailed)?.len();
        if actual != expected {
            return Err(DeviceError::OpenFailed);
        }
        Ok(Self { file, block_size })
    }

    fn read_blocks(&mut self, start: u32, count: u32, buf: &mut [u8]) -> Result<(), DeviceError> {
        debug_assert_eq!(buf.len(), count as usize * self.block_size);
        self.file
            .seek(SeekFrom::Start(self.offset_of(start)))
            .map_err(|_| DeviceError::Io)?;
        self.file.read_exact(buf).map_err(|_| DeviceError::Io)
    }

    fn write_blocks(&mut self, start: u32, count: u32, buf: &[u8]) -> Result<(), DeviceError> {
        debug_assert_eq!(buf.len(), count as usize * self.block_size);
        self.file
            .seek(SeekFrom::Start(self.offset_of(start)))
            .map_err(|_| DeviceError::Io)?;
        self.file.write_all(buf).map_err(|_| DeviceError::Io)
    }
}
