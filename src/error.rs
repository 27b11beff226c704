//! Error taxonomy for the storage engine.
//!
//! Mirrors the classes the specification lists: cache/device errors are the
//! one class this crate still treats as fatal-by-convention (the top-level
//! wrapper in `lib.rs` is free to `expect` on them, matching the source's
//! `exit(1)` on a disk-open failure), every other class is returned normally.

use core::fmt;

/// Failure surfaced by the `BlockDevice` collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The backing disk image could not be created.
    CreateFailed,
    /// The backing disk image could not be opened, or its length does not
    /// match `block_size * num_blocks`.
    OpenFailed,
    /// A block-range read or write fell outside the device, or the
    /// underlying I/O call failed.
    Io,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateFailed => write!(f, "could not create disk image"),
            Self::OpenFailed => write!(f, "could not open disk image"),
            Self::Io => write!(f, "block device I/O error"),
        }
    }
}

impl std::error::Error for DeviceError {}

impl From<std::io::Error> for DeviceError {
    fn from(_: std::io::Error) -> Self {
        Self::Io
    }
}

/// Errors produced by the storage engine above the block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SfsError {
    /// The free-block bitmap has no free bit left (§4.2 `next_free`).
    OutOfSpace,
    /// A write would grow a file past `MAX_FILE_BLOCKS` blocks.
    FileTooLarge,
    /// A handle was out of range, or named a closed slot.
    InvalidHandle,
    /// `file_size`/`remove` were given a name with no directory entry.
    NameNotFound,
    /// `open` was called with every handle slot already busy.
    HandleTableFull,
    /// An inode-region growth request skipped a block (non-contiguous).
    LayoutError,
    /// `seek` was given a negative offset.
    NegativeSeek,
    /// The block device itself failed; state may be inconsistent.
    Device(DeviceError),
}

impl fmt::Display for SfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfSpace => write!(f, "no free blocks remain"),
            Self::FileTooLarge => write!(f, "write would exceed the maximum file size"),
            Self::InvalidHandle => write!(f, "invalid or closed file handle"),
            Self::NameNotFound => write!(f, "no such file"),
            Self::HandleTableFull => write!(f, "no free file handle"),
            Self::LayoutError => write!(f, "non-contiguous inode region growth"),
            Self::NegativeSeek => write!(f, "seek offset must not be negative"),
            Self::Device(e) => write!(f, "device error: {}", e),
        }
    }
}

impl std::error::Error for SfsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for SfsError {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}
