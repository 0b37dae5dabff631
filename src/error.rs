//! The error taxonomy (spec §7). Every public operation returns
//! `Result<T, Error>` instead of the sentinel convention of the original
//! test shell this library's behavior was distilled from.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything a public [`crate::Filesystem`] operation can fail with.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation other than `mount`/`format` was invoked before a
    /// successful mount.
    #[error("no filesystem is mounted")]
    NotMounted,

    /// `mount` was invoked on an already-mounted filesystem.
    #[error("a filesystem is already mounted")]
    AlreadyMounted,

    /// The underlying device could not be opened/closed, or its sector
    /// count disagrees with what the superblock claims.
    #[error("bad block device: {0}")]
    BadDevice(String),

    /// The superblock signature did not match [`crate::layout::SIGNATURE`].
    #[error("bad superblock signature: {0:?}")]
    BadSignature(Vec<u8>),

    /// `name` was empty, too long to leave room for a zero terminator, or
    /// otherwise not representable in a [`crate::layout::FILENAME_MAX_LEN`]-byte
    /// zero-terminated field.
    #[error("invalid filename {0:?}")]
    NameInvalid(String),

    /// `create` collided with an existing directory entry.
    #[error("file already exists: {0}")]
    NameExists(String),

    /// `lookup`/`delete`/`open` referenced a name with no directory entry.
    #[error("file not found: {0}")]
    NameNotFound(String),

    /// The root directory has no free slot left for `create`.
    #[error("root directory is full")]
    NoDirSlot,

    /// The handle table has no free slot left for `open`.
    #[error("no free file handle")]
    NoHandleSlot,

    /// `fd` was out of range, or referenced a closed slot.
    #[error("invalid file handle: {0}")]
    HandleInvalid(usize),

    /// `delete` was called on a file that is still open somewhere.
    #[error("file is open, cannot delete: {0}")]
    FileBusy(String),

    /// `seek` targeted an offset past the current end of file.
    #[error("seek offset {offset} exceeds file size {size}")]
    SeekOutOfRange {
        /// The offset that was requested.
        offset: u32,
        /// The file's current size.
        size: u32,
    },

    /// The FAT ran out of free entries mid-write. Not raised as an error by
    /// `write` itself (a short write is a valid, non-error outcome) — used
    /// internally and by callers who want to distinguish "disk full" from
    /// other zero-progress causes.
    #[error("disk is full")]
    DiskFull,

    /// A `format()` request could not be satisfied: the requested
    /// `fat_block_count` leaves zero data blocks, or more than the FAT's
    /// 16-bit entry space can address.
    #[error("cannot format: {0}")]
    FormatInvalid(String),

    /// An I/O error surfaced by the underlying [`crate::device::BlockDevice`].
    #[error("device i/o error: {0}")]
    Io(#[from] std::io::Error),
}
