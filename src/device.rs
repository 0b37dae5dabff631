//! The block device boundary (spec §4.7/§6.1) and one concrete, file-backed
//! implementation of it (spec §4.8).
//!
//! [`BlockDevice`] is deliberately narrow: "open" and "close" are expressed
//! as ordinary Rust construction and `Drop`, not as trait methods, so
//! "already open"/"not yet open" become type-level facts rather than runtime
//! flags to check.

use std::fs::{File, OpenOptions};

use io_at::{ReadAt, WriteAt};

use crate::error::{Error, Result};
use crate::layout::BLOCK_SIZE;

/// Abstract fixed-size random-access sector I/O.
///
/// Every transfer moves exactly [`BLOCK_SIZE`] bytes. Implementations are
/// the library's only collaborator with the outside world; the core never
/// reaches for `std::fs` directly outside of this module.
pub trait BlockDevice {
    /// Total number of `BLOCK_SIZE`-byte sectors this device exposes.
    fn block_count(&self) -> u64;

    /// Read one full block into `buf`. Errors if `index` is out of range.
    fn read_block(&self, index: u64, buf: &mut [u8; BLOCK_SIZE]) -> Result<()>;

    /// Write one full block from `buf`. Errors if `index` is out of range.
    fn write_block(&self, index: u64, buf: &[u8; BLOCK_SIZE]) -> Result<()>;

    /// Shared range check every implementation delegates to.
    fn check_range(&self, index: u64) -> Result<()> {
        if index >= self.block_count() {
            return Err(Error::BadDevice(format!(
                "block index {} out of range (device has {} blocks)",
                index,
                self.block_count()
            )));
        }
        Ok(())
    }
}

/// Adapts any positioned-I/O store (`ReadAt` + `WriteAt`) into a
/// [`BlockDevice`] by translating block indices into byte offsets.
///
/// This generalizes the teacher crate's `Fs<S: ReadAt>`: rather than one
/// filesystem type parameterized directly over the store, the block-index
/// translation is factored out here so the metadata/allocation/I/O layers
/// above only ever see [`BlockDevice`].
///
/// `ReadAt::read_at`/`WriteAt::write_at` are permitted to transfer fewer
/// bytes than requested (as the teacher crate's own `FIXME` on
/// `BootSector::read_at_from` notes); `BlockStore` loops until a full block
/// has been transferred or the store reports end-of-device.
pub struct BlockStore<S: ReadAt + WriteAt> {
    store: S,
    block_count: u64,
}

impl<S: ReadAt + WriteAt> BlockStore<S> {
    /// Wrap `store`, which is known to expose `block_count` blocks.
    pub fn new(store: S, block_count: u64) -> Self {
        BlockStore { store, block_count }
    }
}

impl<S: ReadAt + WriteAt> BlockDevice for BlockStore<S> {
    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn read_block(&self, index: u64, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        self.check_range(index)?;
        let base = index * BLOCK_SIZE as u64;
        let mut done = 0usize;
        while done < BLOCK_SIZE {
            let n = self.store.read_at(&mut buf[done..], base + done as u64)?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "short read from block device",
                )));
            }
            done += n;
        }
        Ok(())
    }

    fn write_block(&self, index: u64, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        self.check_range(index)?;
        let base = index * BLOCK_SIZE as u64;
        let mut done = 0usize;
        while done < BLOCK_SIZE {
            let n = self.store.write_at(&buf[done..], base + done as u64)?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "short write to block device",
                )));
            }
            done += n;
        }
        Ok(())
    }
}

/// A [`BlockDevice`] backed by a regular file or disk image.
pub type FileDevice = BlockStore<File>;

/// Open an existing image file. Fails if the file cannot be opened for
/// reading and writing, or if its length is not an exact multiple of
/// [`BLOCK_SIZE`].
pub fn open_file_device(path: impl AsRef<std::path::Path>) -> Result<FileDevice> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path.as_ref())
        .map_err(|e| Error::BadDevice(format!("{}: {e}", path.as_ref().display())))?;
    let len = file
        .metadata()
        .map_err(|e| Error::BadDevice(format!("{}: {e}", path.as_ref().display())))?
        .len();
    if len % BLOCK_SIZE as u64 != 0 {
        return Err(Error::BadDevice(format!(
            "{}: length {len} is not a multiple of the block size",
            path.as_ref().display()
        )));
    }
    Ok(BlockStore::new(file, len / BLOCK_SIZE as u64))
}

/// Create a new, zero-filled image file of exactly `block_count` blocks.
/// Used by [`crate::format::format`] to produce a device `mount` can later
/// open.
pub fn create_file_device(
    path: impl AsRef<std::path::Path>,
    block_count: u64,
) -> Result<FileDevice> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path.as_ref())
        .map_err(|e| Error::BadDevice(format!("{}: {e}", path.as_ref().display())))?;
    file.set_len(block_count * BLOCK_SIZE as u64)?;
    Ok(BlockStore::new(file, block_count))
}

/// An in-memory [`BlockDevice`], useful for tests that want to exercise the
/// filesystem without touching the filesystem (the OS kind).
pub struct MemDevice {
    blocks: std::cell::RefCell<Vec<[u8; BLOCK_SIZE]>>,
}

impl MemDevice {
    /// Create a new all-zero device of `block_count` blocks.
    pub fn new(block_count: u64) -> Self {
        MemDevice {
            blocks: std::cell::RefCell::new(vec![[0u8; BLOCK_SIZE]; block_count as usize]),
        }
    }

    /// Snapshot the raw contents of `index`, for assertions in tests.
    pub fn block_bytes(&self, index: u64) -> [u8; BLOCK_SIZE] {
        self.blocks.borrow()[index as usize]
    }
}

impl BlockDevice for MemDevice {
    fn block_count(&self) -> u64 {
        self.blocks.borrow().len() as u64
    }

    fn read_block(&self, index: u64, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        self.check_range(index)?;
        buf.copy_from_slice(&self.blocks.borrow()[index as usize]);
        Ok(())
    }

    fn write_block(&self, index: u64, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        self.check_range(index)?;
        self.blocks.borrow_mut()[index as usize] = *buf;
        Ok(())
    }
}
