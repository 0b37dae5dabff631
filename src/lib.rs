//! A simplified FAT-style filesystem mounted in-process over a fixed-size
//! block device.
//!
//! Layout and semantics:
//!
//! ```text
//! block 0                     superblock
//! blocks 1..=fat_block_count  FAT (little-endian u16 entries)
//! block  fat_block_count + 1  root directory (128 x 32-byte entries)
//! blocks fat_block_count + 2.. data blocks
//! ```
//!
//! `Filesystem<D>` only exists once a mount has succeeded — there is no
//! in-type "unmounted" state capable of receiving a `read`/`write`/etc.
//! call, so `NotMounted` is unreachable through this type and is reserved
//! for [`Session`], a thin convenience wrapper around `Option<Filesystem<D>>`
//! for callers who want mount/unmount to be ordinary fallible calls on one
//! long-lived handle rather than a value's construction and consumption.

pub mod device;
pub mod error;
pub mod format;
pub mod layout;

mod directory;
mod fat;
mod handle;
mod io_engine;
mod superblock;

pub use device::{create_file_device, open_file_device, BlockDevice, BlockStore, FileDevice, MemDevice};
pub use error::{Error, Result};
pub use format::format;

use directory::RootDirectory;
use fat::Fat;
use handle::HandleTable;
use layout::MAX_FILES;
use superblock::Superblock;

/// A mounted filesystem: owned device plus the in-memory metadata image
/// (superblock, FAT, root directory) and the open-handle table for this
/// mount.
pub struct Filesystem<D: BlockDevice> {
    device: D,
    superblock: Superblock,
    fat: Fat,
    dir: RootDirectory,
    handles: HandleTable,
}

/// Snapshot of filesystem-wide counters, as produced by [`Filesystem::info`].
#[derive(Debug, Clone, Copy)]
pub struct Info {
    pub total_block_count: u16,
    pub fat_block_count: u8,
    pub root_dir_block_index: u16,
    pub data_start_block_index: u16,
    pub data_block_count: u16,
    pub fat_free: u16,
    pub dir_free: usize,
}

impl std::fmt::Display for Info {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "FS Info:")?;
        writeln!(f, "total_blk_count={}", self.total_block_count)?;
        writeln!(f, "fat_blk_count={}", self.fat_block_count)?;
        writeln!(f, "rdir_blk={}", self.root_dir_block_index)?;
        writeln!(f, "data_blk={}", self.data_start_block_index)?;
        writeln!(f, "data_blk_count={}", self.data_block_count)?;
        writeln!(f, "fat_free_ratio={}/{}", self.fat_free, self.data_block_count)?;
        write!(f, "rdir_free_ratio={}/{}", self.dir_free, MAX_FILES)
    }
}

/// One row of [`Filesystem::ls`].
#[derive(Debug, Clone)]
pub struct ListEntry {
    pub name: String,
    pub size: u32,
    pub first_data_block_index: u16,
}

impl std::fmt::Display for ListEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "file: {}, size: {}, data_blk: {}",
            self.name, self.size, self.first_data_block_index
        )
    }
}

/// The full text report produced by [`Filesystem::ls_report`], mirroring how
/// [`Info`] renders [`Filesystem::info`].
#[derive(Debug, Clone)]
pub struct Ls(pub Vec<ListEntry>);

impl std::fmt::Display for Ls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FS Ls:")?;
        for entry in &self.0 {
            write!(f, "\n{entry}")?;
        }
        Ok(())
    }
}

/// Returned by [`Filesystem::unmount`] on failure, so the caller does not
/// lose the filesystem value (and whatever handles are still open on it)
/// just because unmount was rejected.
pub struct UnmountError<D: BlockDevice> {
    pub filesystem: Filesystem<D>,
    pub source: Error,
}

impl<D: BlockDevice> std::fmt::Debug for UnmountError<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnmountError").field("source", &self.source).finish()
    }
}

impl<D: BlockDevice> std::fmt::Display for UnmountError<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.source.fmt(f)
    }
}

impl<D: BlockDevice> std::error::Error for UnmountError<D> {}

impl<D: BlockDevice> Filesystem<D> {
    /// Mount `device`: read and validate its superblock, load the FAT and
    /// root directory into memory, and start with an all-free handle table.
    pub fn mount_device(device: D) -> Result<Self> {
        let mut raw = [0u8; layout::BLOCK_SIZE];
        device.read_block(0, &mut raw).map_err(|e| {
            log::warn!("mount failed: could not read superblock: {e}");
            e
        })?;
        let superblock = Superblock::from_block(raw, device.block_count()).map_err(|e| {
            log::warn!("mount failed: {e}");
            e
        })?;

        let fat = Fat::read(&device, superblock.fat_block_count(), superblock.data_block_count())
            .map_err(|e| {
                log::warn!("mount failed: could not read fat: {e}");
                e
            })?;
        let dir = RootDirectory::read(&device, superblock.root_dir_block_index()).map_err(|e| {
            log::warn!("mount failed: could not read root directory: {e}");
            e
        })?;

        log::debug!(
            "mounted: {} blocks, {} fat block(s), {} data blocks",
            superblock.total_block_count(),
            superblock.fat_block_count(),
            superblock.data_block_count()
        );

        Ok(Filesystem {
            device,
            superblock,
            fat,
            dir,
            handles: HandleTable::new(),
        })
    }

    /// Release this mount. Fails with [`Error::FileBusy`] while any handle
    /// is still open, returning `self` unchanged so the caller can close
    /// the offending handles and retry. On success, flushes the FAT and
    /// root directory (the superblock is never rewritten) and returns the
    /// device.
    pub fn unmount(self) -> std::result::Result<D, UnmountError<D>> {
        if self.handles.any_open() {
            let source = Error::FileBusy("one or more handles are still open".to_string());
            log::warn!("unmount failed: {source}");
            return Err(UnmountError {
                source,
                filesystem: self,
            });
        }
        if let Err(source) = self.fat.flush(&self.device) {
            log::warn!("unmount failed to flush fat: {source}");
            return Err(UnmountError { filesystem: self, source });
        }
        if let Err(source) = self
            .dir
            .flush(&self.device, self.superblock.root_dir_block_index())
        {
            log::warn!("unmount failed to flush root directory: {source}");
            return Err(UnmountError { filesystem: self, source });
        }
        log::debug!("unmounted");
        Ok(self.device)
    }

    /// Filesystem-wide counters (spec §4.6).
    pub fn info(&self) -> Info {
        Info {
            total_block_count: self.superblock.total_block_count(),
            fat_block_count: self.superblock.fat_block_count(),
            root_dir_block_index: self.superblock.root_dir_block_index(),
            data_start_block_index: self.superblock.data_start_block_index(),
            data_block_count: self.superblock.data_block_count(),
            fat_free: self.fat.free_count(),
            dir_free: MAX_FILES - self.dir.iter_occupied().count(),
        }
    }

    /// Every non-empty directory entry, in directory order.
    pub fn ls(&self) -> Vec<ListEntry> {
        self.dir
            .iter_occupied()
            .map(|(_, e)| ListEntry {
                name: String::from_utf8_lossy(e.filename()).into_owned(),
                size: e.file_size(),
                first_data_block_index: e.first_data_block_index(),
            })
            .collect()
    }

    /// Same listing as [`Filesystem::ls`], wrapped in the `FS Ls:` text
    /// report format.
    pub fn ls_report(&self) -> Ls {
        Ls(self.ls())
    }

    /// Create an empty file named `name`. See [`directory`](crate) for the
    /// exact name-validity and uniqueness rules.
    pub fn create(&mut self, name: &str) -> Result<()> {
        if let Err(e) = self.dir.create(name) {
            log::warn!("create {name:?} failed: {e}");
            return Err(e);
        }
        if let Err(e) = self.flush_metadata() {
            log::warn!("create {name:?} failed to flush: {e}");
            return Err(e);
        }
        log::info!("created {name:?}");
        Ok(())
    }

    /// Delete `name`, reclaiming its data blocks. Errors if `name` is open.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let index = match self.dir.lookup(name) {
            Some(index) => index,
            None => {
                let e = Error::NameNotFound(name.to_string());
                log::warn!("delete {name:?} failed: {e}");
                return Err(e);
            }
        };
        if self.handles.is_referenced(index) {
            let e = Error::FileBusy(name.to_string());
            log::warn!("delete {name:?} failed: {e}");
            return Err(e);
        }
        let head = self.dir.entry(index).first_data_block_index();
        if let Err(e) = self
            .fat
            .clear_chain(&self.device, self.superblock.fat_block_count(), head)
        {
            log::warn!("delete {name:?} failed to clear its chain: {e}");
            return Err(e);
        }
        self.dir.erase(index);
        if let Err(e) = self.flush_metadata() {
            log::warn!("delete {name:?} failed to flush: {e}");
            return Err(e);
        }
        log::info!("deleted {name:?}");
        Ok(())
    }

    /// Open `name`, returning a file descriptor positioned at offset 0.
    pub fn open(&mut self, name: &str) -> Result<usize> {
        let index = match self.dir.lookup(name) {
            Some(index) => index,
            None => {
                let e = Error::NameNotFound(name.to_string());
                log::warn!("open {name:?} failed: {e}");
                return Err(e);
            }
        };
        let fd = self.handles.open(index).map_err(|e| {
            log::warn!("open {name:?} failed: {e}");
            e
        })?;
        log::debug!("opened {name:?} as fd {fd}");
        Ok(fd)
    }

    /// Close `fd`.
    pub fn close(&mut self, fd: usize) -> Result<()> {
        self.handles.close(fd).map_err(|e| {
            log::warn!("close fd {fd} failed: {e}");
            e
        })?;
        log::debug!("closed fd {fd}");
        Ok(())
    }

    /// Current size, in bytes, of the file `fd` refers to.
    pub fn stat(&self, fd: usize) -> Result<u32> {
        let handle = self.handles.get(fd)?;
        Ok(self.dir.entry(handle.dir_index).file_size())
    }

    /// Move `fd`'s cursor to `offset`. Errors if `offset` exceeds the
    /// file's current size (growth happens only through `write`).
    pub fn seek(&mut self, fd: usize, offset: u32) -> Result<()> {
        let handle = self.handles.get_mut(fd)?;
        let dir_index = handle.dir_index;
        let file_size = self.dir.entry(dir_index).file_size();
        if offset > file_size {
            return Err(Error::SeekOutOfRange {
                offset,
                size: file_size,
            });
        }
        self.handles.get_mut(fd)?.byte_offset = offset;
        Ok(())
    }

    /// Read up to `buf.len()` bytes from `fd`, clamped at end of file.
    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize> {
        let handle = self.handles.get_mut(fd)?;
        io_engine::read(
            &self.device,
            &self.fat,
            self.superblock.fat_block_count(),
            &self.dir,
            handle,
            buf,
        )
    }

    /// Write `buf` to `fd`, extending the file's chain as needed. A short
    /// write (fewer bytes than requested) signals disk-full, not an error.
    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<usize> {
        let handle = self.handles.get_mut(fd)?;
        let n = io_engine::write(
            &self.device,
            &mut self.fat,
            self.superblock.fat_block_count(),
            &mut self.dir,
            handle,
            buf,
        )?;
        self.flush_metadata()?;
        if n < buf.len() {
            log::warn!("short write on fd {fd}: {n} of {} bytes", buf.len());
        } else {
            log::debug!("wrote {n} bytes to fd {fd}");
        }
        Ok(n)
    }

    fn flush_metadata(&self) -> Result<()> {
        self.fat.flush(&self.device)?;
        self.dir
            .flush(&self.device, self.superblock.root_dir_block_index())
    }
}

impl Filesystem<FileDevice> {
    /// Mount the image at `path`.
    pub fn mount(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let device = open_file_device(path)?;
        Self::mount_device(device)
    }
}

/// A process-level convenience handle mirroring the original single-mount
/// module statics (spec §5, §9 DESIGN NOTES): owns at most one
/// [`Filesystem`] at a time, turning `mount`/`unmount` into ordinary
/// fallible calls against one long-lived value instead of construction and
/// consumption of `Filesystem` itself. Entirely optional — callers that
/// are comfortable holding an `Option<Filesystem<D>>` themselves have no
/// need for this type.
#[derive(Default)]
pub struct Session<D: BlockDevice> {
    fs: Option<Filesystem<D>>,
}

impl<D: BlockDevice> Session<D> {
    /// An unmounted session.
    pub fn new() -> Self {
        Session { fs: None }
    }

    /// Mount `device`. Errors with [`Error::AlreadyMounted`] if a
    /// filesystem is already mounted on this session.
    pub fn mount_device(&mut self, device: D) -> Result<()> {
        if self.fs.is_some() {
            return Err(Error::AlreadyMounted);
        }
        self.fs = Some(Filesystem::mount_device(device)?);
        Ok(())
    }

    /// Unmount the current filesystem. Errors with [`Error::NotMounted`]
    /// if nothing is mounted, or propagates [`Error::FileBusy`] (leaving
    /// the session mounted) if any handle is still open.
    pub fn unmount(&mut self) -> Result<()> {
        let fs = self.fs.take().ok_or(Error::NotMounted)?;
        match fs.unmount() {
            Ok(_device) => Ok(()),
            Err(e) => {
                self.fs = Some(e.filesystem);
                Err(e.source)
            }
        }
    }

    fn mounted(&self) -> Result<&Filesystem<D>> {
        self.fs.as_ref().ok_or(Error::NotMounted)
    }

    fn mounted_mut(&mut self) -> Result<&mut Filesystem<D>> {
        self.fs.as_mut().ok_or(Error::NotMounted)
    }

    pub fn info(&self) -> Result<Info> {
        Ok(self.mounted()?.info())
    }

    pub fn ls(&self) -> Result<Vec<ListEntry>> {
        Ok(self.mounted()?.ls())
    }

    pub fn ls_report(&self) -> Result<Ls> {
        Ok(self.mounted()?.ls_report())
    }

    pub fn create(&mut self, name: &str) -> Result<()> {
        self.mounted_mut()?.create(name)
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        self.mounted_mut()?.delete(name)
    }

    pub fn open(&mut self, name: &str) -> Result<usize> {
        self.mounted_mut()?.open(name)
    }

    pub fn close(&mut self, fd: usize) -> Result<()> {
        self.mounted_mut()?.close(fd)
    }

    pub fn stat(&self, fd: usize) -> Result<u32> {
        self.mounted()?.stat(fd)
    }

    pub fn seek(&mut self, fd: usize, offset: u32) -> Result<()> {
        self.mounted_mut()?.seek(fd, offset)
    }

    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize> {
        self.mounted_mut()?.read(fd, buf)
    }

    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<usize> {
        self.mounted_mut()?.write(fd, buf)
    }
}

impl Session<FileDevice> {
    /// Mount the image at `path`. Errors with [`Error::AlreadyMounted`] if
    /// a filesystem is already mounted on this session.
    pub fn mount(&mut self, path: impl AsRef<std::path::Path>) -> Result<()> {
        if self.fs.is_some() {
            return Err(Error::AlreadyMounted);
        }
        self.fs = Some(Filesystem::mount(path)?);
        Ok(())
    }
}
