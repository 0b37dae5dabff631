//! The superblock (spec §3): the single metadata block at disk offset 0.
//!
//! Stored and manipulated as a raw `[u8; BLOCK_SIZE]`, the same way the
//! teacher crate's `BootSector` stores its `[u8; 512]` — we need the whole
//! block around anyway to preserve the padding bytes verbatim on flush, so
//! there is no separate "parsed" representation to fall out of sync with it.

use index_fixed::index_fixed;

use crate::error::{Error, Result};
use crate::layout::{BLOCK_SIZE, SIGNATURE};

/// The filesystem's superblock, read once at mount and never rewritten
/// (spec §4.1: "the superblock is treated as read-only after mount").
#[derive(Clone)]
pub struct Superblock {
    raw: [u8; BLOCK_SIZE],
}

impl Superblock {
    /// Parse and validate a superblock from a freshly read block-0 image.
    ///
    /// `device_block_count` is the block device's own idea of its size,
    /// checked against the value the superblock itself claims (spec §4.1).
    pub fn from_block(raw: [u8; BLOCK_SIZE], device_block_count: u64) -> Result<Self> {
        let sb = Superblock { raw };
        sb.validate(device_block_count)?;
        Ok(sb)
    }

    /// The raw block, as last read or as built by [`crate::format::format`].
    pub fn raw(&self) -> &[u8; BLOCK_SIZE] {
        &self.raw
    }

    /// The 8-byte signature (offset 0, size 8). Must equal [`SIGNATURE`].
    pub fn signature(&self) -> &[u8; 8] {
        index_fixed!(&self.raw; 0, .. 8)
    }

    /// Total block count of the underlying device (offset 8, size 2).
    pub fn total_block_count(&self) -> u16 {
        u16::from_le_bytes(*index_fixed!(&self.raw; 8, .. 10))
    }

    /// Disk block holding the root directory (offset 10, size 2).
    pub fn root_dir_block_index(&self) -> u16 {
        u16::from_le_bytes(*index_fixed!(&self.raw; 10, .. 12))
    }

    /// First disk block of the data region (offset 12, size 2).
    pub fn data_start_block_index(&self) -> u16 {
        u16::from_le_bytes(*index_fixed!(&self.raw; 12, .. 14))
    }

    /// Number of data blocks, i.e. meaningful FAT entries (offset 14, size 2).
    pub fn data_block_count(&self) -> u16 {
        u16::from_le_bytes(*index_fixed!(&self.raw; 14, .. 16))
    }

    /// Number of blocks occupied by the FAT (offset 16, size 1).
    pub fn fat_block_count(&self) -> u8 {
        self.raw[16]
    }

    fn validate(&self, device_block_count: u64) -> Result<()> {
        if *self.signature() != SIGNATURE {
            return Err(Error::BadSignature(self.signature().to_vec()));
        }
        if self.total_block_count() as u64 != device_block_count {
            return Err(Error::BadDevice(format!(
                "superblock claims {} blocks, device has {device_block_count}",
                self.total_block_count()
            )));
        }
        let structural = self.fat_block_count() as u32 + 1 + 1 + self.data_block_count() as u32;
        if structural > self.total_block_count() as u32 {
            return Err(Error::BadDevice(format!(
                "superblock's fat ({}) + root dir (1) + data ({}) blocks exceed its total ({})",
                self.fat_block_count(),
                self.data_block_count(),
                self.total_block_count()
            )));
        }
        Ok(())
    }

    /// Build the raw block-0 image for a fresh filesystem of the given
    /// shape. Used only by [`crate::format::format`]; never called on a
    /// mounted filesystem, since the superblock is immutable post-mount.
    pub fn build(total_block_count: u16, fat_block_count: u8, data_block_count: u16) -> [u8; BLOCK_SIZE] {
        let mut raw = [0u8; BLOCK_SIZE];
        raw[0..8].copy_from_slice(&SIGNATURE);
        raw[8..10].copy_from_slice(&total_block_count.to_le_bytes());
        raw[10..12].copy_from_slice(&crate::layout::root_dir_block_index(fat_block_count).to_le_bytes());
        raw[12..14]
            .copy_from_slice(&crate::layout::data_start_block_index(fat_block_count).to_le_bytes());
        raw[14..16].copy_from_slice(&data_block_count.to_le_bytes());
        raw[16] = fat_block_count;
        raw
    }
}

impl std::fmt::Debug for Superblock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Superblock")
            .field("signature", &fmt_extra::AsciiStr(*self.signature()))
            .field("total_block_count", &self.total_block_count())
            .field("root_dir_block_index", &self.root_dir_block_index())
            .field("data_start_block_index", &self.data_start_block_index())
            .field("data_block_count", &self.data_block_count())
            .field("fat_block_count", &self.fat_block_count())
            .finish()
    }
}
