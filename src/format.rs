//! Image formatting (spec §4.9) — an ambient addition absent from both the
//! distilled spec and the original `libfs/fs.c` (which only ever mounted
//! pre-built images). Grounded on
//! `examples/maestro-os-maestro-utils/src/mkfs/mod.rs`'s `FSFactory::create`
//! shape: given a device, lay down a fresh, structurally valid filesystem.

use log::info;

use crate::device::BlockDevice;
use crate::error::{Error, Result};
use crate::fat::Fat;
use crate::directory::RootDirectory;
use crate::layout::root_dir_block_index;
use crate::superblock::Superblock;

/// Write a fresh superblock, all-free FAT, and empty root directory to
/// `device`. `fat_block_count` determines how much of the device's block
/// space is spent on FAT versus data.
///
/// `format` does not mount the result; call [`crate::Filesystem::mount`]
/// (or [`crate::Filesystem::mount_device`]) afterward.
pub fn format(device: &dyn BlockDevice, fat_block_count: u8) -> Result<()> {
    let total_block_count = device.block_count();
    if total_block_count > u16::MAX as u64 {
        return Err(Error::FormatInvalid(format!(
            "device has {total_block_count} blocks, superblock counts are 16-bit"
        )));
    }
    let reserved = fat_block_count as u64 + 1 + 1;
    if reserved >= total_block_count {
        return Err(Error::FormatInvalid(format!(
            "fat_block_count {fat_block_count} leaves no room for data on a {total_block_count}-block device"
        )));
    }
    let data_block_count = total_block_count - reserved;
    if data_block_count > u16::MAX as u64 {
        return Err(Error::FormatInvalid(format!(
            "fat_block_count {fat_block_count} would address {data_block_count} data blocks, more than a FAT entry (u16) can index"
        )));
    }

    let raw = Superblock::build(total_block_count as u16, fat_block_count, data_block_count as u16);
    device.write_block(0, &raw)?;

    let fat = Fat::new_empty(fat_block_count, data_block_count as u16);
    fat.flush(device)?;

    let dir = RootDirectory::new_empty();
    dir.flush(device, root_dir_block_index(fat_block_count))?;

    info!(
        "formatted {total_block_count}-block device: {fat_block_count} fat block(s), {data_block_count} data block(s)"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemDevice;

    #[test]
    fn format_then_mount_yields_empty_filesystem() {
        let dev = MemDevice::new(8192);
        format(&dev, 4).unwrap();

        let fs = crate::Filesystem::mount_device(dev).unwrap();
        assert_eq!(fs.info().total_block_count, 8192);
        assert_eq!(fs.info().data_block_count, 8186);
        assert_eq!(fs.info().fat_free, 8186);
        assert_eq!(fs.info().dir_free, 128);
    }

    #[test]
    fn rejects_fat_block_count_leaving_no_data() {
        let dev = MemDevice::new(4);
        assert!(matches!(format(&dev, 4), Err(Error::FormatInvalid(_))));
    }
}
