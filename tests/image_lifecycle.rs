//! End-to-end tests against a real file-backed image, exercising the
//! scenarios and numbered properties from the specification's test section.

use microfat::{create_file_device, format, Error, Filesystem};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn new_image(path: &std::path::Path, total_block_count: u64, fat_block_count: u8) {
    init_logging();
    let device = create_file_device(path, total_block_count).unwrap();
    format(&device, fat_block_count).unwrap();
}

#[test]
fn s7_format_then_mount_yields_empty_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.fs");
    new_image(&path, 8192, 4);

    let fs = Filesystem::mount(&path).unwrap();
    let info = fs.info();
    assert_eq!(info.total_block_count, 8192);
    assert_eq!(info.data_block_count, 8186);
    assert_eq!(info.fat_free, 8186);
    assert_eq!(info.dir_free, 128);
}

#[test]
fn s3_multi_block_write_and_unaligned_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.fs");
    new_image(&path, 64, 1);

    let mut fs = Filesystem::mount(&path).unwrap();
    fs.create("big").unwrap();
    let fd = fs.open("big").unwrap();

    let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    assert_eq!(fs.write(fd, &data).unwrap(), 5000);
    assert_eq!(fs.stat(fd).unwrap(), 5000);

    fs.seek(fd, 4090).unwrap();
    let mut out = [0u8; 20];
    assert_eq!(fs.read(fd, &mut out).unwrap(), 20);
    assert_eq!(&out[..], &data[4090..4110]);

    let entry = fs.ls().into_iter().find(|e| e.name == "big").unwrap();
    assert_eq!(entry.first_data_block_index, 0);
}

#[test]
fn s4_partial_write_at_unaligned_offset_preserves_untouched_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.fs");
    new_image(&path, 64, 1);

    let mut fs = Filesystem::mount(&path).unwrap();
    fs.create("f").unwrap();
    let fd = fs.open("f").unwrap();

    let original = vec![b'a'; 100];
    fs.write(fd, &original).unwrap();
    fs.seek(fd, 50).unwrap();
    fs.write(fd, &[b'b'; 10]).unwrap();

    fs.seek(fd, 0).unwrap();
    let mut out = [0u8; 100];
    fs.read(fd, &mut out).unwrap();
    assert_eq!(&out[..50], &original[..50]);
    assert_eq!(&out[50..60], &[b'b'; 10]);
    assert_eq!(&out[60..100], &original[60..100]);
}

#[test]
fn s5_disk_full_short_write_then_zero_progress() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.fs");
    // fat_block_count=1, 1 superblock + 1 fat + 1 root dir + 1 data block.
    new_image(&path, 4, 1);

    let mut fs = Filesystem::mount(&path).unwrap();
    fs.create("f").unwrap();
    let fd = fs.open("f").unwrap();

    let block_size = 4096usize;
    let data = vec![7u8; block_size + 1];
    assert_eq!(fs.write(fd, &data).unwrap(), block_size);
    assert_eq!(fs.stat(fd).unwrap(), block_size as u32);

    assert_eq!(fs.write(fd, &[1u8]).unwrap(), 0);
    assert_eq!(fs.stat(fd).unwrap(), block_size as u32);
}

#[test]
fn property_9_delete_vs_open_exclusion() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.fs");
    new_image(&path, 64, 1);

    let mut fs = Filesystem::mount(&path).unwrap();
    fs.create("f").unwrap();
    let fd = fs.open("f").unwrap();

    assert!(matches!(fs.delete("f"), Err(Error::FileBusy(_))));
    fs.close(fd).unwrap();
    fs.delete("f").unwrap();
}

#[test]
fn property_5_free_count_conservation_across_writes_and_deletes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.fs");
    new_image(&path, 64, 1);
    let data_block_count = Filesystem::mount(&path).unwrap().info().data_block_count;

    let mut fs = Filesystem::mount(&path).unwrap();
    fs.create("a").unwrap();
    let fd_a = fs.open("a").unwrap();
    fs.write(fd_a, &vec![1u8; 9000]).unwrap();
    fs.close(fd_a).unwrap();

    fs.create("b").unwrap();
    let fd_b = fs.open("b").unwrap();
    fs.write(fd_b, &vec![2u8; 100]).unwrap();
    fs.close(fd_b).unwrap();

    let a_len = (fs.stat_by_name("a") as u64 + 4095) / 4096;
    let b_len = (fs.stat_by_name("b") as u64 + 4095) / 4096;
    assert_eq!(fs.info().fat_free as u64 + a_len + b_len, data_block_count as u64);

    fs.delete("a").unwrap();
    let b_len = (fs.stat_by_name("b") as u64 + 4095) / 4096;
    assert_eq!(fs.info().fat_free as u64 + b_len, data_block_count as u64);
}

#[test]
fn remount_after_unmount_is_allowed_and_persists_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.fs");
    new_image(&path, 64, 1);

    {
        let mut fs = Filesystem::mount(&path).unwrap();
        fs.create("hello").unwrap();
        let fd = fs.open("hello").unwrap();
        fs.write(fd, b"world!").unwrap();
        fs.close(fd).unwrap();
        fs.unmount().unwrap();
    }

    let mut fs = Filesystem::mount(&path).unwrap();
    let fd = fs.open("hello").unwrap();
    let mut out = [0u8; 6];
    assert_eq!(fs.read(fd, &mut out).unwrap(), 6);
    assert_eq!(&out, b"world!");
}

#[test]
fn mounting_a_bad_signature_image_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.fs");
    new_image(&path, 64, 1);

    {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        f.seek(SeekFrom::Start(0)).unwrap();
        f.write_all(b"X").unwrap();
    }

    assert!(matches!(Filesystem::mount(&path), Err(Error::BadSignature(_))));
}

trait StatByName {
    fn stat_by_name(&mut self, name: &str) -> u32;
}

impl<D: microfat::BlockDevice> StatByName for Filesystem<D> {
    fn stat_by_name(&mut self, name: &str) -> u32 {
        let fd = self.open(name).unwrap();
        let size = self.stat(fd).unwrap();
        self.close(fd).unwrap();
        size
    }
}
