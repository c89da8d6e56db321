use std::os::unix::fs::FileExt;

use hammer2_fs::{
    FsckOptions, NewfsOptions, ReconstructOptions, Volume, fsck, newfs, reconstruct,
};
use hammer2_ondisk::VOLUME_BYTES;

const MB: u64 = 1024 * 1024;

fn make_image(len: u64) -> tempfile::NamedTempFile {
    let img = tempfile::NamedTempFile::new().unwrap();
    img.as_file().set_len(len).unwrap();
    img
}

fn format_image(img: &tempfile::NamedTempFile) {
    let opts = NewfsOptions {
        boot_size: Some(8 * MB),
        aux_size: Some(8 * MB),
        version: None,
        labels: vec!["LOCAL".to_string(), "ROOT".to_string()],
    };
    newfs(img.path(), &opts).unwrap();
}

fn quiet_fsck() -> FsckOptions {
    FsckOptions {
        quiet: 1,
        ..Default::default()
    }
}

fn flip_byte(img: &tempfile::NamedTempFile, offset: u64) {
    let file = img.as_file();
    let mut byte = [0u8; 1];
    file.read_exact_at(&mut byte, offset).unwrap();
    byte[0] ^= 0xFF;
    file.write_all_at(&byte, offset).unwrap();
    file.sync_all().unwrap();
}

/// Media offset of the first PFS root inode.
fn first_root_inode_offset(img: &tempfile::NamedTempFile) -> u64 {
    let vol = Volume::open(img.path(), true).unwrap();
    let header = vol.read_volume_header(0).unwrap();
    let sroot_bref = header.as_voldata().sroot_blockset.blockref[0];
    let (media, _) = vol.read_media(&sroot_bref).unwrap();
    let entry = media.as_inode().u.blockset().blockref[0];
    assert!(!entry.is_empty());
    entry.io_offset()
}

#[test]
fn test_tamper_detect_repair_cycle() {
    let img = make_image(200 * MB);
    format_image(&img);
    assert!(fsck(img.path(), &quiet_fsck()).unwrap());

    // Flip one byte inside the first root inode's filename.
    let inode_off = first_root_inode_offset(&img);
    flip_byte(&img, inode_off + 0x100);
    assert!(!fsck(img.path(), &quiet_fsck()).unwrap());

    // A dry run reports the drifted check but writes nothing.
    let dry = reconstruct(img.path(), ReconstructOptions { force: false }).unwrap();
    assert!(dry.mismatches >= 1);
    assert_eq!(dry.modified, 0);
    assert!(!fsck(img.path(), &quiet_fsck()).unwrap());

    // A forced run patches the parent slot, the super-root's own check,
    // and the header CRCs; the volume verifies clean again.
    let forced = reconstruct(img.path(), ReconstructOptions { force: true }).unwrap();
    assert!(forced.modified >= 1);
    assert!(fsck(img.path(), &quiet_fsck()).unwrap());

    let opts = FsckOptions {
        scan_best: true,
        ..quiet_fsck()
    };
    assert!(fsck(img.path(), &opts).unwrap());
}

#[test]
fn test_reconstruct_is_idempotent() {
    let img = make_image(200 * MB);
    format_image(&img);

    let inode_off = first_root_inode_offset(&img);
    flip_byte(&img, inode_off + 0x100);

    reconstruct(img.path(), ReconstructOptions { force: true }).unwrap();
    let second = reconstruct(img.path(), ReconstructOptions { force: true }).unwrap();
    assert_eq!(second.mismatches, 0);
    assert_eq!(second.modified, 0);
    assert_eq!(second.unsupported, 0);
}

#[test]
fn test_reconstruct_clean_volume_writes_nothing() {
    let img = make_image(200 * MB);
    format_image(&img);

    let before = std::fs::read(img.path()).unwrap();
    let summary = reconstruct(img.path(), ReconstructOptions { force: true }).unwrap();
    assert_eq!(summary.mismatches, 0);
    assert_eq!(summary.modified, 0);
    let after = std::fs::read(img.path()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_header_crc_repair() {
    let img = make_image(200 * MB);
    format_image(&img);

    // Corrupt the whole-header CRC in place.
    flip_byte(&img, VOLUME_BYTES as u64 - 4);
    assert!(!fsck(img.path(), &quiet_fsck()).unwrap());

    let forced = reconstruct(img.path(), ReconstructOptions { force: true }).unwrap();
    assert!(forced.mismatches >= 1);
    assert!(forced.modified >= 1);
    assert!(fsck(img.path(), &quiet_fsck()).unwrap());
}

#[test]
fn test_bad_magic_is_fatal_to_reconstruct() {
    let img = make_image(200 * MB);
    format_image(&img);

    flip_byte(&img, 0);
    assert!(!fsck(img.path(), &quiet_fsck()).unwrap());
    assert!(reconstruct(img.path(), ReconstructOptions { force: true }).is_err());
}

#[test]
fn test_best_replica_skips_bad_magic() {
    // Three zones; replica 0's magic is destroyed. A full scan fails but
    // a best-replica scan settles on replica 1 and passes.
    let img = make_image(4608 * MB);
    format_image(&img);

    flip_byte(&img, 0);
    assert!(!fsck(img.path(), &quiet_fsck()).unwrap());

    let opts = FsckOptions {
        scan_best: true,
        ..quiet_fsck()
    };
    assert!(fsck(img.path(), &opts).unwrap());
}

#[test]
fn test_force_fsck_continues_past_bad_header() {
    let img = make_image(200 * MB);
    format_image(&img);

    // Corrupt a reserved header byte: all three CRCs drift but the body
    // is intact, so a forced scan still walks the topology.
    flip_byte(&img, 0x100);
    assert!(!fsck(img.path(), &quiet_fsck()).unwrap());

    let opts = FsckOptions {
        force: true,
        ..quiet_fsck()
    };
    assert!(!fsck(img.path(), &opts).unwrap());
}
