use hammer2_common::icrc32;
use hammer2_fs::{FsckOptions, NewfsOptions, Volume, child_blockrefs, fsck, newfs};
use hammer2_ondisk::{
    BREF_TYPE_INODE, BREF_TYPE_VOLUME, Blockref, CHECK_XXHASH64, COMP_AUTOZERO,
    COMP_NEWFS_DEFAULT, PFSTYPE_MASTER, VOL_ICRC_SECT0, VOL_ICRC_SECT1, VOLUME_ID_HBO,
};

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * MB;

fn make_image(len: u64) -> tempfile::NamedTempFile {
    let img = tempfile::NamedTempFile::new().unwrap();
    img.as_file().set_len(len).unwrap();
    img
}

fn newfs_opts(labels: &[&str]) -> NewfsOptions {
    NewfsOptions {
        boot_size: Some(8 * MB),
        aux_size: Some(8 * MB),
        version: None,
        labels: labels.iter().map(|l| l.to_string()).collect(),
    }
}

fn quiet_fsck() -> FsckOptions {
    FsckOptions {
        quiet: 1,
        ..Default::default()
    }
}

#[test]
fn test_newfs_reports_geometry() {
    let img = make_image(200 * MB);
    let result = newfs(img.path(), &newfs_opts(&["LOCAL", "ROOT"])).unwrap();

    assert_eq!(result.version, 1);
    assert_eq!(result.total_space, 200 * MB);
    assert_eq!(result.boot_size, 8 * MB);
    assert_eq!(result.aux_size, 8 * MB);
    // 4 MiB reserved per started GiB.
    assert_eq!(result.reserved_space, 4 * MB);
    assert_eq!(result.free_space, 200 * MB - 4 * MB - 16 * MB);
    assert_eq!(result.pfs.len(), 2);
    assert_eq!(result.pfs[0].name, "LOCAL");
    assert_eq!(result.pfs[1].name, "ROOT");
}

#[test]
fn test_newfs_header_contents() {
    let img = make_image(200 * MB);
    newfs(img.path(), &newfs_opts(&["LOCAL", "ROOT"])).unwrap();

    let vol = Volume::open(img.path(), true).unwrap();
    assert_eq!(vol.zone_count(), 1);

    let media = vol.read_volume_header(0).unwrap();
    let voldata = media.as_voldata();
    assert_eq!(voldata.magic, VOLUME_ID_HBO);
    assert_eq!(voldata.version, 1);
    assert_eq!(voldata.volu_size, 200 * MB);
    assert_eq!(voldata.mirror_tid, 16);
    assert_eq!(voldata.freemap_tid, 16);
    assert_eq!(voldata.allocator_size, voldata.allocator_free);

    // The three CRCs hold over their documented ranges.
    let bytes = voldata.as_bytes();
    assert_eq!(voldata.icrc_sects[VOL_ICRC_SECT0], icrc32(&bytes[0..508]));
    assert_eq!(voldata.icrc_sects[VOL_ICRC_SECT1], icrc32(&bytes[512..1024]));
    assert_eq!(voldata.icrc_volheader, icrc32(&bytes[0..65532]));

    let sroot = &voldata.sroot_blockset.blockref[0];
    assert_eq!(sroot.btype, BREF_TYPE_INODE);
    assert_eq!(sroot.data_bytes(), 1024);
    assert_eq!(sroot.key, 0);
}

#[test]
fn test_newfs_then_fsck_clean() {
    let img = make_image(200 * MB);
    newfs(img.path(), &newfs_opts(&["LOCAL", "ROOT"])).unwrap();
    assert!(fsck(img.path(), &quiet_fsck()).unwrap());

    // The best-replica restriction holds on a clean volume too.
    let opts = FsckOptions {
        scan_best: true,
        ..quiet_fsck()
    };
    assert!(fsck(img.path(), &opts).unwrap());
}

#[test]
fn test_sroot_entries_sorted_and_named() {
    let img = make_image(200 * MB);
    newfs(img.path(), &newfs_opts(&["LOCAL", "BOOT", "ROOT", "DATA"])).unwrap();

    let vol = Volume::open(img.path(), true).unwrap();
    let header = vol.read_volume_header(0).unwrap();
    let sroot_bref = header.as_voldata().sroot_blockset.blockref[0];

    let (media, bytes) = vol.read_media(&sroot_bref).unwrap();
    assert_eq!(bytes, 1024);
    let sroot = media.as_inode();
    assert!(sroot.meta.is_sup_root());
    assert_eq!(sroot.name(), b"SUPROOT");
    assert_eq!(sroot.meta.inum, 0);
    assert_eq!(sroot.meta.nlinks, 2);

    let entries: Vec<Blockref> = sroot
        .u
        .blockset()
        .blockref
        .iter()
        .filter(|bref| !bref.is_empty())
        .copied()
        .collect();
    assert_eq!(entries.len(), 4);
    assert!(entries.windows(2).all(|pair| pair[0].key <= pair[1].key));

    let mut names = Vec::new();
    for bref in &entries {
        assert_eq!(bref.btype, BREF_TYPE_INODE);
        let (media, bytes) = vol.read_media(bref).unwrap();
        assert_eq!(bytes, 1024);
        let ipdata = media.as_inode();
        assert!(ipdata.meta.is_pfs_root());
        assert_eq!(ipdata.meta.pfs_type, PFSTYPE_MASTER);
        assert_eq!(ipdata.meta.check_algo, CHECK_XXHASH64);
        assert_eq!(ipdata.meta.inum, 1);
        assert_eq!(bref.key, ipdata.meta.name_key);

        let name = String::from_utf8(ipdata.name().to_vec()).unwrap();
        if name == "BOOT" {
            assert_eq!(ipdata.meta.comp_algo, COMP_AUTOZERO);
        } else {
            assert_eq!(ipdata.meta.comp_algo, COMP_NEWFS_DEFAULT);
        }
        names.push(name);
    }
    names.sort();
    assert_eq!(names, ["BOOT", "DATA", "LOCAL", "ROOT"]);
}

#[test]
fn test_pfs_scan_matches_labels() {
    let img = make_image(200 * MB);
    newfs(img.path(), &newfs_opts(&["LOCAL", "ROOT"])).unwrap();

    let opts = FsckOptions {
        scan_pfs: true,
        ..quiet_fsck()
    };
    assert!(fsck(img.path(), &opts).unwrap());

    let opts = FsckOptions {
        scan_pfs: true,
        pfs_names: vec!["ROOT".to_string()],
        ..quiet_fsck()
    };
    assert!(fsck(img.path(), &opts).unwrap());

    let opts = FsckOptions {
        scan_pfs: true,
        pfs_names: vec!["NOSUCH".to_string()],
        ..quiet_fsck()
    };
    assert!(!fsck(img.path(), &opts).unwrap());
}

#[test]
fn test_size_encoding_invariant() {
    let img = make_image(200 * MB);
    newfs(img.path(), &newfs_opts(&["LOCAL", "ROOT"])).unwrap();

    fn scan(vol: &Volume, bref: &Blockref) {
        if !bref.is_empty() && bref.btype != BREF_TYPE_VOLUME {
            let bytes = bref.data_bytes();
            assert!(bytes == 0 || (1024..=65536).contains(&bytes));
            assert!(bytes == 0 || bytes.is_power_of_two());
            assert_eq!(bref.io_offset() % 64, 0);
        }
        let (media, bytes) = vol.read_media(bref).unwrap();
        for child in child_blockrefs(bref, &media, bytes) {
            if !child.is_empty() {
                scan(vol, child);
            }
        }
    }

    let vol = Volume::open(img.path(), true).unwrap();
    scan(&vol, &Blockref::new_root(BREF_TYPE_VOLUME, 0));
}

#[test]
fn test_label_length_bounds() {
    let img = make_image(200 * MB);
    let exact = "x".repeat(256);
    assert!(newfs(img.path(), &newfs_opts(&["LOCAL", &exact])).is_ok());

    let img = make_image(200 * MB);
    let too_long = "x".repeat(257);
    assert!(newfs(img.path(), &newfs_opts(&["LOCAL", &too_long])).is_err());
}

#[test]
fn test_boot_size_bounds() {
    // Above the maximum is rejected.
    let img = make_image(2 * GB);
    let opts = NewfsOptions {
        boot_size: Some(512 * MB),
        ..newfs_opts(&["LOCAL", "ROOT"])
    };
    assert!(newfs(img.path(), &opts).is_err());

    // Defaults shrink to the 8 MiB floor on a small volume.
    let img = make_image(200 * MB);
    let opts = NewfsOptions {
        boot_size: None,
        aux_size: None,
        version: None,
        labels: vec!["LOCAL".to_string(), "ROOT".to_string()],
    };
    let result = newfs(img.path(), &opts).unwrap();
    assert_eq!(result.boot_size, 8 * MB);
    assert_eq!(result.aux_size, 8 * MB);
}

#[test]
fn test_multi_zone_replicas_identical() {
    // 4.5 GiB spans three zones; every replica is byte identical and the
    // missing fourth is skipped cleanly.
    let img = make_image(4608 * MB);
    newfs(img.path(), &newfs_opts(&["LOCAL", "DATA"])).unwrap();

    let vol = Volume::open(img.path(), true).unwrap();
    assert_eq!(vol.zone_count(), 3);

    let zone0 = vol.read_volume_header(0).unwrap();
    for zone in 1..3 {
        let replica = vol.read_volume_header(zone).unwrap();
        assert_eq!(zone0.buf.as_slice(), replica.buf.as_slice());
    }

    assert!(fsck(img.path(), &quiet_fsck()).unwrap());
}

#[test]
fn test_open_refuses_directories() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Volume::open(dir.path(), true),
        Err(hammer2_fs::FsError::UnsupportedFileType(_))
    ));
}
