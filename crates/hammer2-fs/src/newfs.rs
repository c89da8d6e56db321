//! Format a device or file as a minimal valid HAMMER2 volume: reserved
//! zones, super-root inode, one PFS root inode per label, and all four
//! volume-header replicas.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use hammer2_common::{dirhash, icrc32, xxh64};
use hammer2_ondisk::{
    AUX_MAX_BYTES, AUX_MIN_BYTES, AUX_NOM_BYTES, BOOT_MAX_BYTES, BOOT_MIN_BYTES, BOOT_NOM_BYTES,
    BREF_TYPE_INODE, Blockref,
    BlockrefFlags, CHECK_XXHASH64, COMP_AUTOZERO, COMP_NEWFS_DEFAULT, COMP_NONE, COPYID_LOCAL,
    FREEMAP_LEVEL1_MASK, FREEMAP_LEVEL1_SIZE, INODE_BYTES, INODE_MAXNAME, INODE_VERSION_ONE,
    InodeData, InodeOpFlags, MIN_RADIX, MediaData, NUM_VOLHDRS, OBJTYPE_DIRECTORY, PBUFMASK64,
    PBUFSIZE, PEER_HAMMER2, PFSTYPE_MASTER, PFSTYPE_SUPROOT, SET_COUNT, UUID_STRING,
    VOL_ICRC_SECT0, VOL_ICRC_SECT1, VOL_VERSION_DEFAULT, VOL_VERSION_MIN, VOL_VERSION_WIP,
    VOLUME_ALIGNMASK64, VOLUME_ICRC0_OFF, VOLUME_ICRC0_SIZE, VOLUME_ICRC1_OFF, VOLUME_ICRC1_SIZE,
    VOLUME_ICRCVH_OFF, VOLUME_ICRCVH_SIZE, VOLUME_ID_HBO, ZONE_BLOCKS_SEG, ZONE_BYTES64,
    ZONE_SEG, enc_check, enc_comp,
};
use tracing::debug;
use uuid::Uuid;

use crate::error::{FsError, Result};
use crate::vol::Volume;

#[derive(Debug, Clone, Default)]
pub struct NewfsOptions {
    /// Requested boot area size; `None` selects the default.
    pub boot_size: Option<u64>,
    /// Requested aux area size; `None` selects the default.
    pub aux_size: Option<u64>,
    /// Format version; `None` selects the current default.
    pub version: Option<u32>,
    /// Complete label list, the implicit local label first.
    pub labels: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PfsInfo {
    pub name: String,
    pub clid: Uuid,
    pub fsid: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewfsResult {
    pub version: u32,
    pub total_space: u64,
    pub boot_size: u64,
    pub aux_size: u64,
    pub reserved_space: u64,
    pub free_space: u64,
    pub vol_fsid: Uuid,
    pub sup_clid: Uuid,
    pub sup_fsid: Uuid,
    pub pfs: Vec<PfsInfo>,
}

/// The label every volume carries as its first PFS.
pub const LOCAL_LABEL: &str = "LOCAL";

/// The fixed filesystem type UUID, parsed at compile time.
pub const FSTYPE_UUID: Uuid = match Uuid::try_parse(UUID_STRING) {
    Ok(uuid) => uuid,
    Err(_) => panic!("invalid filesystem type uuid"),
};

/// Default second label, chosen by the device path's last character.
pub fn default_label(device: &str) -> &'static str {
    match device.chars().next_back() {
        Some('a') => "BOOT",
        Some('d') => "ROOT",
        _ => "DATA",
    }
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}

/// Resolve a requested area size: defaults are halved until they fit a
/// twentieth of the volume, explicit requests are raised to the minimum,
/// and the result rounds up to the 8 MiB alignment.
fn area_size(requested: Option<u64>, nominal: u64, minimum: u64, total_space: u64) -> u64 {
    let mut size = requested.unwrap_or(0);
    if size == 0 {
        size = nominal;
        while size > total_space / 20 {
            size >>= 1;
        }
    }
    if size < minimum {
        size = minimum;
    }
    (size + VOLUME_ALIGNMASK64) & !VOLUME_ALIGNMASK64
}

fn validate_labels(labels: &[String]) -> Result<()> {
    if labels.is_empty() {
        return Err(FsError::Format("at least one label is required".into()));
    }
    if labels.len() > SET_COUNT {
        return Err(FsError::Format(format!(
            "limit of {} local labels",
            SET_COUNT - 1
        )));
    }
    for label in labels {
        if label.is_empty() {
            return Err(FsError::Format("empty volume label".into()));
        }
        if label.len() > INODE_MAXNAME {
            return Err(FsError::Format(format!(
                "volume label '{label}' is too long ({INODE_MAXNAME} bytes max)"
            )));
        }
    }
    Ok(())
}

/// Linearly allocate `bytes` at the cursor, returning a blockref with the
/// radix-encoded offset.
fn alloc_direct(base: &mut u64, bytes: u64) -> Blockref {
    debug_assert!(bytes.is_power_of_two());
    let radix = (bytes.trailing_zeros() as u8).max(MIN_RADIX);

    let mut bref = Blockref::zeroed();
    bref.data_off = *base | radix as u64;
    bref.vradix = radix;
    *base += 1u64 << radix;
    bref
}

pub fn newfs(path: &Path, opts: &NewfsOptions) -> Result<NewfsResult> {
    let version = opts.version.unwrap_or(VOL_VERSION_DEFAULT);
    if !(VOL_VERSION_MIN..VOL_VERSION_WIP).contains(&version) {
        return Err(FsError::Format(format!(
            "cannot format version {version} volumes"
        )));
    }
    validate_labels(&opts.labels)?;

    if opts.boot_size.is_some_and(|size| size > BOOT_MAX_BYTES) {
        return Err(FsError::Format("boot area size too large".into()));
    }
    if opts.aux_size.is_some_and(|size| size > AUX_MAX_BYTES) {
        return Err(FsError::Format("aux area size too large".into()));
    }

    let vol = Volume::open(path, false)?;
    let total_space = vol.size() & !VOLUME_ALIGNMASK64;
    if total_space == 0 {
        return Err(FsError::Format(format!(
            "{}: volume is too small",
            path.display()
        )));
    }

    let boot_size = area_size(opts.boot_size, BOOT_NOM_BYTES, BOOT_MIN_BYTES, total_space);
    let aux_size = area_size(opts.aux_size, AUX_NOM_BYTES, AUX_MIN_BYTES, total_space);

    // 4 MiB reserved per started 1 GiB; the boot and aux areas count
    // toward the reserve for free-space purposes.
    let reserved_space =
        ((total_space + FREEMAP_LEVEL1_MASK) / FREEMAP_LEVEL1_SIZE) * ZONE_SEG;
    let free_space = (total_space as i64) - (reserved_space + boot_size + aux_size) as i64;
    if free_space < 0 {
        return Err(FsError::Format("not enough free space".into()));
    }
    let free_space = free_space as u64;

    debug!(
        total_space,
        boot_size, aux_size, reserved_space, free_space, "formatting volume"
    );

    let (vol_fsid, sup_clid, sup_fsid, pfs) = format_volume(
        &vol,
        total_space,
        free_space,
        boot_size,
        aux_size,
        version,
        &opts.labels,
    )?;

    Ok(NewfsResult {
        version,
        total_space,
        boot_size,
        aux_size,
        reserved_space,
        free_space,
        vol_fsid,
        sup_clid,
        sup_fsid,
        pfs,
    })
}

#[allow(clippy::too_many_arguments)]
fn format_volume(
    vol: &Volume,
    total_space: u64,
    free_space: u64,
    boot_size: u64,
    aux_size: u64,
    version: u32,
    labels: &[String],
) -> Result<(Uuid, Uuid, Uuid, Vec<PfsInfo>)> {
    let mut buf = MediaData::zeroed();

    // Clear the whole reserve of the first zone and touch the last block
    // so the volume extends to its full size.
    let mut tmp_base = 0u64;
    for _ in 0..ZONE_BLOCKS_SEG {
        vol.pwrite(&buf.buf, tmp_base)?;
        tmp_base += PBUFSIZE as u64;
    }
    vol.pwrite(&buf.buf, total_space - PBUFSIZE as u64)?;

    let boot_base = ZONE_SEG;
    let aux_base = boot_base + boot_size;
    let mut alloc_base = aux_base + aux_size;
    if alloc_base >= FREEMAP_LEVEL1_SIZE {
        return Err(FsError::Format(
            "boot and aux areas cross the first reserved boundary".into(),
        ));
    }

    let mut tmp_base = boot_base;
    while tmp_base < alloc_base {
        vol.pwrite(&buf.buf, tmp_base)?;
        tmp_base += PBUFSIZE as u64;
    }

    let now = now_micros();
    let vol_fsid = Uuid::new_v4();
    let sup_clid = Uuid::new_v4();
    let sup_fsid = Uuid::new_v4();

    // The super-root inode and every root inode share one 64 KiB block.
    alloc_base &= !PBUFMASK64;
    let mut sroot_bref = alloc_direct(&mut alloc_base, INODE_BYTES as u64);

    let mut root_brefs = Vec::with_capacity(labels.len());
    let mut pfs = Vec::with_capacity(labels.len());
    for label in labels {
        let clid = Uuid::new_v4();
        let fsid = Uuid::new_v4();
        let mut bref = alloc_direct(&mut alloc_base, INODE_BYTES as u64);
        debug_assert_eq!((sroot_bref.data_off ^ bref.data_off) & !PBUFMASK64, 0);

        // The root directory inode is left empty.
        let off = (bref.io_offset() & PBUFMASK64) as usize;
        let ip: &mut InodeData =
            bytemuck::from_bytes_mut(&mut buf.buf[off..off + INODE_BYTES]);
        ip.meta.version = INODE_VERSION_ONE;
        ip.meta.ctime = now;
        ip.meta.mtime = now;
        ip.meta.btime = now;
        ip.meta.obj_type = OBJTYPE_DIRECTORY;
        ip.meta.mode = 0o755;
        ip.meta.inum = 1;
        ip.meta.nlinks = 1;
        ip.set_name(label.as_bytes());
        ip.meta.name_key = dirhash(label.as_bytes());

        // No compression on a BOOT root so boot loaders can read it.
        ip.meta.comp_algo = if label.eq_ignore_ascii_case("BOOT") {
            COMP_AUTOZERO
        } else {
            COMP_NEWFS_DEFAULT
        };
        ip.meta.check_algo = CHECK_XXHASH64;

        ip.meta.pfs_clid = clid.into_bytes();
        ip.meta.pfs_fsid = fsid.into_bytes();
        ip.meta.pfs_type = PFSTYPE_MASTER;
        ip.meta.op_flags |= InodeOpFlags::PFSROOT.bits();
        // First allocatable inode number.
        ip.meta.pfs_inum = 16;

        // The blockset stays empty; the blockref keyed by the name hash
        // becomes the super-root's directory entry.
        bref.key = ip.meta.name_key;
        bref.copyid = COPYID_LOCAL;
        bref.keybits = 0;
        bref.check.set_xxhash64(xxh64(bytemuck::bytes_of(ip)));
        bref.btype = BREF_TYPE_INODE;
        bref.methods = enc_check(CHECK_XXHASH64) | enc_comp(COMP_NONE);
        bref.mirror_tid = 16;
        bref.flags = BlockrefFlags::PFSROOT.bits();

        root_brefs.push(bref);
        pfs.push(PfsInfo {
            name: label.clone(),
            clid,
            fsid,
        });
    }

    // The super-root directory inode carries the sorted root blockrefs as
    // its directory entries.
    root_brefs.sort_by_key(|bref| bref.key);

    let off = (sroot_bref.io_offset() & PBUFMASK64) as usize;
    let ip: &mut InodeData = bytemuck::from_bytes_mut(&mut buf.buf[off..off + INODE_BYTES]);
    ip.meta.version = INODE_VERSION_ONE;
    ip.meta.ctime = now;
    ip.meta.mtime = now;
    ip.meta.btime = now;
    ip.meta.obj_type = OBJTYPE_DIRECTORY;
    ip.meta.mode = 0o700;
    ip.meta.inum = 0;
    ip.meta.nlinks = 2;
    ip.meta.comp_algo = COMP_AUTOZERO;
    ip.meta.check_algo = CHECK_XXHASH64;
    ip.meta.pfs_clid = sup_clid.into_bytes();
    ip.meta.pfs_fsid = sup_fsid.into_bytes();
    ip.meta.pfs_type = PFSTYPE_SUPROOT;
    ip.set_name(b"SUPROOT");
    ip.meta.name_key = 0;
    ip.meta.pfs_inum = 0;
    for (i, bref) in root_brefs.iter().enumerate() {
        ip.u.blockset_mut().blockref[i] = *bref;
    }

    sroot_bref.copyid = COPYID_LOCAL;
    sroot_bref.keybits = 0;
    sroot_bref.check.set_xxhash64(xxh64(bytemuck::bytes_of(ip)));
    sroot_bref.btype = BREF_TYPE_INODE;
    sroot_bref.methods = enc_check(CHECK_XXHASH64) | enc_comp(COMP_AUTOZERO);
    sroot_bref.mirror_tid = 16;

    // Write the 64 KiB block holding the super-root and the roots.
    vol.pwrite(&buf.buf, sroot_bref.io_offset() & !PBUFMASK64)?;

    // Volume header, pointing at the super-root.
    let mut hdr = MediaData::zeroed();
    let voldata = hdr.as_voldata_mut();
    voldata.magic = VOLUME_ID_HBO;
    voldata.boot_beg = boot_base;
    voldata.boot_end = boot_base + boot_size;
    voldata.aux_beg = aux_base;
    voldata.aux_end = aux_base + aux_size;
    voldata.volu_size = total_space;
    voldata.version = version;
    voldata.flags = 0;
    voldata.fsid = vol_fsid.into_bytes();
    voldata.fstype = FSTYPE_UUID.into_bytes();
    voldata.peer_type = PEER_HAMMER2;
    voldata.allocator_size = free_space;
    voldata.allocator_free = free_space;
    voldata.allocator_beg = alloc_base;
    voldata.sroot_blockset.blockref[0] = sroot_bref;
    voldata.mirror_tid = 16;
    voldata.freemap_tid = 16;

    // Sector 1 first; its CRC slot lies inside sector 0's range, and the
    // whole-header CRC covers both.
    let crc = icrc32(
        &voldata.as_bytes()[VOLUME_ICRC1_OFF..VOLUME_ICRC1_OFF + VOLUME_ICRC1_SIZE],
    );
    voldata.icrc_sects[VOL_ICRC_SECT1] = crc;
    let crc = icrc32(
        &voldata.as_bytes()[VOLUME_ICRC0_OFF..VOLUME_ICRC0_OFF + VOLUME_ICRC0_SIZE],
    );
    voldata.icrc_sects[VOL_ICRC_SECT0] = crc;
    let crc = icrc32(
        &voldata.as_bytes()[VOLUME_ICRCVH_OFF..VOLUME_ICRCVH_OFF + VOLUME_ICRCVH_SIZE],
    );
    voldata.icrc_volheader = crc;

    // Write the header and all replicas that fit inside the volume.
    for zone in 0..NUM_VOLHDRS {
        let base = zone as u64 * ZONE_BYTES64;
        if base >= total_space {
            break;
        }
        vol.pwrite(&hdr.buf, base)?;
    }
    vol.sync()?;

    Ok((vol_fsid, sup_clid, sup_fsid, pfs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_label_by_device_suffix() {
        assert_eq!(default_label("/dev/da0s1a"), "BOOT");
        assert_eq!(default_label("/dev/da0s1d"), "ROOT");
        assert_eq!(default_label("/tmp/img"), "DATA");
    }

    #[test]
    fn test_area_size_defaults_shrink_to_fit() {
        // On a 200 MiB volume the 64 MiB nominal boot area halves down
        // to the 8 MiB floor.
        let total = 200 * 1024 * 1024;
        assert_eq!(area_size(None, BOOT_NOM_BYTES, BOOT_MIN_BYTES, total), BOOT_MIN_BYTES);
        // On a 4 GiB volume it fits as is.
        let total = 4 * 1024 * 1024 * 1024;
        assert_eq!(area_size(None, BOOT_NOM_BYTES, BOOT_MIN_BYTES, total), BOOT_NOM_BYTES);
    }

    #[test]
    fn test_area_size_explicit_raised_to_minimum() {
        let total = 4 * 1024 * 1024 * 1024;
        assert_eq!(
            area_size(Some(1024 * 1024), BOOT_NOM_BYTES, BOOT_MIN_BYTES, total),
            BOOT_MIN_BYTES
        );
    }

    #[test]
    fn test_alloc_direct_packs_inodes() {
        let mut base = 0u64;
        let first = alloc_direct(&mut base, INODE_BYTES as u64);
        let second = alloc_direct(&mut base, INODE_BYTES as u64);
        assert_eq!(first.radix(), MIN_RADIX);
        assert_eq!(first.io_offset(), 0);
        assert_eq!(second.io_offset(), 1024);
        assert_eq!(base, 2048);
    }

    #[test]
    fn test_label_validation() {
        let ok = vec!["LOCAL".to_string(), "ROOT".to_string()];
        assert!(validate_labels(&ok).is_ok());

        let long = vec!["x".repeat(INODE_MAXNAME)];
        assert!(validate_labels(&long).is_ok());
        let too_long = vec!["x".repeat(INODE_MAXNAME + 1)];
        assert!(validate_labels(&too_long).is_err());

        let too_many: Vec<String> = (0..9).map(|i| format!("L{i}")).collect();
        assert!(validate_labels(&too_many).is_err());
    }
}
