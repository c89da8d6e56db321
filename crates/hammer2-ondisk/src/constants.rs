//! Numerical constants of the media format.

/// Volume header signature in the byte order of the producing host.
pub const VOLUME_ID_HBO: u64 = 0x48414d32_05172011;
/// The same signature seen from a reverse-endian host.
pub const VOLUME_ID_ABO: u64 = 0x11201705_324d4148;

/// Fixed filesystem type UUID stored in `fstype`.
pub const UUID_STRING: &str = "5cbb9ad1-862d-11dc-a94d-01301bb8a9f5";

/// Minimum allocation size (1 KiB) and its radix.
pub const MIN_ALLOC: usize = 1024;
pub const MIN_RADIX: u8 = 10;
/// Maximum allocation size (64 KiB) and its radix.
pub const MAX_ALLOC: usize = 65536;
pub const MAX_RADIX: u8 = 16;

/// Physical buffer size: every device I/O rolls up to at most this.
pub const PBUFRADIX: u8 = 16;
pub const PBUFSIZE: usize = 65536;
pub const PBUFMASK64: u64 = (PBUFSIZE as u64) - 1;
/// Logical buffer size, the minimum I/O rollup.
pub const LBUFRADIX: u8 = 14;
pub const LBUFSIZE: usize = 16384;
pub const LBUFMASK64: u64 = (LBUFSIZE as u64) - 1;

/// Blockrefs per set; sets are fully associative.
pub const SET_COUNT: usize = 8;
/// Size of one blockref record.
pub const BLOCKREF_BYTES: usize = 64;
/// Direct data embeddable in an inode in place of its blockset.
pub const EMBEDDED_BYTES: usize = 512;
/// Largest child array an indirect block can carry.
pub const IND_COUNT_MAX: usize = PBUFSIZE / BLOCKREF_BYTES;

/// Size of one inode record and the maximum filename length it stores.
pub const INODE_BYTES: usize = 1024;
pub const INODE_MAXNAME: usize = 256;
pub const INODE_VERSION_ONE: u16 = 1;

/// The volume is tiled in 2 GiB zones, each starting with a reserved 4 MiB
/// segment. The first four zones carry volume-header replicas.
pub const ZONE_BYTES64: u64 = 2 * 1024 * 1024 * 1024;
pub const ZONE_SEG: u64 = 4 * 1024 * 1024;
pub const ZONE_BLOCKS_SEG: usize = (ZONE_SEG as usize) / PBUFSIZE;
pub const NUM_VOLHDRS: usize = 4;

/// Total volume size is truncated to a multiple of 8 MiB.
pub const VOLUME_ALIGN: u64 = 8 * 1024 * 1024;
pub const VOLUME_ALIGNMASK64: u64 = VOLUME_ALIGN - 1;
pub const NEWFS_ALIGN: u64 = VOLUME_ALIGN;
pub const NEWFS_ALIGNMASK64: u64 = VOLUME_ALIGNMASK64;

/// A 4 MiB segment is reserved per started span of this size.
pub const FREEMAP_LEVEL1_SIZE: u64 = 1024 * 1024 * 1024;
pub const FREEMAP_LEVEL1_MASK: u64 = FREEMAP_LEVEL1_SIZE - 1;
/// One freemap leaf element covers 2 MiB in 128 x 16 KiB chunks.
pub const FREEMAP_LEVEL0_SIZE: u64 = 2 * 1024 * 1024;
pub const FREEMAP_COUNT: usize = PBUFSIZE / 64;

/// Bounds for the reserved boot area.
pub const BOOT_MIN_BYTES: u64 = VOLUME_ALIGN;
pub const BOOT_NOM_BYTES: u64 = 64 * 1024 * 1024;
pub const BOOT_MAX_BYTES: u64 = 256 * 1024 * 1024;
/// Bounds for the reserved aux area.
pub const AUX_MIN_BYTES: u64 = VOLUME_ALIGN;
pub const AUX_NOM_BYTES: u64 = 256 * 1024 * 1024;
pub const AUX_MAX_BYTES: u64 = 1024 * 1024 * 1024;

/// The low 6 bits of `data_off` encode the allocation radix.
pub const OFF_MASK_RADIX: u64 = 0x3F;
pub const OFF_MASK: u64 = !OFF_MASK_RADIX;

/// Blockref types.
pub const BREF_TYPE_EMPTY: u8 = 0;
pub const BREF_TYPE_INODE: u8 = 1;
pub const BREF_TYPE_INDIRECT: u8 = 2;
pub const BREF_TYPE_DATA: u8 = 3;
pub const BREF_TYPE_DIRENT: u8 = 4;
pub const BREF_TYPE_FREEMAP_NODE: u8 = 5;
pub const BREF_TYPE_FREEMAP_LEAF: u8 = 6;
/// Pseudo-type rooting the freemap tree; only synthesized, never on media.
pub const BREF_TYPE_FREEMAP: u8 = 254;
/// Pseudo-type rooting the volume topology; only synthesized.
pub const BREF_TYPE_VOLUME: u8 = 255;

/// Check methods, stored in the high nibble of `methods`.
pub const CHECK_NONE: u8 = 0;
pub const CHECK_ISCSI32: u8 = 1;
pub const CHECK_XXHASH64: u8 = 2;
pub const CHECK_SHA192: u8 = 3;
pub const CHECK_FREEMAP: u8 = 4;

/// Compression methods, stored in the low nibble of `methods`.
pub const COMP_NONE: u8 = 0;
pub const COMP_AUTOZERO: u8 = 1;
pub const COMP_LZ4: u8 = 2;
pub const COMP_ZLIB: u8 = 3;
pub const COMP_NEWFS_DEFAULT: u8 = COMP_LZ4;

pub const fn enc_check(check: u8) -> u8 {
    check << 4
}

pub const fn dec_check(methods: u8) -> u8 {
    (methods >> 4) & 15
}

pub const fn enc_comp(comp: u8) -> u8 {
    comp
}

pub const fn dec_comp(methods: u8) -> u8 {
    methods & 15
}

/// Inode object types.
pub const OBJTYPE_UNKNOWN: u8 = 0;
pub const OBJTYPE_DIRECTORY: u8 = 1;
pub const OBJTYPE_REGFILE: u8 = 2;
pub const OBJTYPE_FIFO: u8 = 4;
pub const OBJTYPE_CDEV: u8 = 5;
pub const OBJTYPE_BDEV: u8 = 6;
pub const OBJTYPE_SOFTLINK: u8 = 7;
pub const OBJTYPE_HARDLINK: u8 = 8;
pub const OBJTYPE_SOCKET: u8 = 9;
pub const OBJTYPE_WHITEOUT: u8 = 10;

/// PFS node types stored in `pfs_type`. The super-root test is a bitwise
/// AND against `PFSTYPE_SUPROOT`.
pub const PFSTYPE_NONE: u8 = 0x00;
pub const PFSTYPE_CACHE: u8 = 0x01;
pub const PFSTYPE_SLAVE: u8 = 0x03;
pub const PFSTYPE_SOFT_SLAVE: u8 = 0x04;
pub const PFSTYPE_SOFT_MASTER: u8 = 0x05;
pub const PFSTYPE_MASTER: u8 = 0x06;
pub const PFSTYPE_SUPROOT: u8 = 0x08;

/// Copy identifiers; 255 names the local media.
pub const COPYID_COUNT: usize = 256;
pub const COPYID_LOCAL: u8 = 255;

/// Peer type recorded in the volume header.
pub const PEER_HAMMER2: u8 = 3;

/// Size of the volume header record.
pub const VOLUME_BYTES: usize = 65536;

/// Slots in `icrc_sects` for the two sector CRCs.
pub const VOL_ICRC_SECT0: usize = 7;
pub const VOL_ICRC_SECT1: usize = 6;

/// The first sector's CRC covers the sector minus its own 4-byte slot.
pub const VOLUME_ICRC0_OFF: usize = 0;
pub const VOLUME_ICRC0_SIZE: usize = 512 - 4;
/// The second sector (the super-root blockset) is covered whole.
pub const VOLUME_ICRC1_OFF: usize = 512;
pub const VOLUME_ICRC1_SIZE: usize = 512;
/// The whole-header CRC covers everything but its own trailing 4 bytes.
pub const VOLUME_ICRCVH_OFF: usize = 0;
pub const VOLUME_ICRCVH_SIZE: usize = 65536 - 4;

pub const VOL_VERSION_MIN: u32 = 1;
pub const VOL_VERSION_DEFAULT: u32 = 1;
pub const VOL_VERSION_WIP: u32 = 2;

/// Key of the super-root entry in the volume blockset.
pub const SROOT_KEY: u64 = 0;
