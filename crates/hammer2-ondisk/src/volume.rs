use crate::blockref::Blockset;
use crate::constants::*;

/// Per-copy replication configuration slot. Copyid 0 is an empty slot and
/// 255 the local media; the tools only carry these bytes, they do not act
/// on them.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CopyInfo {
    pub copyid: u8,
    pub inprog: u8,
    pub chain_to: u8,
    pub chain_from: u8,
    pub flags: u16,
    pub error: u8,
    pub priority: u8,
    pub remote_pfs_type: u8,
    pub reserved09: [u8; 23],
    pub pfs_clid: [u8; 16],
    pub vol_id: u64,
    pub vol_size: u64,
    pub reserved40: [u8; 64],
}

/// The 64 KiB volume header. One replica sits at the start of each of the
/// first four 2 GiB zones; each is self-describing for the whole volume.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::NoUninit, bytemuck::AnyBitPattern)]
pub struct VolumeData {
    // sector #0
    pub magic: u64,
    /// Boot area bounds (size = end - beg).
    pub boot_beg: u64,
    pub boot_end: u64,
    /// Aux area bounds.
    pub aux_beg: u64,
    pub aux_end: u64,
    /// Total volume size in bytes.
    pub volu_size: u64,
    pub version: u32,
    pub flags: u32,
    /// Copyid of the physical volume.
    pub copyid: u8,
    pub freemap_version: u8,
    pub peer_type: u8,
    pub reserved003b: u8,
    pub reserved003c: u32,
    pub fsid: [u8; 16],
    pub fstype: [u8; 16],
    /// Total data space, precalculated at format time; excludes reserved
    /// blocks and the boot/aux areas.
    pub allocator_size: u64,
    pub allocator_free: u64,
    /// Initial linear allocation cursor used before the freemap takes over.
    pub allocator_beg: u64,
    pub mirror_tid: u64,
    pub alloc_tid: u64,
    pub inode_tid: u64,
    pub freemap_tid: u64,
    pub bulkfree_tid: u64,
    pub reserved00a0: [u64; 5],
    pub copyexists: [u32; 8],
    pub reserved00e8: [u8; 248],
    /// Sector CRCs; slot 7 covers sector 0 minus the CRC array's own last
    /// slot range, slot 6 covers sector 1 (the super-root blockset).
    pub icrc_sects: [u32; 8],

    // sector #1
    pub sroot_blockset: Blockset,

    // sectors #2-7
    pub sector2: [u8; 512],
    pub sector3: [u8; 512],
    pub freemap_blockset: Blockset,
    pub sector5: [u8; 512],
    pub sector6: [u8; 512],
    pub sector7: [u8; 512],

    // sectors #8-71
    pub copyinfo: [CopyInfo; COPYID_COUNT],

    pub reserved9000: [u8; 0x6FFC],
    /// CRC over the whole header minus these last 4 bytes.
    pub icrc_volheader: u32,
}

impl VolumeData {
    pub fn has_valid_magic(&self) -> bool {
        self.magic == VOLUME_ID_HBO || self.magic == VOLUME_ID_ABO
    }

    pub fn is_reverse_endian(&self) -> bool {
        self.magic == VOLUME_ID_ABO
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
