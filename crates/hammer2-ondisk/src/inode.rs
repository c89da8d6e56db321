use crate::blockref::Blockset;
use crate::constants::*;

bitflags::bitflags! {
    /// Operational flags carried in an inode's `op_flags` byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InodeOpFlags: u8 {
        /// The trailing union embeds file data instead of a blockset.
        const DIRECTDATA = 0x01;
        /// The inode is a PFS entry point.
        const PFSROOT = 0x02;
        /// Copyids override the parent's.
        const COPYIDS = 0x04;
    }
}

/// The 256-byte meta-data block at the head of an inode.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::NoUninit, bytemuck::AnyBitPattern)]
pub struct InodeMeta {
    pub version: u16,
    pub reserved02: u8,
    pub pfs_subtype: u8,
    /// chflags
    pub uflags: u32,
    /// Available for device nodes.
    pub rmajor: u32,
    pub rminor: u32,
    /// Inode change time, microseconds since the epoch.
    pub ctime: u64,
    pub mtime: u64,
    /// Access time; unsupported, must be zero.
    pub atime: u64,
    pub btime: u64,
    pub uid: [u8; 16],
    pub gid: [u8; 16],
    /// Object type.
    pub obj_type: u8,
    pub op_flags: u8,
    pub cap_flags: u16,
    /// Unix modes, typically the low 16 bits.
    pub mode: u32,
    pub inum: u64,
    pub size: u64,
    pub nlinks: u64,
    /// Parent inum, recovery only.
    pub iparent: u64,
    /// Full filename key (directory hash).
    pub name_key: u64,
    pub name_len: u16,
    pub ncopies: u8,
    pub comp_algo: u8,
    pub target_type: u8,
    pub check_algo: u8,
    pub pfs_nmasters: u8,
    /// PFS node type, if a PFS root.
    pub pfs_type: u8,
    /// Inum allocator base, if a PFS root.
    pub pfs_inum: u64,
    /// Cluster uuid, if a PFS root.
    pub pfs_clid: [u8; 16],
    /// Unique uuid, if a PFS root.
    pub pfs_fsid: [u8; 16],
    pub data_quota: u64,
    pub data_count: u64,
    pub inode_quota: u64,
    pub inode_count: u64,
    pub attr_tid: u64,
    pub dirent_tid: u64,
    pub decrypt_check: u64,
    pub reserved_e8: [u64; 3],
}

impl InodeMeta {
    pub fn op_flags(&self) -> InodeOpFlags {
        InodeOpFlags::from_bits_retain(self.op_flags)
    }

    pub fn is_pfs_root(&self) -> bool {
        self.op_flags().contains(InodeOpFlags::PFSROOT)
    }

    pub fn has_direct_data(&self) -> bool {
        self.op_flags().contains(InodeOpFlags::DIRECTDATA)
    }

    pub fn is_sup_root(&self) -> bool {
        self.pfs_type & PFSTYPE_SUPROOT != 0
    }
}

/// The trailing 512 bytes of an inode: either a blockset of 8 direct
/// children or embedded file data, selected by `op_flags`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::NoUninit, bytemuck::AnyBitPattern)]
pub struct InodeUnion {
    pub data: [u8; EMBEDDED_BYTES],
}

impl InodeUnion {
    pub fn blockset(&self) -> &Blockset {
        bytemuck::from_bytes(&self.data)
    }

    pub fn blockset_mut(&mut self) -> &mut Blockset {
        bytemuck::from_bytes_mut(&mut self.data)
    }
}

/// The 1024-byte inode record: meta block, unterminated filename, and the
/// blockset-or-data union.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::NoUninit, bytemuck::AnyBitPattern)]
pub struct InodeData {
    pub meta: InodeMeta,
    pub filename: [u8; INODE_MAXNAME],
    pub u: InodeUnion,
}

impl InodeData {
    /// The filename as stored, truncated to `name_len`.
    pub fn name(&self) -> &[u8] {
        let len = (self.meta.name_len as usize).min(INODE_MAXNAME);
        &self.filename[..len]
    }

    pub fn set_name(&mut self, name: &[u8]) {
        self.filename = [0; INODE_MAXNAME];
        self.filename[..name.len()].copy_from_slice(name);
        self.meta.name_len = name.len() as u16;
    }
}
