//! Byte-exact on-disk structures and constants for the HAMMER2 filesystem.
//!
//! Everything here is pure data: fixed-size `repr(C)` records matching the
//! media layout bit for bit, plus the decoding rules for blockref offsets.
//! All multi-byte fields are stored in the byte order of the host that
//! produced the medium; the volume-header magic tells the two apart.

pub mod blockref;
pub mod freemap;
pub mod inode;
pub mod media;
pub mod volume;

mod constants;

pub use blockref::{Blockref, BlockrefCheck, BlockrefFlags, Blockset, CheckMethod, CompMethod};
pub use constants::*;
pub use freemap::BmapData;
pub use inode::{InodeData, InodeMeta, InodeOpFlags, InodeUnion};
pub use media::MediaData;
pub use volume::{CopyInfo, VolumeData};

/// Blockref type name, for diagnostics.
pub fn breftype_to_str(btype: u8) -> &'static str {
    match btype {
        BREF_TYPE_EMPTY => "empty",
        BREF_TYPE_INODE => "inode",
        BREF_TYPE_INDIRECT => "indirect",
        BREF_TYPE_DATA => "data",
        BREF_TYPE_DIRENT => "dirent",
        BREF_TYPE_FREEMAP_NODE => "freemap_node",
        BREF_TYPE_FREEMAP_LEAF => "freemap_leaf",
        BREF_TYPE_FREEMAP => "freemap",
        BREF_TYPE_VOLUME => "volume",
        _ => "unknown",
    }
}

/// Check method name from the high nibble of a `methods` byte.
pub fn checktype_to_str(methods: u8) -> &'static str {
    match dec_check(methods) {
        CHECK_NONE => "none",
        CHECK_ISCSI32 => "iscsi32",
        CHECK_XXHASH64 => "xxhash64",
        CHECK_SHA192 => "sha192",
        CHECK_FREEMAP => "freemap",
        _ => "unknown",
    }
}

/// Compression method name from the low nibble of a `methods` byte.
pub fn comptype_to_str(methods: u8) -> &'static str {
    match dec_comp(methods) {
        COMP_NONE => "none",
        COMP_AUTOZERO => "autozero",
        COMP_LZ4 => "lz4",
        COMP_ZLIB => "zlib",
        _ => "unknown",
    }
}

/// PFS type name, for diagnostics.
pub fn pfstype_to_str(pfs_type: u8) -> &'static str {
    match pfs_type {
        PFSTYPE_NONE => "none",
        PFSTYPE_CACHE => "cache",
        PFSTYPE_SLAVE => "slave",
        PFSTYPE_SOFT_SLAVE => "soft_slave",
        PFSTYPE_SOFT_MASTER => "soft_master",
        PFSTYPE_MASTER => "master",
        PFSTYPE_SUPROOT => "suproot",
        _ => "unknown",
    }
}
