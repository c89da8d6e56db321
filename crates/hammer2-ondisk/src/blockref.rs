use crate::constants::*;

bitflags::bitflags! {
    /// Flags carried in a blockref's `flags` byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BlockrefFlags: u8 {
        /// The referenced inode is a PFS entry point.
        const PFSROOT = 0x01;
    }
}

/// Check method selected by the high nibble of a blockref's `methods` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMethod {
    None,
    Iscsi32,
    Xxhash64,
    Sha192,
    Freemap,
}

impl CheckMethod {
    /// Decode from a `methods` byte. Unknown nibbles decode to `None`: no
    /// check is performed for them, matching how the media is scanned.
    pub fn from_methods(methods: u8) -> CheckMethod {
        match dec_check(methods) {
            CHECK_ISCSI32 => CheckMethod::Iscsi32,
            CHECK_XXHASH64 => CheckMethod::Xxhash64,
            CHECK_SHA192 => CheckMethod::Sha192,
            CHECK_FREEMAP => CheckMethod::Freemap,
            _ => CheckMethod::None,
        }
    }

    pub fn to_raw(self) -> u8 {
        match self {
            CheckMethod::None => CHECK_NONE,
            CheckMethod::Iscsi32 => CHECK_ISCSI32,
            CheckMethod::Xxhash64 => CHECK_XXHASH64,
            CheckMethod::Sha192 => CHECK_SHA192,
            CheckMethod::Freemap => CHECK_FREEMAP,
        }
    }
}

/// Compression method selected by the low nibble of `methods`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompMethod {
    None,
    Autozero,
    Lz4,
    Zlib,
    Unknown(u8),
}

impl CompMethod {
    pub fn from_methods(methods: u8) -> CompMethod {
        match dec_comp(methods) {
            COMP_NONE => CompMethod::None,
            COMP_AUTOZERO => CompMethod::Autozero,
            COMP_LZ4 => CompMethod::Lz4,
            COMP_ZLIB => CompMethod::Zlib,
            other => CompMethod::Unknown(other),
        }
    }
}

/// The 24-byte check union at the tail of a blockref. The interpretation
/// is chosen by the check method in `methods`.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlockrefCheck {
    pub data: [u8; 24],
}

impl BlockrefCheck {
    pub fn iscsi32(&self) -> u32 {
        u32::from_ne_bytes(self.data[0..4].try_into().unwrap())
    }

    pub fn set_iscsi32(&mut self, value: u32) {
        self.data[0..4].copy_from_slice(&value.to_ne_bytes());
    }

    pub fn xxhash64(&self) -> u64 {
        u64::from_ne_bytes(self.data[0..8].try_into().unwrap())
    }

    pub fn set_xxhash64(&mut self, value: u64) {
        self.data[0..8].copy_from_slice(&value.to_ne_bytes());
    }

    pub fn sha192(&self) -> [u8; 24] {
        self.data
    }

    pub fn set_sha192(&mut self, digest: [u8; 24]) {
        self.data = digest;
    }

    /// The freemap hint embeds its CRC in the first word.
    pub fn freemap_icrc32(&self) -> u32 {
        self.iscsi32()
    }

    pub fn set_freemap_icrc32(&mut self, value: u32) {
        self.set_iscsi32(value);
    }

    /// Radixes available for allocation below this freemap node.
    pub fn freemap_bigmask(&self) -> u32 {
        u32::from_ne_bytes(self.data[4..8].try_into().unwrap())
    }

    /// Total available bytes below this freemap node.
    pub fn freemap_avail(&self) -> u64 {
        u64::from_ne_bytes(self.data[8..16].try_into().unwrap())
    }
}

/// The 64-byte media block reference, embedded in the volume header, in
/// inodes and in indirect blocks. The key range it represents is
/// `[key, key + (1 << keybits))`.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Blockref {
    /// Type of the referenced item.
    pub btype: u8,
    /// Check method (high nibble) and compression method (low nibble).
    pub methods: u8,
    /// Which copy this reference points at.
    pub copyid: u8,
    /// Number of key bits masked off; 0 for a leaf.
    pub keybits: u8,
    /// Virtual data size radix.
    pub vradix: u8,
    pub flags: u8,
    pub reserved06: u8,
    pub reserved07: u8,
    pub key: u64,
    pub mirror_tid: u64,
    pub modify_tid: u64,
    /// Media byte offset; the low 6 bits encode the physical size radix.
    pub data_off: u64,
    pub check: BlockrefCheck,
}

impl Blockref {
    /// An all-zero (EMPTY) blockref.
    pub fn zeroed() -> Blockref {
        bytemuck::Zeroable::zeroed()
    }

    /// Synthesize the root blockref for one of the volume-header replicas.
    /// `btype` is VOLUME, FREEMAP, or EMPTY (plain header access).
    pub fn new_root(btype: u8, zone: usize) -> Blockref {
        debug_assert!(
            btype == BREF_TYPE_EMPTY || btype == BREF_TYPE_VOLUME || btype == BREF_TYPE_FREEMAP
        );
        let mut bref = Blockref::zeroed();
        bref.btype = btype;
        bref.data_off = (zone as u64 * ZONE_BYTES64) | PBUFRADIX as u64;
        bref
    }

    /// The allocation radix from the low 6 bits of `data_off`.
    pub fn radix(&self) -> u8 {
        (self.data_off & OFF_MASK_RADIX) as u8
    }

    /// Physical size of the referenced data; zero means no data.
    pub fn data_bytes(&self) -> usize {
        match self.radix() {
            0 => 0,
            radix => 1usize << radix,
        }
    }

    /// The media byte offset with the radix bits masked off.
    pub fn io_offset(&self) -> u64 {
        self.data_off & OFF_MASK
    }

    pub fn check_method(&self) -> CheckMethod {
        CheckMethod::from_methods(self.methods)
    }

    pub fn comp_method(&self) -> CompMethod {
        CompMethod::from_methods(self.methods)
    }

    pub fn is_empty(&self) -> bool {
        self.btype == BREF_TYPE_EMPTY
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// A fully associative set of 8 blockrefs, used in inodes and in the two
/// volume-header blocksets.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::NoUninit, bytemuck::AnyBitPattern)]
pub struct Blockset {
    pub blockref: [Blockref; SET_COUNT],
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::{align_of, offset_of, size_of};
    use static_assertions::const_assert_eq;

    const_assert_eq!(size_of::<Blockref>(), BLOCKREF_BYTES);
    const_assert_eq!(size_of::<BlockrefCheck>(), 24);
    const_assert_eq!(size_of::<Blockset>(), BLOCKREF_BYTES * SET_COUNT);
    const_assert_eq!(align_of::<Blockref>(), 8);

    const_assert_eq!(offset_of!(Blockref, btype), 0x00);
    const_assert_eq!(offset_of!(Blockref, methods), 0x01);
    const_assert_eq!(offset_of!(Blockref, copyid), 0x02);
    const_assert_eq!(offset_of!(Blockref, keybits), 0x03);
    const_assert_eq!(offset_of!(Blockref, vradix), 0x04);
    const_assert_eq!(offset_of!(Blockref, flags), 0x05);
    const_assert_eq!(offset_of!(Blockref, key), 0x08);
    const_assert_eq!(offset_of!(Blockref, mirror_tid), 0x10);
    const_assert_eq!(offset_of!(Blockref, modify_tid), 0x18);
    const_assert_eq!(offset_of!(Blockref, data_off), 0x20);
    const_assert_eq!(offset_of!(Blockref, check), 0x28);

    #[test]
    fn test_data_off_decoding() {
        let mut bref = Blockref::zeroed();
        assert_eq!(bref.data_bytes(), 0);

        bref.data_off = 0x0001_0000 | 10;
        assert_eq!(bref.data_bytes(), 1024);
        assert_eq!(bref.io_offset(), 0x0001_0000);
        assert_eq!(bref.radix(), 10);

        bref.data_off = 0x7fff_ffc0 | 16;
        assert_eq!(bref.data_bytes(), 65536);
        assert_eq!(bref.io_offset(), 0x7fff_ffc0);
    }

    #[test]
    fn test_root_blockref_offsets() {
        let root = Blockref::new_root(BREF_TYPE_VOLUME, 2);
        assert_eq!(root.io_offset(), 2 * ZONE_BYTES64);
        assert_eq!(root.data_bytes(), PBUFSIZE);
    }

    #[test]
    fn test_methods_nibbles() {
        let methods = enc_check(CHECK_XXHASH64) | enc_comp(COMP_AUTOZERO);
        let mut bref = Blockref::zeroed();
        bref.methods = methods;
        assert_eq!(bref.check_method(), CheckMethod::Xxhash64);
        assert_eq!(bref.comp_method(), CompMethod::Autozero);
        // Unknown check nibbles mean "no check".
        bref.methods = enc_check(0x9);
        assert_eq!(bref.check_method(), CheckMethod::None);
    }

    #[test]
    fn test_check_union_aliasing() {
        let mut check = BlockrefCheck { data: [0; 24] };
        check.set_xxhash64(0x1122_3344_5566_7788);
        // The 32-bit view aliases the low word of the 64-bit view.
        assert_eq!(check.iscsi32(), 0x1122_3344_5566_7788u64 as u32);
    }
}
