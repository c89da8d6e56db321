use crate::constants::*;

/// One freemap leaf element: 64 bytes managing a 2 MiB span of media as
/// 128 x 2-bit chunk states (00 free, 10 possibly free, 11 allocated),
/// with a linear iterator for sub-16 KiB granules.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::NoUninit, bytemuck::AnyBitPattern)]
pub struct BmapData {
    /// Byte-granular linear sub-allocation offset; ignored when 16 KiB
    /// aligned.
    pub linear: i32,
    /// Clustering class, (type << 8) | radix.
    pub class: u16,
    pub reserved06: u8,
    pub reserved07: u8,
    pub reserved08: u32,
    pub reserved0c: u32,
    pub reserved10: u32,
    pub reserved14: u32,
    pub reserved18: u32,
    /// Bytes still available in the covered span.
    pub avail: u32,
    /// 256 bits, 2 per 16 KiB chunk.
    pub bitmap: [u32; 8],
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::{offset_of, size_of};
    use static_assertions::const_assert_eq;

    const_assert_eq!(size_of::<BmapData>(), 64);
    const_assert_eq!(offset_of!(BmapData, linear), 0x00);
    const_assert_eq!(offset_of!(BmapData, class), 0x04);
    const_assert_eq!(offset_of!(BmapData, avail), 0x1C);
    const_assert_eq!(offset_of!(BmapData, bitmap), 0x20);

    // A 64 KiB freemap leaf carries exactly FREEMAP_COUNT elements.
    const_assert_eq!(PBUFSIZE / size_of::<BmapData>(), FREEMAP_COUNT);
}
