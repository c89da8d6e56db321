use crate::blockref::Blockref;
use crate::constants::*;
use crate::freemap::BmapData;
use crate::inode::InodeData;
use crate::volume::VolumeData;

/// A 64 KiB media buffer with typed views, standing in for the on-media
/// data union: volume header, inode, blockref array, freemap elements, or
/// raw file data depending on the referencing blockref's type.
#[repr(C, align(8))]
#[derive(Clone)]
pub struct MediaData {
    pub buf: [u8; PBUFSIZE],
}

impl MediaData {
    pub fn zeroed() -> MediaData {
        MediaData {
            buf: [0; PBUFSIZE],
        }
    }

    pub fn as_voldata(&self) -> &VolumeData {
        bytemuck::from_bytes(&self.buf[..VOLUME_BYTES])
    }

    pub fn as_voldata_mut(&mut self) -> &mut VolumeData {
        bytemuck::from_bytes_mut(&mut self.buf[..VOLUME_BYTES])
    }

    pub fn as_inode(&self) -> &InodeData {
        bytemuck::from_bytes(&self.buf[..INODE_BYTES])
    }

    pub fn as_inode_mut(&mut self) -> &mut InodeData {
        bytemuck::from_bytes_mut(&mut self.buf[..INODE_BYTES])
    }

    /// The leading `count` blockrefs of an indirect or freemap node.
    pub fn blockrefs(&self, count: usize) -> &[Blockref] {
        bytemuck::cast_slice(&self.buf[..count * BLOCKREF_BYTES])
    }

    /// The leading `count` freemap leaf elements.
    pub fn bmap_entries(&self, count: usize) -> &[BmapData] {
        bytemuck::cast_slice(&self.buf[..count * size_of::<BmapData>()])
    }

    pub fn bytes(&self, len: usize) -> &[u8] {
        &self.buf[..len]
    }
}
