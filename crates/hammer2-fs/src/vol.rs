//! Synchronous block I/O against a single HAMMER2 volume.
//!
//! One descriptor per volume, positional reads and writes only. All media
//! access is windowed: the target region is widened to the smallest
//! power-of-two multiple of the 16 KiB logical buffer that covers it,
//! capped at the 64 KiB physical buffer, matching the device I/O rollups
//! the filesystem itself performs.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::os::unix::fs::{FileExt, FileTypeExt};
use std::path::{Path, PathBuf};

use hammer2_ondisk::{
    Blockref, LBUFMASK64, MediaData, NUM_VOLHDRS, PBUFSIZE, VOLUME_BYTES, VolumeData, ZONE_BYTES64,
};
use tracing::trace;

use crate::error::{FsError, Result};

pub struct Volume {
    file: File,
    path: PathBuf,
    size: u64,
}

impl Volume {
    /// Open a device node or regular file holding a volume. Anything else
    /// is refused.
    pub fn open(path: &Path, readonly: bool) -> Result<Volume> {
        let file = OpenOptions::new()
            .read(true)
            .write(!readonly)
            .open(path)?;
        let meta = file.metadata()?;
        let file_type = meta.file_type();

        let size = if file_type.is_file() {
            meta.len()
        } else if file_type.is_block_device() || file_type.is_char_device() {
            device_size(&file)?
        } else {
            return Err(FsError::UnsupportedFileType(path.to_path_buf()));
        };

        trace!(path = %path.display(), size, readonly, "opened volume");
        Ok(Volume {
            file,
            path: path.to_path_buf(),
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Probed size of the underlying device or file, in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of usable volume-header replicas: one per started 2 GiB
    /// zone, at most four. Undersized volumes skip the missing replicas.
    pub fn zone_count(&self) -> usize {
        let zones = self.size.div_ceil(ZONE_BYTES64) as usize;
        zones.min(NUM_VOLHDRS)
    }

    /// Read the media a blockref points at. Returns the decoded bytes at
    /// the front of the buffer and their count; a zero radix yields zero
    /// bytes and no I/O.
    pub fn read_media(&self, bref: &Blockref) -> Result<(MediaData, usize)> {
        let bytes = bref.data_bytes();
        let mut media = MediaData::zeroed();
        if bytes == 0 {
            return Ok((media, 0));
        }

        let (io_base, io_bytes, boff) = io_window(bref)?;
        self.file.read_exact_at(&mut media.buf[..io_bytes], io_base)?;
        if boff != 0 {
            // Source and destination overlap whenever the offset is not
            // window aligned.
            media.buf.copy_within(boff..boff + bytes, 0);
        }
        trace!(data_off = bref.data_off, bytes, io_base, io_bytes, "read media");
        Ok((media, bytes))
    }

    /// Write media back to where a blockref points, read-modify-write on
    /// the surrounding I/O window, then fsync.
    pub fn write_media(&self, bref: &Blockref, media: &MediaData, bytes: usize) -> Result<()> {
        if bytes == 0 || bytes != bref.data_bytes() {
            return Err(FsError::Topology(format!(
                "write of {} bytes does not match blockref at {:#018x}",
                bytes, bref.data_off
            )));
        }

        let (io_base, io_bytes, boff) = io_window(bref)?;
        let mut window = MediaData::zeroed();
        self.file.read_exact_at(&mut window.buf[..io_bytes], io_base)?;
        window.buf[boff..boff + bytes].copy_from_slice(&media.buf[..bytes]);
        self.file.write_all_at(&window.buf[..io_bytes], io_base)?;
        self.file.sync_all()?;
        trace!(data_off = bref.data_off, bytes, io_base, io_bytes, "wrote media");
        Ok(())
    }

    /// Read the 64 KiB volume header of one zone.
    pub fn read_volume_header(&self, zone: usize) -> Result<MediaData> {
        let mut media = MediaData::zeroed();
        self.file
            .read_exact_at(&mut media.buf, zone as u64 * ZONE_BYTES64)?;
        Ok(media)
    }

    /// Write a volume header back to its zone and fsync.
    pub fn write_volume_header(&self, zone: usize, voldata: &VolumeData) -> Result<()> {
        debug_assert_eq!(VOLUME_BYTES, PBUFSIZE);
        self.file
            .write_all_at(voldata.as_bytes(), zone as u64 * ZONE_BYTES64)?;
        self.file.sync_all()?;
        Ok(())
    }

    pub fn pwrite(&self, buf: &[u8], offset: u64) -> Result<()> {
        self.file.write_all_at(buf, offset)?;
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// Compute the aligned I/O window covering a blockref: base offset, window
/// size, and the target's offset inside the window.
fn io_window(bref: &Blockref) -> Result<(u64, usize, usize)> {
    let radix = bref.radix();
    if radix < hammer2_ondisk::MIN_RADIX || radix > hammer2_ondisk::MAX_RADIX {
        return Err(FsError::BadRadix(radix));
    }
    let bytes = bref.data_bytes();
    let io_off = bref.io_offset();
    let io_base = io_off & !LBUFMASK64;
    let boff = (io_off - io_base) as usize;

    let mut io_bytes = hammer2_ondisk::LBUFSIZE;
    while io_bytes + boff < bytes {
        io_bytes <<= 1;
    }
    // Size-aligned allocations always fit their window; anything else is
    // a corrupt radix or offset.
    if io_bytes > PBUFSIZE || boff + bytes > io_bytes {
        return Err(FsError::IoWindow {
            data_off: bref.data_off,
        });
    }
    Ok((io_base, io_bytes, boff))
}

fn device_size(file: &File) -> Result<u64> {
    #[cfg(target_os = "linux")]
    {
        use std::os::fd::AsRawFd;
        // BLKGETSIZE64, _IOR(0x12, 114, u64)
        const BLKGETSIZE64: libc::c_ulong = 0x8008_1272;
        let mut size: u64 = 0;
        let ret = unsafe { libc::ioctl(file.as_raw_fd(), BLKGETSIZE64, &mut size as *mut u64) };
        if ret == 0 {
            return Ok(size);
        }
    }
    // Character devices and non-Linux hosts: the end offset is the size.
    let mut file = file.try_clone()?;
    Ok(file.seek(SeekFrom::End(0))?)
}
