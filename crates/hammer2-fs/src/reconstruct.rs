//! Bottom-up check-code reconstruction.
//!
//! Walks each replica's freemap and volume topologies in post-order; at
//! every node it re-derives the check code the parent records for it and,
//! when forced, patches the parent slot in place. Once the body is
//! self-consistent the three volume-header CRCs are recomputed and the
//! header rewritten. Nothing is ever moved or renumbered.

use std::mem::offset_of;
use std::path::Path;

use hammer2_common::icrc32;
use hammer2_ondisk::{
    BLOCKREF_BYTES, BREF_TYPE_EMPTY, BREF_TYPE_FREEMAP, BREF_TYPE_FREEMAP_NODE,
    BREF_TYPE_INDIRECT, BREF_TYPE_INODE, BREF_TYPE_VOLUME, Blockref, CheckMethod, InodeData,
    MediaData, VOL_ICRC_SECT0, VOL_ICRC_SECT1, VOLUME_ICRC0_OFF, VOLUME_ICRC0_SIZE,
    VOLUME_ICRC1_OFF, VOLUME_ICRC1_SIZE, VOLUME_ICRCVH_OFF, VOLUME_ICRCVH_SIZE, VolumeData,
    breftype_to_str,
};
use tracing::debug;

use crate::check;
use crate::error::{FsError, Result};
use crate::topology::{TopologyVisitor, Walker};
use crate::vol::Volume;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconstructOptions {
    /// Actually rewrite mismatching check codes and CRCs; otherwise dry
    /// run, reporting what would change.
    pub force: bool,
}

/// What a reconstruction pass found and did. A second forced run over the
/// same volume reports zero everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconstructSummary {
    /// Check codes and header CRCs that did not match.
    pub mismatches: u64,
    /// How many of them were rewritten.
    pub modified: u64,
    /// Nodes skipped because their check method cannot be re-derived.
    pub unsupported: u64,
}

/// Byte offset of child slot `index` inside a parent's media.
fn child_slot_offset(parent: &Blockref, media: &MediaData, index: usize) -> Result<usize> {
    let base = match parent.btype {
        BREF_TYPE_INODE => {
            if media.as_inode().meta.has_direct_data() {
                return Err(FsError::Topology(format!(
                    "direct-data inode at {:#018x} cannot have children",
                    parent.data_off
                )));
            }
            offset_of!(InodeData, u)
        }
        BREF_TYPE_INDIRECT | BREF_TYPE_FREEMAP_NODE => 0,
        BREF_TYPE_VOLUME => offset_of!(VolumeData, sroot_blockset),
        BREF_TYPE_FREEMAP => offset_of!(VolumeData, freemap_blockset),
        other => return Err(FsError::UnknownBrefType(other)),
    };
    Ok(base + index * BLOCKREF_BYTES)
}

struct ReconstructVisitor<'s> {
    force: bool,
    summary: &'s mut ReconstructSummary,
}

impl TopologyVisitor for ReconstructVisitor<'_> {
    fn leave(
        &mut self,
        vol: &Volume,
        parent: Option<&Blockref>,
        index: usize,
        bref: &Blockref,
        media: &MediaData,
        bytes: usize,
        depth: usize,
    ) -> Result<()> {
        let Some(parent) = parent else {
            return Ok(());
        };
        if bytes == 0 {
            return Ok(());
        }

        let (mut parent_media, parent_bytes) = vol.read_media(parent)?;
        if parent_bytes == 0 {
            return Err(FsError::Topology(format!(
                "parent blockref at {:#018x} has no media",
                parent.data_off
            )));
        }

        let off = child_slot_offset(parent, &parent_media, index)?;
        let slot: Blockref =
            *bytemuck::from_bytes(&parent_media.buf[off..off + BLOCKREF_BYTES]);
        if slot != *bref {
            return Err(FsError::Topology(format!(
                "blockref contents mismatch in parent at {:#018x} slot {index}",
                parent.data_off
            )));
        }

        let method = slot.check_method();
        match method {
            CheckMethod::None => return Ok(()),
            CheckMethod::Sha192 => {
                eprintln!(
                    "sha192 check at {:#018x} cannot be re-derived, leaving it alone",
                    slot.data_off
                );
                self.summary.unsupported += 1;
                return Ok(());
            }
            _ => {}
        }

        let computed = check::compute(method, media.bytes(bytes));
        if check::recorded(&slot) != computed {
            self.summary.mismatches += 1;
            if self.force {
                let slot_mut: &mut Blockref =
                    bytemuck::from_bytes_mut(&mut parent_media.buf[off..off + BLOCKREF_BYTES]);
                check::store(slot_mut, computed);
                vol.write_media(parent, &parent_media, parent_bytes)?;
                self.summary.modified += 1;
            }
            println!(
                "{}{:2} {:<8} blockref[{:<3}] {:016x} {:02x} {}",
                if self.force { "Modified " } else { "" },
                depth - 1,
                breftype_to_str(parent.btype),
                index,
                slot.data_off,
                slot.methods,
                breftype_to_str(slot.btype),
            );
        }
        Ok(())
    }
}

fn reconstruct_blockref(
    vol: &Volume,
    opts: ReconstructOptions,
    root_type: u8,
    summary: &mut ReconstructSummary,
) -> Result<()> {
    let mut first_err = None;
    for zone in 0..vol.zone_count() {
        let broot = Blockref::new_root(root_type, zone);
        println!("zone.{} {:016x}", zone, broot.data_off);

        let mut visitor = ReconstructVisitor {
            force: opts.force,
            summary: &mut *summary,
        };
        let mut walker = Walker::new(vol);
        // Child rewrites change this node's media on disk; leave must see
        // the rewritten bytes.
        walker.refresh_after_descent = opts.force;
        if let Err(err) = walker.walk(&broot, &mut visitor) {
            eprintln!("zone.{zone}: {err}");
            first_err.get_or_insert(err);
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn reconstruct_volume_header(
    vol: &Volume,
    opts: ReconstructOptions,
    summary: &mut ReconstructSummary,
) -> Result<()> {
    let mut first_err = None;
    for zone in 0..vol.zone_count() {
        let broot = Blockref::new_root(BREF_TYPE_EMPTY, zone);
        println!("zone.{} {:016x}", zone, broot.data_off);

        let mut media = vol.read_volume_header(zone)?;
        let voldata = media.as_voldata_mut();
        if !voldata.has_valid_magic() {
            eprintln!("Bad magic {:X}", voldata.magic);
            first_err.get_or_insert(FsError::BadMagic(voldata.magic));
            continue;
        }
        if voldata.is_reverse_endian() {
            eprintln!("Reverse endian");
        }

        let prefix = if opts.force { "Modified " } else { "" };
        let mut found = false;

        // Sector 1 first: its CRC slot lies inside sector 0's range, so
        // sector 0 must be summed after any repair here.
        let crc = icrc32(&voldata.as_bytes()[VOLUME_ICRC1_OFF..VOLUME_ICRC1_OFF + VOLUME_ICRC1_SIZE]);
        if voldata.icrc_sects[VOL_ICRC_SECT1] != crc {
            if opts.force {
                voldata.icrc_sects[VOL_ICRC_SECT1] = crc;
                summary.modified += 1;
            }
            summary.mismatches += 1;
            found = true;
            println!("{}{:016x} sector 1 CRC", prefix, broot.data_off);
        }

        let crc = icrc32(&voldata.as_bytes()[VOLUME_ICRC0_OFF..VOLUME_ICRC0_OFF + VOLUME_ICRC0_SIZE]);
        if voldata.icrc_sects[VOL_ICRC_SECT0] != crc {
            if opts.force {
                voldata.icrc_sects[VOL_ICRC_SECT0] = crc;
                summary.modified += 1;
            }
            summary.mismatches += 1;
            found = true;
            println!("{}{:016x} sector 0 CRC", prefix, broot.data_off);
        }

        let crc =
            icrc32(&voldata.as_bytes()[VOLUME_ICRCVH_OFF..VOLUME_ICRCVH_OFF + VOLUME_ICRCVH_SIZE]);
        if voldata.icrc_volheader != crc {
            if opts.force {
                voldata.icrc_volheader = crc;
                summary.modified += 1;
            }
            summary.mismatches += 1;
            found = true;
            println!("{}{:016x} volume header CRC", prefix, broot.data_off);
        }

        if found && opts.force {
            if let Err(err) = vol.write_volume_header(zone, media.as_voldata()) {
                first_err.get_or_insert(err);
            }
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Rewrite drifted check codes and header CRCs across all replicas, in
/// the order freemap topology, volume topology, header CRCs. Without
/// `force` this is a dry run that only reports.
pub fn reconstruct(path: &Path, opts: ReconstructOptions) -> Result<ReconstructSummary> {
    let vol = Volume::open(path, false)?;
    if vol.zone_count() == 0 {
        return Err(FsError::Format(format!(
            "{}: too small to hold a volume header",
            path.display()
        )));
    }
    let mut summary = ReconstructSummary::default();

    println!("freemap");
    reconstruct_blockref(&vol, opts, BREF_TYPE_FREEMAP, &mut summary)?;
    println!("volume");
    reconstruct_blockref(&vol, opts, BREF_TYPE_VOLUME, &mut summary)?;
    println!("volume header");
    reconstruct_volume_header(&vol, opts, &mut summary)?;

    debug!(?summary, "reconstruction pass complete");
    Ok(summary)
}
