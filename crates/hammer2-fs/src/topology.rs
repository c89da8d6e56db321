//! Recursive descent over the blockref topology.
//!
//! A walk starts from one of the synthetic per-zone roots (VOLUME or
//! FREEMAP) and descends depth-first. The visitor sees every node twice:
//! `enter` before its children (and decides how deep to go), `leave`
//! after them. Drivers that rewrite child slots set
//! `refresh_after_descent` so `leave` observes the node's media as it is
//! on disk after those rewrites.

use hammer2_ondisk::{
    BLOCKREF_BYTES, BREF_TYPE_FREEMAP, BREF_TYPE_FREEMAP_NODE, BREF_TYPE_INDIRECT,
    BREF_TYPE_INODE, BREF_TYPE_VOLUME, Blockref, MediaData,
};
use tracing::trace;

use crate::error::{FsError, Result};
use crate::vol::Volume;

/// How far to descend below a node, decided by the visitor's `enter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descent {
    /// Walk the whole subtree.
    Recurse,
    /// Visit the direct children but nothing deeper. Used below a failed
    /// check, where one more level catches a single corrupt intermediate
    /// node and everything further down is garbage.
    Prune,
    /// Do not visit the children at all.
    Skip,
}

#[allow(unused_variables, clippy::too_many_arguments)]
pub trait TopologyVisitor {
    /// Pre-order hook.
    fn enter(
        &mut self,
        vol: &Volume,
        parent: Option<&Blockref>,
        index: usize,
        bref: &Blockref,
        media: &MediaData,
        bytes: usize,
        depth: usize,
    ) -> Result<Descent> {
        Ok(Descent::Recurse)
    }

    /// Post-order hook.
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
        Ok(())
    }

    /// Invoked when a node's media cannot be read; whatever is returned
    /// terminates the walk.
    fn media_error(&mut self, bref: &Blockref, err: FsError) -> FsError {
        err
    }
}

/// The child blockref array embedded in a node's media, decoded by node
/// type. Empty slots are included; nodes without children yield an empty
/// slice.
pub fn child_blockrefs<'m>(bref: &Blockref, media: &'m MediaData, bytes: usize) -> &'m [Blockref] {
    if bytes == 0 {
        return &[];
    }
    match bref.btype {
        BREF_TYPE_INODE => {
            let ipdata = media.as_inode();
            if ipdata.meta.has_direct_data() {
                &[]
            } else {
                &ipdata.u.blockset().blockref
            }
        }
        BREF_TYPE_INDIRECT | BREF_TYPE_FREEMAP_NODE => media.blockrefs(bytes / BLOCKREF_BYTES),
        BREF_TYPE_VOLUME => &media.as_voldata().sroot_blockset.blockref,
        BREF_TYPE_FREEMAP => &media.as_voldata().freemap_blockset.blockref,
        _ => &[],
    }
}

pub struct Walker<'v> {
    vol: &'v Volume,
    /// Re-read each node's media after its children were visited, before
    /// `leave` runs.
    pub refresh_after_descent: bool,
}

impl<'v> Walker<'v> {
    pub fn new(vol: &'v Volume) -> Walker<'v> {
        Walker {
            vol,
            refresh_after_descent: false,
        }
    }

    pub fn walk<V: TopologyVisitor>(&self, root: &Blockref, visitor: &mut V) -> Result<()> {
        self.walk_at(None, 0, root, 0, false, visitor)
    }

    fn walk_at<V: TopologyVisitor>(
        &self,
        parent: Option<&Blockref>,
        index: usize,
        bref: &Blockref,
        depth: usize,
        prune: bool,
        visitor: &mut V,
    ) -> Result<()> {
        let (mut media, bytes) = match self.vol.read_media(bref) {
            Ok(read) => read,
            Err(err) => return Err(visitor.media_error(bref, err)),
        };
        trace!(btype = bref.btype, data_off = bref.data_off, depth, "visit blockref");

        let descent = visitor.enter(self.vol, parent, index, bref, &media, bytes, depth)?;

        if !prune && descent != Descent::Skip {
            let children = child_blockrefs(bref, &media, bytes);
            for (i, child) in children.iter().enumerate() {
                if !child.is_empty() {
                    self.walk_at(
                        Some(bref),
                        i,
                        child,
                        depth + 1,
                        descent == Descent::Prune,
                        visitor,
                    )?;
                }
            }
        }

        if self.refresh_after_descent && bytes != 0 {
            media = self.vol.read_media(bref)?.0;
        }
        visitor.leave(self.vol, parent, index, bref, &media, bytes, depth)
    }
}

/// Scan the usable volume-header replicas and return the index of the one
/// with the largest `mirror_tid`, skipping replicas with a bad magic.
pub fn find_best_zone(vol: &Volume) -> Result<Option<usize>> {
    let mut best: Option<(usize, u64)> = None;
    for zone in 0..vol.zone_count() {
        let media = vol.read_volume_header(zone)?;
        let voldata = media.as_voldata();
        if !voldata.has_valid_magic() {
            continue;
        }
        match best {
            Some((_, tid)) if tid >= voldata.mirror_tid => {}
            _ => best = Some((zone, voldata.mirror_tid)),
        }
    }
    Ok(best.map(|(zone, _)| zone))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hammer2_ondisk::{BREF_TYPE_DATA, InodeOpFlags, SET_COUNT};

    #[test]
    fn test_child_decode_inode() {
        let mut media = MediaData::zeroed();
        let mut bref = Blockref::zeroed();
        bref.btype = BREF_TYPE_INODE;
        bref.data_off = 10; // 1 KiB

        assert_eq!(child_blockrefs(&bref, &media, 1024).len(), SET_COUNT);

        media.as_inode_mut().meta.op_flags |= InodeOpFlags::DIRECTDATA.bits();
        assert!(child_blockrefs(&bref, &media, 1024).is_empty());
    }

    #[test]
    fn test_child_decode_indirect_scales_with_bytes() {
        let media = MediaData::zeroed();
        let mut bref = Blockref::zeroed();
        bref.btype = BREF_TYPE_INDIRECT;
        assert_eq!(child_blockrefs(&bref, &media, 4096).len(), 64);
        assert_eq!(child_blockrefs(&bref, &media, 65536).len(), 1024);
    }

    #[test]
    fn test_child_decode_leaf_types() {
        let media = MediaData::zeroed();
        let mut bref = Blockref::zeroed();
        bref.btype = BREF_TYPE_DATA;
        assert!(child_blockrefs(&bref, &media, 65536).is_empty());
        assert!(child_blockrefs(&bref, &media, 0).is_empty());
    }
}
