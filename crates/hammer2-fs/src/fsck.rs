//! Read-only integrity scan: volume-header CRCs, then a full recursive
//! verification of the freemap and volume topologies with per-zone
//! statistics and a diagnostic per failing parent-child pair.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use hammer2_common::{icrc32, size_to_str};
use hammer2_ondisk::{
    BLOCKREF_BYTES, BREF_TYPE_DATA, BREF_TYPE_DIRENT, BREF_TYPE_EMPTY, BREF_TYPE_FREEMAP,
    BREF_TYPE_FREEMAP_LEAF, BREF_TYPE_FREEMAP_NODE, BREF_TYPE_INDIRECT, BREF_TYPE_INODE,
    BREF_TYPE_VOLUME, Blockref, INODE_VERSION_ONE, MediaData, VOL_ICRC_SECT0, VOL_ICRC_SECT1,
    VOLUME_ICRC0_OFF,
    VOLUME_ICRC0_SIZE, VOLUME_ICRC1_OFF, VOLUME_ICRC1_SIZE, VOLUME_ICRCVH_OFF, VOLUME_ICRCVH_SIZE,
    VolumeData,
};
use tracing::debug;

use crate::check;
use crate::error::{FsError, Result};
use crate::topology::{Descent, TopologyVisitor, Walker, child_blockrefs, find_best_zone};
use crate::vol::Volume;

const TAB: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct FsckOptions {
    /// Continue past errors; recurse into subtrees whose root failed.
    pub force: bool,
    pub verbose: u32,
    pub quiet: u32,
    /// Count EMPTY blockrefs in the statistics.
    pub count_empty: bool,
    /// Restrict the scan to the best replica.
    pub scan_best: bool,
    /// Enumerate PFS roots and verify each separately.
    pub scan_pfs: bool,
    /// With `scan_pfs`, limit the scan to these PFS names.
    pub pfs_names: Vec<String>,
}

struct BlockrefMessage {
    bref: Blockref,
    msg: String,
}

/// Per-walk counters plus the diagnostics collected along the way, keyed
/// by the failing blockref's media offset.
pub struct BlockrefStats {
    root_type: u8,
    pub total_blockref: u64,
    pub total_empty: u64,
    pub total_invalid: u64,
    pub total_bytes: u64,
    pub total_inode: u64,
    pub total_indirect: u64,
    pub total_data: u64,
    pub total_dirent: u64,
    pub total_freemap_node: u64,
    pub total_freemap_leaf: u64,
    messages: BTreeMap<u64, Vec<BlockrefMessage>>,
}

impl BlockrefStats {
    fn new(root_type: u8) -> BlockrefStats {
        BlockrefStats {
            root_type,
            total_blockref: 0,
            total_empty: 0,
            total_invalid: 0,
            total_bytes: 0,
            total_inode: 0,
            total_indirect: 0,
            total_data: 0,
            total_dirent: 0,
            total_freemap_node: 0,
            total_freemap_leaf: 0,
            messages: BTreeMap::new(),
        }
    }

    fn add_entry(&mut self, bref: &Blockref, msg: impl Into<String>) {
        self.messages
            .entry(bref.data_off)
            .or_default()
            .push(BlockrefMessage {
                bref: *bref,
                msg: msg.into(),
            });
    }

    fn format_line(&self) -> String {
        match self.root_type {
            BREF_TYPE_FREEMAP => format!(
                "{} blockref ({} node, {} leaf, {} empty), {}",
                self.total_blockref,
                self.total_freemap_node,
                self.total_freemap_leaf,
                self.total_empty,
                size_to_str(self.total_bytes).trim_start(),
            ),
            _ => format!(
                "{} blockref ({} inode, {} indirect, {} data, {} dirent, {} empty), {}",
                self.total_blockref,
                self.total_inode,
                self.total_indirect,
                self.total_data,
                self.total_dirent,
                self.total_empty,
                size_to_str(self.total_bytes).trim_start(),
            ),
        }
    }

    fn print_final(&self) {
        tprintln(1, &self.format_line());
    }

    fn print_progress(&self) {
        let width = chars_per_line();
        let mut line = format!("{:1$}{2}", "", TAB, self.format_line());
        line.truncate(width.saturating_sub(1));
        print!("{line}\r");
        let _ = std::io::stdout().flush();
    }

    fn print_messages(&self) {
        for entry in self.messages.values() {
            for m in entry {
                teprintln(
                    1,
                    &format!(
                        "{:016x} {:3} {:016x}/{:<2} \"{}\"",
                        m.bref.data_off, m.bref.btype, m.bref.key, m.bref.keybits, m.msg
                    ),
                );
            }
        }
    }
}

fn tprintln(tab: usize, msg: &str) {
    println!("{:1$}{msg}", "", tab * TAB);
}

fn teprintln(tab: usize, msg: &str) {
    eprintln!("{:1$}{msg}", "", tab * TAB);
}

/// Progress line width: `COLUMNS`, else the terminal, else 80.
fn chars_per_line() -> usize {
    if let Ok(columns) = std::env::var("COLUMNS") {
        if let Ok(n) = columns.trim().parse::<usize>() {
            if n > 0 {
                return n;
            }
        }
    }
    unsafe {
        let mut ws: libc::winsize = std::mem::zeroed();
        if libc::ioctl(0, libc::TIOCGWINSZ, &mut ws) != -1 && ws.ws_col > 0 {
            return ws.ws_col as usize;
        }
    }
    80
}

struct VerifyVisitor<'o> {
    opts: &'o FsckOptions,
    stats: BlockrefStats,
    /// One frame per in-progress node: did its own verification fail.
    fail_stack: Vec<bool>,
    any_failed: bool,
}

impl<'o> VerifyVisitor<'o> {
    fn new(opts: &'o FsckOptions, root_type: u8) -> VerifyVisitor<'o> {
        VerifyVisitor {
            opts,
            stats: BlockrefStats::new(root_type),
            fail_stack: Vec::new(),
            any_failed: false,
        }
    }
}

impl TopologyVisitor for VerifyVisitor<'_> {
    fn enter(
        &mut self,
        _vol: &Volume,
        _parent: Option<&Blockref>,
        _index: usize,
        bref: &Blockref,
        media: &MediaData,
        bytes: usize,
        depth: usize,
    ) -> Result<Descent> {
        let mut failed = false;
        let stats = &mut self.stats;

        match bref.btype {
            BREF_TYPE_VOLUME | BREF_TYPE_FREEMAP => {}
            BREF_TYPE_INODE => {
                stats.total_blockref += 1;
                stats.total_inode += 1;
            }
            BREF_TYPE_INDIRECT => {
                stats.total_blockref += 1;
                stats.total_indirect += 1;
            }
            BREF_TYPE_DATA => {
                stats.total_blockref += 1;
                stats.total_data += 1;
            }
            BREF_TYPE_DIRENT => {
                stats.total_blockref += 1;
                stats.total_dirent += 1;
            }
            BREF_TYPE_FREEMAP_NODE => {
                stats.total_blockref += 1;
                stats.total_freemap_node += 1;
            }
            BREF_TYPE_FREEMAP_LEAF => {
                stats.total_blockref += 1;
                stats.total_freemap_leaf += 1;
            }
            invalid => {
                stats.total_blockref += 1;
                stats.total_invalid += 1;
                stats.add_entry(bref, format!("Invalid blockref type {invalid}"));
                failed = true;
            }
        }

        // Empty slots are never descended into; tally them here.
        let empties = child_blockrefs(bref, media, bytes)
            .iter()
            .filter(|child| child.is_empty())
            .count() as u64;
        stats.total_empty += empties;
        if self.opts.count_empty {
            stats.total_blockref += empties;
        }

        if bref.btype != BREF_TYPE_VOLUME && bref.btype != BREF_TYPE_FREEMAP {
            stats.total_bytes += bytes as u64;
        }

        if self.opts.quiet == 0 && stats.total_blockref % 100 == 0 {
            stats.print_progress();
        }

        if bytes != 0 {
            if let Err(FsError::CheckMismatch { algo, .. }) =
                check::verify(bref, media.bytes(bytes))
            {
                stats.add_entry(bref, format!("Bad {algo} check"));
                failed = true;
            }
            if bref.btype == BREF_TYPE_INODE {
                let version = media.as_inode().meta.version;
                if version != INODE_VERSION_ONE {
                    stats.add_entry(bref, FsError::BadInodeVersion(version).to_string());
                    failed = true;
                }
            }
        }

        debug!(
            btype = bref.btype,
            data_off = bref.data_off,
            depth,
            failed,
            "verified blockref"
        );

        if failed {
            self.any_failed = true;
        }
        self.fail_stack.push(failed);

        if failed && !self.opts.force {
            // One more level below a bad check, then stop.
            Ok(Descent::Prune)
        } else {
            Ok(Descent::Recurse)
        }
    }

    fn leave(
        &mut self,
        _vol: &Volume,
        _parent: Option<&Blockref>,
        _index: usize,
        bref: &Blockref,
        _media: &MediaData,
        _bytes: usize,
        _depth: usize,
    ) -> Result<()> {
        let failed = self.fail_stack.pop().unwrap_or(false);
        if failed && !self.opts.force {
            // Terminate the walk at the first failed subtree.
            return Err(FsError::Topology(format!(
                "blockref at {:#018x} failed verification",
                bref.data_off
            )));
        }
        Ok(())
    }

    fn media_error(&mut self, bref: &Blockref, err: FsError) -> FsError {
        match &err {
            FsError::IoWindow { .. } | FsError::BadRadix(_) => {
                self.stats.add_entry(bref, "Bad I/O bytes");
            }
            _ => self.stats.add_entry(bref, "Failed to read media"),
        }
        self.any_failed = true;
        err
    }
}

fn print_zone(zone: usize, broot: &Blockref, best_zone: Option<usize>, opts: &FsckOptions) {
    let best = if !opts.scan_best && Some(zone) == best_zone {
        " (best)"
    } else {
        ""
    };
    tprintln(0, &format!("zone.{} {:016x}{}", zone, broot.data_off, best));
}

fn verify_volume_header(voldata: &VolumeData) -> bool {
    if !voldata.has_valid_magic() {
        teprintln(1, &format!("Bad magic {:X}", voldata.magic));
        return false;
    }
    if voldata.is_reverse_endian() {
        teprintln(1, "Reverse endian");
    }

    let bytes = voldata.as_bytes();
    let mut ok = true;

    let crc = icrc32(&bytes[VOLUME_ICRC0_OFF..VOLUME_ICRC0_OFF + VOLUME_ICRC0_SIZE]);
    if voldata.icrc_sects[VOL_ICRC_SECT0] != crc {
        teprintln(1, "Bad sector 0 CRC");
        ok = false;
    }
    let crc = icrc32(&bytes[VOLUME_ICRC1_OFF..VOLUME_ICRC1_OFF + VOLUME_ICRC1_SIZE]);
    if voldata.icrc_sects[VOL_ICRC_SECT1] != crc {
        teprintln(1, "Bad sector 1 CRC");
        ok = false;
    }
    let crc = icrc32(&bytes[VOLUME_ICRCVH_OFF..VOLUME_ICRCVH_OFF + VOLUME_ICRCVH_SIZE]);
    if voldata.icrc_volheader != crc {
        teprintln(1, "Bad volume header CRC");
        ok = false;
    }
    ok
}

fn test_volume_header(vol: &Volume, opts: &FsckOptions, best_zone: Option<usize>) -> Result<bool> {
    let mut failed = false;
    for zone in 0..vol.zone_count() {
        if opts.scan_best && Some(zone) != best_zone {
            continue;
        }
        let broot = Blockref::new_root(BREF_TYPE_EMPTY, zone);
        print_zone(zone, &broot, best_zone, opts);
        let media = vol.read_volume_header(zone)?;
        if !verify_volume_header(media.as_voldata()) {
            failed = true;
        }
    }
    Ok(!failed)
}

fn walk_and_report(
    vol: &Volume,
    opts: &FsckOptions,
    root_type: u8,
    start: &Blockref,
) -> bool {
    let mut visitor = VerifyVisitor::new(opts, root_type);
    let walker = Walker::new(vol);
    let walk_failed = match walker.walk(start, &mut visitor) {
        Ok(()) => visitor.any_failed,
        Err(err) => {
            debug!(%err, "verification walk terminated");
            true
        }
    };
    visitor.stats.print_final();
    visitor.stats.print_messages();
    walk_failed
}

fn test_blockref(
    vol: &Volume,
    opts: &FsckOptions,
    best_zone: Option<usize>,
    root_type: u8,
) -> bool {
    let mut failed = false;
    for zone in 0..vol.zone_count() {
        if opts.scan_best && Some(zone) != best_zone {
            continue;
        }
        let broot = Blockref::new_root(root_type, zone);
        print_zone(zone, &broot, best_zone, opts);
        if walk_and_report(vol, opts, root_type, &broot) {
            failed = true;
        }
    }
    failed
}

/// Collect `(blockref, name)` for every PFS root reachable from `bref`,
/// descending through SUPROOT inodes but not into the PFS roots
/// themselves.
fn collect_pfs(vol: &Volume, bref: &Blockref, list: &mut Vec<(Blockref, String)>) -> Result<()> {
    let (media, bytes) = vol.read_media(bref)?;
    if bytes == 0 {
        return Ok(());
    }

    let children: Vec<Blockref> = match bref.btype {
        BREF_TYPE_INODE => {
            let ipdata = media.as_inode();
            if ipdata.meta.is_sup_root() {
                ipdata.u.blockset().blockref.to_vec()
            } else if ipdata.meta.is_pfs_root() {
                list.push((
                    *bref,
                    String::from_utf8_lossy(ipdata.name()).into_owned(),
                ));
                Vec::new()
            } else {
                // Only the super-root and PFS roots live at this level.
                return Err(FsError::Topology(format!(
                    "unexpected non-PFS inode at {:#018x} under the super-root",
                    bref.data_off
                )));
            }
        }
        BREF_TYPE_INDIRECT => media.blockrefs(bytes / BLOCKREF_BYTES).to_vec(),
        BREF_TYPE_VOLUME => media.as_voldata().sroot_blockset.blockref.to_vec(),
        _ => Vec::new(),
    };

    for child in children.iter().filter(|child| !child.is_empty()) {
        collect_pfs(vol, child, list)?;
    }
    Ok(())
}

fn test_pfs_blockref(vol: &Volume, opts: &FsckOptions, best_zone: Option<usize>) -> bool {
    let mut failed = false;
    for zone in 0..vol.zone_count() {
        if opts.scan_best && Some(zone) != best_zone {
            continue;
        }
        let broot = Blockref::new_root(BREF_TYPE_VOLUME, zone);
        print_zone(zone, &broot, best_zone, opts);

        let mut list = Vec::new();
        if let Err(err) = collect_pfs(vol, &broot, &mut list) {
            teprintln(1, &format!("Failed to read PFS blockref: {err}"));
            failed = true;
            continue;
        }
        if list.is_empty() {
            teprintln(1, "Failed to find PFS blockref");
            failed = true;
            continue;
        }

        for (bref, name) in &list {
            if !opts.pfs_names.is_empty() && !opts.pfs_names.iter().any(|n| n == name) {
                continue;
            }
            tprintln(1, name);
            if walk_and_report(vol, opts, BREF_TYPE_VOLUME, bref) {
                failed = true;
            }
        }

        for want in &opts.pfs_names {
            if !list.iter().any(|(_, name)| name == want) {
                teprintln(1, &format!("PFS \"{want}\" not found"));
                failed = true;
            }
        }
    }
    failed
}

/// Full read-only verification of a volume. `Ok(true)` means clean;
/// `Ok(false)` means issues were found and reported.
pub fn fsck(path: &Path, opts: &FsckOptions) -> Result<bool> {
    let vol = Volume::open(path, true)?;
    if vol.zone_count() == 0 {
        return Err(FsError::Format(format!(
            "{}: too small to hold a volume header",
            path.display()
        )));
    }

    let best_zone = match find_best_zone(&vol) {
        Ok(Some(zone)) => Some(zone),
        _ => {
            eprintln!("Failed to find best zone");
            if opts.scan_best {
                return Ok(false);
            }
            None
        }
    };

    let mut failed = false;

    println!("volume header");
    if !test_volume_header(&vol, opts, best_zone)? {
        failed = true;
        if !opts.force {
            return Ok(false);
        }
    }

    println!("freemap");
    if test_blockref(&vol, opts, best_zone, BREF_TYPE_FREEMAP) {
        failed = true;
        if !opts.force {
            return Ok(false);
        }
    }

    println!("volume");
    if opts.scan_pfs {
        if test_pfs_blockref(&vol, opts, best_zone) {
            failed = true;
        }
    } else if test_blockref(&vol, opts, best_zone, BREF_TYPE_VOLUME) {
        failed = true;
    }

    Ok(!failed)
}
