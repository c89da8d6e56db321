use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use hammer2_fs::{FsckOptions, fsck};

/// Verify the integrity of a HAMMER2 volume.
#[derive(Debug, Parser)]
#[command(name = "fsck_hammer2")]
struct Args {
    /// Continue past errors and recurse into failed subtrees
    #[arg(short = 'f')]
    force: bool,

    /// Raise verbosity; cancels -q
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Lower verbosity; cancels -v
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    quiet: u8,

    /// Count empty blockrefs in the statistics
    #[arg(short = 'e')]
    count_empty: bool,

    /// Scan only the replica with the highest mirror TID
    #[arg(short = 'b')]
    scan_best: bool,

    /// Enumerate PFS roots and verify each separately
    #[arg(short = 'p')]
    scan_pfs: bool,

    /// Limit the PFS scan to these comma separated names
    #[arg(short = 'l', value_name = "pfs_name", value_delimiter = ',')]
    pfs_names: Vec<String>,

    /// Debug logging
    #[arg(short = 'd')]
    debug: bool,

    device: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let verbose = args.verbose.saturating_sub(args.quiet) as u32;
    let quiet = args.quiet.saturating_sub(args.verbose) as u32;
    let level = if args.debug {
        tracing::Level::TRACE
    } else if verbose > 0 {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    hammer2_cli::init_tracing(level);

    let opts = FsckOptions {
        force: args.force,
        verbose,
        quiet,
        count_empty: args.count_empty,
        scan_best: args.scan_best,
        scan_pfs: args.scan_pfs,
        pfs_names: args.pfs_names,
    };

    match fsck(&args.device, &opts) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("fsck_hammer2: {err}");
            ExitCode::FAILURE
        }
    }
}
