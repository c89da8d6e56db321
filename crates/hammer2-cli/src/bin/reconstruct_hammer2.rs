use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use hammer2_fs::{ReconstructOptions, reconstruct};

/// Recompute and rewrite the check codes of a HAMMER2 volume.
#[derive(Debug, Parser)]
#[command(name = "reconstruct_hammer2")]
struct Args {
    /// Rewrite mismatching check codes; without this, dry run
    #[arg(short = 'f')]
    force: bool,

    device: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    hammer2_cli::init_tracing(tracing::Level::WARN);

    match reconstruct(&args.device, ReconstructOptions { force: args.force }) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("reconstruct_hammer2: {err}");
            ExitCode::FAILURE
        }
    }
}
