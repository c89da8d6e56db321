use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use hammer2_cli::parse_size;
use hammer2_common::size_to_str;
use hammer2_fs::{LOCAL_LABEL, NewfsOptions, NewfsResult, default_label, newfs};
use hammer2_ondisk::{AUX_MAX_BYTES, BOOT_MAX_BYTES};

/// Format a device or file as a HAMMER2 volume.
#[derive(Debug, Parser)]
#[command(name = "newfs_hammer2")]
struct Args {
    /// Boot area size (k/m/g/t suffix, multiple of 8 MiB)
    #[arg(short = 'b', value_name = "bootsize", value_parser = parse_boot_size)]
    boot_size: Option<u64>,

    /// Aux area size (k/m/g/t suffix, multiple of 8 MiB)
    #[arg(short = 'r', value_name = "auxsize", value_parser = parse_aux_size)]
    aux_size: Option<u64>,

    /// Format version
    #[arg(short = 'V', value_name = "version")]
    version: Option<u32>,

    /// Volume label, up to 7; "none" suppresses the default label
    #[arg(short = 'L', value_name = "label")]
    label: Vec<String>,

    device: PathBuf,
}

fn parse_boot_size(s: &str) -> Result<u64, String> {
    parse_size(s, BOOT_MAX_BYTES)
}

fn parse_aux_size(s: &str) -> Result<u64, String> {
    parse_size(s, AUX_MAX_BYTES)
}

fn print_result(result: &NewfsResult) {
    println!("---------------------------------------------");
    println!("version:          {}", result.version);
    println!(
        "total-size:       {} ({} bytes)",
        size_to_str(result.total_space).trim(),
        result.total_space
    );
    println!("boot-area-size:   {}", size_to_str(result.boot_size).trim());
    println!("aux-area-size:    {}", size_to_str(result.aux_size).trim());
    println!("topo-reserved:    {}", size_to_str(result.reserved_space).trim());
    println!("free-space:       {}", size_to_str(result.free_space).trim());
    println!("vol-fsid:         {}", result.vol_fsid);
    println!("sup-clid:         {}", result.sup_clid);
    println!("sup-fsid:         {}", result.sup_fsid);
    for pfs in &result.pfs {
        println!("PFS \"{}\"", pfs.name);
        println!("    clid {}", pfs.clid);
        println!("    fsid {}", pfs.fsid);
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    hammer2_cli::init_tracing(tracing::Level::WARN);

    let mut labels = vec![LOCAL_LABEL.to_string()];
    if args.label.is_empty() {
        let device = args.device.to_string_lossy();
        labels.push(default_label(&device).to_string());
    } else {
        for label in &args.label {
            if label.eq_ignore_ascii_case("none") {
                continue;
            }
            labels.push(label.clone());
        }
    }

    let opts = NewfsOptions {
        boot_size: args.boot_size,
        aux_size: args.aux_size,
        version: args.version,
        labels,
    };

    match newfs(&args.device, &opts) {
        Ok(result) => {
            print_result(&result);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("newfs_hammer2: {err}");
            ExitCode::FAILURE
        }
    }
}
