//! Shared plumbing for the HAMMER2 command line tools.

use hammer2_common::size_to_str;
use hammer2_ondisk::{NEWFS_ALIGN, NEWFS_ALIGNMASK64};

/// Parse a size argument with a required k/m/g/t suffix, bounded by `max`
/// and aligned to the 8 MiB format alignment.
pub fn parse_size(s: &str, max: u64) -> Result<u64, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("unknown suffix in number '{s}'"))?;
    let (digits, suffix) = s.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("bad number '{s}'"))?;
    let multiplier: u64 = match suffix {
        "k" | "K" => 1024,
        "m" | "M" => 1024 * 1024,
        "g" | "G" => 1024 * 1024 * 1024,
        "t" | "T" => 1024 * 1024 * 1024 * 1024,
        _ => return Err(format!("unknown suffix in number '{s}'")),
    };
    let value = value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("value out of range: '{s}'"))?;

    if value > max {
        return Err(format!(
            "value too large: {s}, max is {}",
            size_to_str(max).trim()
        ));
    }
    if value & NEWFS_ALIGNMASK64 != 0 {
        return Err(format!(
            "value not an integral multiple of {}K: {s}",
            NEWFS_ALIGN / 1024
        ));
    }
    Ok(value)
}

/// Route library debug output to stderr at the given level; user-facing
/// reports stay on plain stdout/stderr.
pub fn init_tracing(level: tracing::Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_suffixes() {
        assert_eq!(parse_size("8m", u64::MAX), Ok(8 * 1024 * 1024));
        assert_eq!(parse_size("1G", u64::MAX), Ok(1024 * 1024 * 1024));
        assert_eq!(parse_size("16384k", u64::MAX), Ok(16 * 1024 * 1024));
    }

    #[test]
    fn test_parse_size_requires_suffix() {
        assert!(parse_size("8388608", u64::MAX).is_err());
        assert!(parse_size("8mb", u64::MAX).is_err());
    }

    #[test]
    fn test_parse_size_bounds_and_alignment() {
        assert!(parse_size("512m", 256 * 1024 * 1024).is_err());
        assert!(parse_size("9m", u64::MAX).is_err());
        assert!(parse_size("256m", 256 * 1024 * 1024).is_ok());
    }
}
