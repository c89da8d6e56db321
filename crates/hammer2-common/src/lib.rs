//! Checksum, hash and formatting helpers shared by the HAMMER2 tools.

/// Algorithms
pub mod alg;
/// Human readable formatting
pub mod format;

pub use alg::dirhash::{DIRHASH_FORCED, DIRHASH_LOMASK, DIRHASH_VISIBLE, dirhash};
pub use alg::hash::crc::{Icrc32, icrc32};
pub use alg::hash::sha::sha192;
pub use alg::hash::xxh::{XXH64_SEED, xxh64};
pub use format::size_to_str;
