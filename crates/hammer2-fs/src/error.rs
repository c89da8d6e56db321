use std::path::PathBuf;

use crate::check::CheckValue;

/// Errors raised while operating on a HAMMER2 volume.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("bad volume header magic {0:#018x}")]
    BadMagic(u64),

    #[error("{}: unsupported file type", .0.display())]
    UnsupportedFileType(PathBuf),

    /// The I/O window needed for a blockref exceeds the media buffer.
    #[error("bad I/O bytes for blockref at {data_off:#018x}")]
    IoWindow { data_off: u64 },

    #[error("invalid blockref type {0}")]
    UnknownBrefType(u8),

    #[error("bad allocation radix {0}")]
    BadRadix(u8),

    #[error("bad inode version {0}")]
    BadInodeVersion(u16),

    #[error("{algo} check mismatch at {data_off:#018x}: expected {expected}, got {actual}")]
    CheckMismatch {
        algo: &'static str,
        data_off: u64,
        expected: CheckValue,
        actual: CheckValue,
    },

    #[error("{0}")]
    Topology(String),

    #[error("sha192 check codes cannot be reconstructed")]
    UnsupportedAlgorithm,

    #[error("PFS \"{0}\" not found")]
    PfsNotFound(String),

    /// Invalid format parameters (sizes, labels, version).
    #[error("{0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, FsError>;
