//! HAMMER2 volume access: synchronous block I/O, topology walking, and
//! the three drivers built on them (read-only verification, check-code
//! reconstruction, from-scratch formatting).

pub mod check;
pub mod error;
pub mod fsck;
pub mod newfs;
pub mod reconstruct;
pub mod topology;
pub mod vol;

pub use error::{FsError, Result};
pub use fsck::{FsckOptions, fsck};
pub use newfs::{LOCAL_LABEL, NewfsOptions, NewfsResult, PfsInfo, default_label, newfs};
pub use reconstruct::{ReconstructOptions, ReconstructSummary, reconstruct};
pub use topology::{Descent, TopologyVisitor, Walker, child_blockrefs, find_best_zone};
pub use vol::Volume;
