//! Check-code dispatch: the algorithm named by a blockref's `methods` byte
//! applied to the bytes it references.

use std::fmt;

use hammer2_common::{icrc32, sha192, xxh64};
use hammer2_ondisk::{Blockref, CheckMethod, checktype_to_str};

use crate::error::FsError;

/// A computed or recorded check code, tagged with its algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckValue {
    None,
    Iscsi32(u32),
    Xxhash64(u64),
    Sha192([u8; 24]),
    Freemap(u32),
}

impl fmt::Display for CheckValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckValue::None => f.write_str("-"),
            CheckValue::Iscsi32(v) | CheckValue::Freemap(v) => write!(f, "{v:08x}"),
            CheckValue::Xxhash64(v) => write!(f, "{v:016x}"),
            CheckValue::Sha192(d) => {
                for b in d {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Compute the check named by `method` over `data`. Total: every method
/// yields a value.
pub fn compute(method: CheckMethod, data: &[u8]) -> CheckValue {
    match method {
        CheckMethod::None => CheckValue::None,
        CheckMethod::Iscsi32 => CheckValue::Iscsi32(icrc32(data)),
        CheckMethod::Xxhash64 => CheckValue::Xxhash64(xxh64(data)),
        CheckMethod::Sha192 => CheckValue::Sha192(sha192(data)),
        CheckMethod::Freemap => CheckValue::Freemap(icrc32(data)),
    }
}

/// The check recorded in a blockref, interpreted per its `methods` byte.
pub fn recorded(bref: &Blockref) -> CheckValue {
    match bref.check_method() {
        CheckMethod::None => CheckValue::None,
        CheckMethod::Iscsi32 => CheckValue::Iscsi32(bref.check.iscsi32()),
        CheckMethod::Xxhash64 => CheckValue::Xxhash64(bref.check.xxhash64()),
        CheckMethod::Sha192 => CheckValue::Sha192(bref.check.sha192()),
        CheckMethod::Freemap => CheckValue::Freemap(bref.check.freemap_icrc32()),
    }
}

/// Store a check value into a blockref's check union.
pub fn store(bref: &mut Blockref, value: CheckValue) {
    match value {
        CheckValue::None => {}
        CheckValue::Iscsi32(v) => bref.check.set_iscsi32(v),
        CheckValue::Xxhash64(v) => bref.check.set_xxhash64(v),
        CheckValue::Sha192(d) => bref.check.set_sha192(d),
        CheckValue::Freemap(v) => bref.check.set_freemap_icrc32(v),
    }
}

/// Re-derive the check a blockref records for `data` and compare.
pub fn verify(bref: &Blockref, data: &[u8]) -> Result<(), FsError> {
    let expected = recorded(bref);
    let actual = compute(bref.check_method(), data);
    if expected == actual {
        Ok(())
    } else {
        Err(FsError::CheckMismatch {
            algo: checktype_to_str(bref.methods),
            data_off: bref.data_off,
            expected,
            actual,
        })
    }
}
