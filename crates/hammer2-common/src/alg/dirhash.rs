use super::hash::crc::icrc32;

/// Top bit of a directory key, set on entries visible to readdir.
pub const DIRHASH_VISIBLE: u64 = 0x8000_0000_0000_0000;
/// Low 15 bits carry a degenerate-collision-reducing whole-name CRC.
pub const DIRHASH_LOMASK: u64 = 0x0000_0000_0000_7FFF;
/// Bit 15 is forced on in every generated key.
pub const DIRHASH_FORCED: u64 = 0x0000_0000_0000_8000;

/// Directory name hash.
///
/// The name is split into fragments on `.`, `-`, `_` and `~`; the fragment
/// CRCs are summed into the top 32 bits of the key. The low 15 bits carry a
/// folded CRC of the whole name, bit 15 is forced on, and bit 63 marks the
/// entry visible.
pub fn dirhash(name: &[u8]) -> u64 {
    let mut key: u64 = DIRHASH_VISIBLE;

    let mut crcx: u32 = 0;
    let mut j = 0;
    for (i, &c) in name.iter().enumerate() {
        if matches!(c, b'.' | b'-' | b'_' | b'~') {
            if i != j {
                crcx = crcx.wrapping_add(icrc32(&name[j..i]));
            }
            j = i + 1;
        }
    }
    if name.len() != j {
        crcx = crcx.wrapping_add(icrc32(&name[j..]));
    }
    key |= (crcx as u64) << 32;

    let mut crcx = icrc32(name);
    crcx ^= crcx << 16;
    key |= (crcx as u64) & DIRHASH_LOMASK;
    key |= DIRHASH_FORCED;

    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirhash_marker_bits() {
        for name in [&b"ROOT"[..], b"LOCAL", b"a", b"some-long_file.name~"] {
            let key = dirhash(name);
            assert_ne!(key & DIRHASH_VISIBLE, 0);
            assert_ne!(key & DIRHASH_FORCED, 0);
        }
    }

    #[test]
    fn test_dirhash_fragments() {
        // Separators only delimit fragments: "a.b" and "a-b" sum the same
        // fragment CRCs into the top 32 bits.
        let k1 = dirhash(b"a.b");
        let k2 = dirhash(b"a-b");
        assert_eq!(k1 >> 32, k2 >> 32);
        // A trailing separator contributes nothing.
        assert_eq!(dirhash(b"name.") >> 32, dirhash(b"name") >> 32);
    }

    #[test]
    fn test_dirhash_distinct_names() {
        assert_ne!(dirhash(b"BOOT"), dirhash(b"ROOT"));
        assert_ne!(dirhash(b"DATA"), dirhash(b"LOCAL"));
    }
}
