use xxhash_rust::xxh64;

/// Fixed seed for every XXH64 check code on HAMMER2 media.
pub const XXH64_SEED: u64 = 0x4d61_7474_446c_6c6e;

/// Seeded XXH64 over a byte slice, as stored in `check.xxhash64.value`.
pub fn xxh64(data: &[u8]) -> u64 {
    xxh64::xxh64(data, XXH64_SEED)
}
