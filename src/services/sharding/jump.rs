//! Jump consistent hash ownership.

use twox_hash::XxHash3_128;

use super::ShardingStrategy;

const JUMP_MULTIPLIER: u64 = 2_862_933_555_777_941_757;

/// Map a 64-bit key onto `0..buckets` (Lamping & Veach).
///
/// Growing from `n` to `n + 1` buckets moves only keys that land in the new
/// bucket, about `1/(n+1)` of them.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn jump_consistent_hash(mut key: u64, buckets: usize) -> usize {
    if buckets <= 1 {
        return 0;
    }
    let buckets = i64::try_from(buckets).unwrap_or(i64::MAX);
    let mut b: i64 = -1;
    let mut j: i64 = 0;
    while j < buckets {
        b = j;
        key = key.wrapping_mul(JUMP_MULTIPLIER).wrapping_add(1);
        j = ((b + 1) as f64 * ((1u64 << 31) as f64 / ((key >> 33) + 1) as f64)) as i64;
    }
    usize::try_from(b).unwrap_or(0)
}

/// 64-bit fingerprint of a key: the low half of its 128-bit xxh3 hash.
#[allow(clippy::cast_possible_truncation)]
pub fn key_fingerprint(key: &str) -> u64 {
    XxHash3_128::oneshot(key.as_bytes()) as u64
}

/// Jump consistent hash over dense buckets `0..n`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JumpConsistentHashStrategy;

impl ShardingStrategy for JumpConsistentHashStrategy {
    fn name(&self) -> &'static str {
        "jump"
    }

    fn compute_owner(&self, key: &str, total_pods: usize) -> usize {
        jump_consistent_hash(key_fingerprint(key), total_pods)
    }
}
