//! Modulo ownership.

use twox_hash::XxHash32;

use super::ShardingStrategy;

/// 32-bit signed hash of a sharding key.
pub fn key_hash(key: &str) -> i32 {
    // reinterpret the unsigned hash bits as signed so the whole i32 range,
    // including i32::MIN, flows through the bucketing formula
    XxHash32::oneshot(0, key.as_bytes()) as i32
}

/// `((hash % n) + n) % n`, computed in 64 bits so no hash value overflows.
pub fn modulo_bucket(hash: i32, total_pods: usize) -> usize {
    if total_pods <= 1 {
        return 0;
    }
    let n = i64::try_from(total_pods).unwrap_or(i64::MAX);
    let bucket = ((i64::from(hash) % n) + n) % n;
    usize::try_from(bucket).unwrap_or(0)
}

/// Hash-modulo ownership: even spread, but a pod-count change moves up to
/// `(n-1)/n` of all keys.
///
/// `legacy-modulo` and `canonical-modulo` name the same formula; the name is
/// carried only so fleets can keep spelling their configuration the old way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuloStrategy {
    name: &'static str,
}

impl ModuloStrategy {
    pub const fn new() -> Self {
        Self { name: "modulo" }
    }

    pub const fn legacy() -> Self {
        Self {
            name: "legacy-modulo",
        }
    }

    pub const fn canonical() -> Self {
        Self {
            name: "canonical-modulo",
        }
    }
}

impl Default for ModuloStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardingStrategy for ModuloStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn compute_owner(&self, key: &str, total_pods: usize) -> usize {
        modulo_bucket(key_hash(key), total_pods)
    }
}
