use sha2::{Digest, Sha256};

pub const BUCKET_COUNT: u32 = 100;

/// Deterministic bucket in `[0, 100)` for an identifier under a flag.
///
/// Hashes `flag_key`, a NUL separator and `identifier` with SHA-256 and
/// reduces the first four digest bytes (big-endian) modulo 100. Changing any
/// part of this reshuffles every rollout, so it must stay fixed.
pub fn bucket(identifier: &str, flag_key: &str) -> u8 {
    let mut hasher = Sha256::new();
    hasher.update(flag_key.as_bytes());
    hasher.update([0u8]);
    hasher.update(identifier.as_bytes());
    let digest = hasher.finalize();

    let word = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    (word % BUCKET_COUNT) as u8
}

/// Clamps a configured percentage into `0..=100`.
pub fn clamp_percentage(percentage: i32) -> u8 {
    percentage.clamp(0, 100) as u8
}

/// Whether `identifier` falls inside a `percentage` rollout.
///
/// Absent or empty identifiers are never admitted.
pub fn in_rollout(identifier: Option<&str>, flag_key: &str, percentage: i32) -> bool {
    match identifier {
        Some(id) if !id.is_empty() => bucket(id, flag_key) < clamp_percentage(percentage),
        _ => false,
    }
}
