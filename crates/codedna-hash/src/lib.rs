//! Stable, non-reversible digests shared by every CodeDNA crate.
//!
//! This crate is intentionally small: every other crate in the workspace
//! hashes strings or byte slices the same way, and a single digest function
//! keeps fingerprints reproducible across crate boundaries and process
//! restarts.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest of `bytes`, used for every token, pattern,
/// and identifier hashed into a `CodeDNA`.
#[must_use]
pub fn digest(bytes: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_ref());
    hex::encode(hasher.finalize())
}

/// A 64-bit digest of `bytes`, taken from the first 8 bytes of the full
/// SHA-256 digest. Used where a fixed-width integer hash is needed (MinHash
/// slot values) rather than a hex string.
#[must_use]
pub fn hash64(bytes: impl AsRef<[u8]>) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_ref());
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[..8].try_into().expect("digest is at least 8 bytes"))
}

/// The first `len` hex characters of [`digest`], for callers that only need
/// a short, still-practically-unique token (e.g. MinHash band buckets).
///
/// `len` is clamped to 64 (the full digest length).
#[must_use]
pub fn short_digest(bytes: impl AsRef<[u8]>, len: usize) -> String {
    let full = digest(bytes);
    let len = len.min(full.len());
    full[..len].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(digest("hello"), digest("hello"));
    }

    #[test]
    fn digest_distinguishes_inputs() {
        assert_ne!(digest("hello"), digest("world"));
    }

    #[test]
    fn short_digest_is_a_prefix_of_the_full_digest() {
        let full = digest("token");
        let short = short_digest("token", 8);
        assert_eq!(short, full[..8]);
    }

    #[test]
    fn short_digest_clamps_len_to_digest_length() {
        let full = digest("x");
        assert_eq!(short_digest("x", 1000), full);
    }

    #[test]
    fn hash64_is_deterministic_and_distinguishes_inputs() {
        assert_eq!(hash64("a"), hash64("a"));
        assert_ne!(hash64("a"), hash64("b"));
    }
}
