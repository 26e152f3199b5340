use std::collections::BTreeSet;

/// Default signature width. 128 hash functions keep the MinHash/exact-Jaccard
/// gap under 0.2 on 95% of trials for the set sizes this index sees in
/// practice.
pub const DEFAULT_NUM_HASHES: usize = 128;

/// Default construction seed. Fixed so signatures are reproducible across
/// runs and processes without requiring callers to thread a seed through.
pub const DEFAULT_SEED: u64 = 0x5EED_C0DE_DNA5_EEDu64;

/// A stateless MinHash hasher: builds `k`-wide signatures that approximate
/// Jaccard similarity over sets of strings.
///
/// Two `MinHash` instances built with the same `(k, seed)` always derive the
/// same per-slot seeds and therefore produce comparable signatures. Mixing
/// signatures produced by different parameters is a caller error.
#[derive(Debug, Clone)]
pub struct MinHash {
    slot_seeds: Vec<u64>,
}

impl Default for MinHash {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_HASHES, DEFAULT_SEED)
    }
}

impl MinHash {
    /// Builds a `MinHash` with `k` hash functions derived from `seed`.
    #[must_use]
    pub fn new(k: usize, seed: u64) -> Self {
        let slot_seeds = (0..k as u64)
            .map(|i| splitmix64(seed.wrapping_add(i)))
            .collect();
        Self { slot_seeds }
    }

    /// Number of hash functions (the signature width this instance produces).
    #[must_use]
    pub fn k(&self) -> usize {
        self.slot_seeds.len()
    }

    /// Computes the `k`-wide MinHash signature of `set`. The signature of the
    /// empty set is `[u64::MAX; k]`.
    #[must_use]
    pub fn signature(&self, set: &BTreeSet<String>) -> Vec<u64> {
        let mut sig = vec![u64::MAX; self.slot_seeds.len()];
        for element in set {
            let base = codedna_hash::hash64(element);
            for (slot, seed) in sig.iter_mut().zip(&self.slot_seeds) {
                let candidate = mix(base ^ seed);
                if candidate < *slot {
                    *slot = candidate;
                }
            }
        }
        sig
    }

    /// Fraction of positions at which `sig1` and `sig2` agree, an unbiased
    /// estimator of the Jaccard similarity of the sets they were built from.
    ///
    /// Both signatures must have equal length; mismatched lengths mean the
    /// caller compared signatures built with different `k`, which is a
    /// programming error, not a recoverable one.
    #[must_use]
    pub fn estimate_similarity(sig1: &[u64], sig2: &[u64]) -> f64 {
        assert_eq!(sig1.len(), sig2.len(), "MinHash signatures must have equal length");
        if sig1.is_empty() {
            return 1.0;
        }
        let matches = sig1.iter().zip(sig2).filter(|(a, b)| a == b).count();
        matches as f64 / sig1.len() as f64
    }

    /// Exact Jaccard similarity, using the same empty-set conventions as the
    /// rest of the comparison pipeline: `J(∅, ∅) = 1`, `J(X, ∅) = 0` for
    /// non-empty `X`.
    #[must_use]
    pub fn exact_jaccard(x: &BTreeSet<String>, y: &BTreeSet<String>) -> f64 {
        if x.is_empty() && y.is_empty() {
            return 1.0;
        }
        let intersection = x.intersection(y).count();
        let union = x.union(y).count();
        if union == 0 {
            1.0
        } else {
            intersection as f64 / union as f64
        }
    }
}

/// 64-bit finalizer (splitmix64). A fast avalanche function: small changes to
/// the input flip roughly half the output bits, which is what makes
/// `slot_seeds` behave like independent hash families.
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn mix(x: u64) -> u64 {
    splitmix64(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn signature_of_empty_set_is_all_max() {
        let mh = MinHash::default();
        let sig = mh.signature(&BTreeSet::new());
        assert!(sig.iter().all(|&v| v == u64::MAX));
    }

    #[test]
    fn identical_sets_produce_identical_signatures() {
        let mh = MinHash::new(32, DEFAULT_SEED);
        let a = set(&["x", "y", "z"]);
        let b = set(&["z", "y", "x"]);
        assert_eq!(mh.signature(&a), mh.signature(&b));
    }

    #[test]
    fn estimate_similarity_is_symmetric() {
        let mh = MinHash::new(64, DEFAULT_SEED);
        let a = mh.signature(&set(&["a", "b", "c"]));
        let b = mh.signature(&set(&["b", "c", "d"]));
        assert_eq!(
            MinHash::estimate_similarity(&a, &b),
            MinHash::estimate_similarity(&b, &a)
        );
    }

    #[test]
    fn estimate_similarity_of_identical_signatures_is_one() {
        let mh = MinHash::new(64, DEFAULT_SEED);
        let a = mh.signature(&set(&["a", "b", "c"]));
        assert_eq!(MinHash::estimate_similarity(&a, &a), 1.0);
    }

    #[test]
    fn exact_jaccard_set_conventions() {
        assert_eq!(MinHash::exact_jaccard(&set(&[]), &set(&[])), 1.0);
        assert_eq!(MinHash::exact_jaccard(&set(&["a"]), &set(&[])), 0.0);
        assert_eq!(MinHash::exact_jaccard(&set(&["a", "b"]), &set(&["b", "c"])), 1.0 / 3.0);
    }

    #[test]
    fn approximates_exact_jaccard_for_larger_random_sets() {
        let base: Vec<String> = (0..80).map(|i| format!("token-{i}")).collect();
        let a: BTreeSet<String> = base.iter().cloned().collect();
        let b: BTreeSet<String> = base.iter().take(60).cloned().collect();
        let mh = MinHash::new(128, DEFAULT_SEED);
        let exact = MinHash::exact_jaccard(&a, &b);
        let estimate = MinHash::estimate_similarity(&mh.signature(&a), &mh.signature(&b));
        assert!((exact - estimate).abs() < 0.2, "exact={exact} estimate={estimate}");
    }
}
