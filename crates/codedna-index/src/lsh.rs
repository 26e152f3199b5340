use std::collections::{BTreeSet, HashMap};

use codedna_fingerprint::CodeDNA;

use crate::error::{IndexError, Result};
use crate::minhash::MinHash;

/// Recommended signature width (`k`). 128 rows split into 16 bands of 8 keep
/// the recall/precision tradeoff reasonable for class-hash-sized sets.
pub const DEFAULT_K: usize = 128;

/// Recommended band count (`b`). `k / b = 8` rows per band.
pub const DEFAULT_BANDS: usize = 16;

/// Neutral fill value for similarity dimensions the index has no signature
/// for (inheritance/interface/package/annotation/behavioral). Matches the
/// neutral value used for a fingerprint with no extractable behavior, so the
/// estimate degrades gracefully rather than silently favoring or penalizing
/// plugins the index can't see all of.
const NEUTRAL_FILL: f64 = 0.5;

#[derive(Debug, Clone)]
struct StoredSignatures {
    class_hashes: Vec<u64>,
    method_signature_hashes: Vec<u64>,
    external_references: Vec<u64>,
}

/// Per-dimension MinHash estimates for one candidate against a query, plus a
/// ranking-only overall score. Not a substitute for [`codedna_similarity`]'s
/// exact computation; candidates should be re-verified before being shown as
/// a final similarity number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatedSimilarity {
    pub class_hashes: f64,
    pub method_signature_hashes: f64,
    pub external_references: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexStats {
    pub num_plugins: usize,
    pub num_buckets: usize,
    pub avg_bucket_size: f64,
    pub max_bucket_size: usize,
}

/// Banded locality-sensitive-hashing index over MinHash signatures of
/// `CodeDNA.structure.class_hashes`. Provides sub-linear candidate retrieval:
/// exact pairwise comparison of every plugin in a large corpus is not
/// affordable, so this trades a small, bounded false-negative rate for
/// constant-ish lookup cost.
///
/// Has a build phase (mutation via [`LshIndex::add`]) and a query phase
/// (read-only). Concurrent writers after queries begin must serialize
/// against readers themselves; this type does no internal locking.
#[derive(Debug, Clone)]
pub struct LshIndex {
    minhash: MinHash,
    bands: usize,
    rows_per_band: usize,
    buckets: HashMap<u64, BTreeSet<String>>,
    plugins: HashMap<String, StoredSignatures>,
}

impl LshIndex {
    /// Builds an index with `k` hash functions split into `b` bands.
    /// `k % b == 0` must hold; otherwise rows-per-band isn't an integer and
    /// construction fails.
    pub fn new(k: usize, b: usize) -> Result<Self> {
        if b == 0 || k % b != 0 {
            return Err(IndexError::BandConfig { k, b });
        }
        Ok(Self {
            minhash: MinHash::new(k, crate::minhash::DEFAULT_SEED),
            bands: b,
            rows_per_band: k / b,
            buckets: HashMap::new(),
            plugins: HashMap::new(),
        })
    }

    /// An index built with the recommended defaults (`k = 128`, `b = 16`).
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_K, DEFAULT_BANDS).expect("default k/b are evenly divisible")
    }

    /// Adds `dna` to the index, keyed by its overall hash. Computes and
    /// stores MinHash signatures over three dimensions and buckets the
    /// class-hash signature by band.
    pub fn add(&mut self, dna: &CodeDNA) {
        let id = dna.hash.clone();
        let class_sig = self.minhash.signature(&dna.structure.class_hashes);
        let method_sig = self.minhash.signature(&dna.api_footprint.method_signature_hashes);
        let ref_sig = self.minhash.signature(&dna.api_footprint.external_references);

        for band in 0..self.bands {
            let bucket_hash = self.band_hash(band, &class_sig);
            self.buckets.entry(bucket_hash).or_default().insert(id.clone());
        }

        self.plugins.insert(
            id,
            StoredSignatures {
                class_hashes: class_sig,
                method_signature_hashes: method_sig,
                external_references: ref_sig,
            },
        );
    }

    /// Returns plugin IDs whose class-hash signature shares at least
    /// `min_band_matches` bands with `query`'s, ordered by descending band
    /// match count (ties broken by plugin ID for determinism).
    ///
    /// This is probabilistic: two sets with Jaccard similarity `s` co-bucket
    /// in at least one band with probability `1 - (1 - s^r)^b`. Misses are
    /// expected at the margins; it is not a correctness bug.
    pub fn find_candidates(&self, query: &CodeDNA, min_band_matches: usize) -> Vec<String> {
        let min_band_matches = min_band_matches.max(1);
        let query_sig = self.minhash.signature(&query.structure.class_hashes);

        let mut matches: HashMap<String, usize> = HashMap::new();
        for band in 0..self.bands {
            let bucket_hash = self.band_hash(band, &query_sig);
            if let Some(ids) = self.buckets.get(&bucket_hash) {
                for id in ids {
                    *matches.entry(id.clone()).or_insert(0) += 1;
                }
            }
        }

        let mut candidates: Vec<(String, usize)> = matches
            .into_iter()
            .filter(|(_, count)| *count >= min_band_matches)
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        candidates.into_iter().map(|(id, _)| id).collect()
    }

    /// Per-dimension MinHash estimates of `plugin_id` against `query`, folded
    /// into a ranking-only overall score using the same dimension weights as
    /// exact similarity. Dimensions this index has no signature for
    /// (inheritance, interface, package, annotation, behavioral) contribute a
    /// fixed neutral constant rather than being computed. Returns `None` if
    /// `plugin_id` isn't in the index.
    pub fn estimate_similarity(&self, plugin_id: &str, query: &CodeDNA) -> Option<EstimatedSimilarity> {
        let stored = self.plugins.get(plugin_id)?;

        let query_class_sig = self.minhash.signature(&query.structure.class_hashes);
        let query_method_sig = self.minhash.signature(&query.api_footprint.method_signature_hashes);
        let query_ref_sig = self.minhash.signature(&query.api_footprint.external_references);

        let class_est = MinHash::estimate_similarity(&stored.class_hashes, &query_class_sig);
        let method_est =
            MinHash::estimate_similarity(&stored.method_signature_hashes, &query_method_sig);
        let ref_est =
            MinHash::estimate_similarity(&stored.external_references, &query_ref_sig);

        // Same weights as exact similarity; inheritance/interface/package
        // (structural) and annotations (api) fall back to NEUTRAL_FILL,
        // behavioral is entirely NEUTRAL_FILL since no pattern signature is
        // stored here.
        let structural_estimate = 0.4 * class_est + 0.6 * NEUTRAL_FILL;
        let api_estimate = 0.5 * ref_est + 0.3 * method_est + 0.2 * NEUTRAL_FILL;
        let behavioral_estimate = NEUTRAL_FILL;
        let overall = 0.4 * structural_estimate + 0.3 * api_estimate + 0.3 * behavioral_estimate;

        Some(EstimatedSimilarity {
            class_hashes: class_est,
            method_signature_hashes: method_est,
            external_references: ref_est,
            overall,
        })
    }

    pub fn stats(&self) -> IndexStats {
        let num_buckets = self.buckets.len();
        let sizes: Vec<usize> = self.buckets.values().map(BTreeSet::len).collect();
        let avg_bucket_size = if num_buckets == 0 {
            0.0
        } else {
            sizes.iter().sum::<usize>() as f64 / num_buckets as f64
        };
        let max_bucket_size = sizes.into_iter().max().unwrap_or(0);
        IndexStats {
            num_plugins: self.plugins.len(),
            num_buckets,
            avg_bucket_size,
            max_bucket_size,
        }
    }

    fn band_hash(&self, band: usize, signature: &[u64]) -> u64 {
        let start = band * self.rows_per_band;
        let rows = &signature[start..start + self.rows_per_band];
        let joined = rows.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
        codedna_hash::hash64(format!("{band}|{joined}"))
    }
}
