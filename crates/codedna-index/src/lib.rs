#![forbid(unsafe_code)]

//! MinHash signatures and banded LSH retrieval over [`codedna_fingerprint::CodeDNA`].
//!
//! Exact pairwise comparison doesn't scale to a large corpus; this crate
//! trades precision for sub-linear candidate retrieval. Candidates returned
//! here should be re-verified with `codedna_similarity::compute_similarity`
//! before being reported as an authoritative score.

mod error;
mod lsh;
mod minhash;

pub use error::{IndexError, Result};
pub use lsh::{EstimatedSimilarity, IndexStats, LshIndex, DEFAULT_BANDS, DEFAULT_K};
pub use minhash::{MinHash, DEFAULT_NUM_HASHES, DEFAULT_SEED};
