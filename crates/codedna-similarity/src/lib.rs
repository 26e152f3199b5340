#![forbid(unsafe_code)]

//! Three-dimensional similarity and version-churn comparison between two
//! `CodeDNA` fingerprints.

use std::collections::{BTreeMap, BTreeSet};

use codedna_fingerprint::CodeDNA;
use serde::{Deserialize, Serialize};

/// Weighted similarity across the structural, API, and behavioral
/// dimensions, plus the detail counts used to explain a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    pub structural: f64,
    pub api: f64,
    pub behavioral: f64,
    pub overall: f64,
    pub detail: DetailCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailCounts {
    pub common_class_hashes: usize,
    pub total_class_hashes_a: usize,
    pub total_class_hashes_b: usize,
    pub common_external_references: usize,
    pub total_external_references_a: usize,
    pub total_external_references_b: usize,
    pub common_method_signature_hashes: usize,
    pub total_method_signature_hashes_a: usize,
    pub total_method_signature_hashes_b: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChurnMetrics {
    pub added_classes: usize,
    pub removed_classes: usize,
    pub unchanged_classes: usize,
    pub added_methods: usize,
    pub removed_methods: usize,
    pub added_api_references: usize,
    pub removed_api_references: usize,
    pub churn_percentage: f64,
}

/// Computes the weighted three-dimensional similarity between two
/// fingerprints. Total: every well-formed pair of `CodeDNA` produces a
/// defined score, including the empty-set conventions below.
#[must_use]
pub fn compute_similarity(a: &CodeDNA, b: &CodeDNA) -> SimilarityScore {
    let structural = 0.4 * jaccard(&a.structure.class_hashes, &b.structure.class_hashes)
        + 0.2 * jaccard(&a.structure.inheritance_hashes, &b.structure.inheritance_hashes)
        + 0.2 * jaccard(&a.structure.interface_hashes, &b.structure.interface_hashes)
        + 0.2 * cosine(&a.structure.package_structure, &b.structure.package_structure);

    let api = 0.5 * jaccard(&a.api_footprint.external_references, &b.api_footprint.external_references)
        + 0.3
            * jaccard(
                &a.api_footprint.method_signature_hashes,
                &b.api_footprint.method_signature_hashes,
            )
        + 0.2 * jaccard(&a.api_footprint.annotation_hashes, &b.api_footprint.annotation_hashes);

    let behavioral = behavioral_similarity(a, b);

    let overall = 0.4 * structural + 0.3 * api + 0.3 * behavioral;

    let detail = DetailCounts {
        common_class_hashes: intersection_count(&a.structure.class_hashes, &b.structure.class_hashes),
        total_class_hashes_a: a.structure.class_hashes.len(),
        total_class_hashes_b: b.structure.class_hashes.len(),
        common_external_references: intersection_count(
            &a.api_footprint.external_references,
            &b.api_footprint.external_references,
        ),
        total_external_references_a: a.api_footprint.external_references.len(),
        total_external_references_b: b.api_footprint.external_references.len(),
        common_method_signature_hashes: intersection_count(
            &a.api_footprint.method_signature_hashes,
            &b.api_footprint.method_signature_hashes,
        ),
        total_method_signature_hashes_a: a.api_footprint.method_signature_hashes.len(),
        total_method_signature_hashes_b: b.api_footprint.method_signature_hashes.len(),
    };

    SimilarityScore {
        structural,
        api,
        behavioral,
        overall,
        detail,
    }
}

fn behavioral_similarity(a: &CodeDNA, b: &CodeDNA) -> f64 {
    let a_patterns = &a.behavioral.instruction_pattern_hashes;
    let b_patterns = &b.behavioral.instruction_pattern_hashes;

    if a_patterns.is_empty() && b_patterns.is_empty() {
        return 0.5;
    }
    if a_patterns.is_empty() || b_patterns.is_empty() {
        return 0.1;
    }

    let p = jaccard(a_patterns, b_patterns);
    let h = histogram_similarity(a, b);
    let raw = 0.7 * p + 0.3 * h;
    raw * complexity_factor(a, b)
}

/// Aggregates both sides' per-method histograms, compares the aggregates by
/// cosine similarity, and scales by the method-count size-disparity penalty.
fn histogram_similarity(a: &CodeDNA, b: &CodeDNA) -> f64 {
    let agg_a = aggregate_histograms(&a.behavioral.instruction_histograms);
    let agg_b = aggregate_histograms(&b.behavioral.instruction_histograms);
    if agg_a.is_empty() || agg_b.is_empty() {
        return 0.0;
    }

    let n_a = a.behavioral.instruction_histograms.len();
    let n_b = b.behavioral.instruction_histograms.len();
    let penalty = n_a.min(n_b) as f64 / n_a.max(n_b) as f64;

    cosine(&agg_a, &agg_b) * penalty
}

fn aggregate_histograms(histograms: &BTreeMap<String, BTreeMap<String, u64>>) -> BTreeMap<String, u64> {
    let mut total: BTreeMap<String, u64> = BTreeMap::new();
    for histogram in histograms.values() {
        for (token, count) in histogram {
            *total.entry(token.clone()).or_insert(0) += count;
        }
    }
    total
}

/// `s` is the mean, over both sides, of the per-method average instruction
/// count (summed histogram values). `kappa` is read off the table keyed by
/// `s`; a side with no histograms forces `kappa = 1.0`.
fn complexity_factor(a: &CodeDNA, b: &CodeDNA) -> f64 {
    if a.behavioral.instruction_histograms.is_empty() || b.behavioral.instruction_histograms.is_empty() {
        return 1.0;
    }

    let s = (mean_method_length(&a.behavioral.instruction_histograms)
        + mean_method_length(&b.behavioral.instruction_histograms))
        / 2.0;

    if s < 3.0 {
        0.3
    } else if s < 5.0 {
        0.5
    } else if s < 10.0 {
        0.7
    } else if s < 20.0 {
        0.9
    } else {
        1.0
    }
}

fn mean_method_length(histograms: &BTreeMap<String, BTreeMap<String, u64>>) -> f64 {
    if histograms.is_empty() {
        return 0.0;
    }
    let total: u64 = histograms
        .values()
        .map(|histogram| histogram.values().sum::<u64>())
        .sum();
    total as f64 / histograms.len() as f64
}

/// Reports what changed between two successive fingerprints of the same
/// artifact.
#[must_use]
pub fn compute_churn(old: &CodeDNA, new: &CodeDNA) -> ChurnMetrics {
    let added_classes = difference_count(&new.structure.class_hashes, &old.structure.class_hashes);
    let removed_classes = difference_count(&old.structure.class_hashes, &new.structure.class_hashes);
    let unchanged_classes = intersection_count(&old.structure.class_hashes, &new.structure.class_hashes);

    let added_methods = difference_count(
        &new.api_footprint.method_signature_hashes,
        &old.api_footprint.method_signature_hashes,
    );
    let removed_methods = difference_count(
        &old.api_footprint.method_signature_hashes,
        &new.api_footprint.method_signature_hashes,
    );

    let added_api_references = difference_count(
        &new.api_footprint.external_references,
        &old.api_footprint.external_references,
    );
    let removed_api_references = difference_count(
        &old.api_footprint.external_references,
        &new.api_footprint.external_references,
    );

    let denominator =
        old.structure.class_hashes.len() + old.api_footprint.method_signature_hashes.len();
    let churn_percentage = if denominator == 0 {
        100.0
    } else {
        (added_classes + removed_classes + added_methods + removed_methods) as f64
            / denominator as f64
            * 100.0
    };

    ChurnMetrics {
        added_classes,
        removed_classes,
        unchanged_classes,
        added_methods,
        removed_methods,
        added_api_references,
        removed_api_references,
        churn_percentage,
    }
}

/// `|X ∩ Y| / |X ∪ Y|`, with `J(∅, ∅) = 1` and `J(X, ∅) = J(∅, X) = 0` for
/// non-empty `X`.
fn jaccard(x: &BTreeSet<String>, y: &BTreeSet<String>) -> f64 {
    if x.is_empty() && y.is_empty() {
        return 1.0;
    }
    if x.is_empty() || y.is_empty() {
        return 0.0;
    }
    let intersection = intersection_count(x, y);
    let union = x.len() + y.len() - intersection;
    intersection as f64 / union as f64
}

/// Cosine similarity over two count-valued maps, with `C(∅, ∅) = 1` and
/// `C(·, ∅) = 0` otherwise.
fn cosine<K: Ord>(p: &BTreeMap<K, u64>, q: &BTreeMap<K, u64>) -> f64 {
    if p.is_empty() && q.is_empty() {
        return 1.0;
    }
    if p.is_empty() || q.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    for (key, pv) in p {
        if let Some(qv) = q.get(key) {
            dot += (*pv as f64) * (*qv as f64);
        }
    }
    let norm_p = (p.values().map(|v| (*v as f64).powi(2)).sum::<f64>()).sqrt();
    let norm_q = (q.values().map(|v| (*v as f64).powi(2)).sum::<f64>()).sqrt();
    if norm_p == 0.0 || norm_q == 0.0 {
        return 0.0;
    }
    dot / (norm_p * norm_q)
}

fn intersection_count(x: &BTreeSet<String>, y: &BTreeSet<String>) -> usize {
    x.intersection(y).count()
}

fn difference_count(x: &BTreeSet<String>, y: &BTreeSet<String>) -> usize {
    x.difference(y).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codedna_fingerprint::{ApiFootprint, Behavioral, Metadata, Structure};

    fn empty_dna(name: &str) -> CodeDNA {
        CodeDNA {
            metadata: Metadata {
                artifact_name: name.to_string(),
                version: None,
                timestamp_ms: 0,
                total_classes: 0,
                total_methods: 0,
                total_fields: 0,
            },
            structure: Structure::default(),
            api_footprint: ApiFootprint::default(),
            behavioral: Behavioral::default(),
            hash: "empty".to_string(),
        }
    }

    fn with_classes(mut dna: CodeDNA, classes: &[&str]) -> CodeDNA {
        dna.structure.class_hashes = classes.iter().map(|c| c.to_string()).collect();
        dna
    }

    #[test]
    fn reflexivity_self_similarity_is_high() {
        let a = with_classes(empty_dna("a"), &["h1", "h2"]);
        let score = compute_similarity(&a, &a);
        assert_eq!(score.structural, 1.0);
        assert_eq!(score.api, 1.0);
        assert!(score.overall >= 0.7);
    }

    #[test]
    fn neutral_behavioral_score_when_both_sides_lack_patterns() {
        let a = empty_dna("a");
        let b = empty_dna("b");
        let score = compute_similarity(&a, &b);
        assert_eq!(score.behavioral, 0.5);
    }

    #[test]
    fn one_sided_patterns_score_low_behavioral() {
        let a = empty_dna("a");
        let mut b = empty_dna("b");
        b.behavioral.instruction_pattern_hashes.insert("p1".to_string());
        let score = compute_similarity(&a, &b);
        assert_eq!(score.behavioral, 0.1);
    }

    #[test]
    fn symmetry_holds() {
        let a = with_classes(empty_dna("a"), &["h1", "h2", "h3"]);
        let b = with_classes(empty_dna("b"), &["h2", "h3", "h4"]);
        let ab = compute_similarity(&a, &b);
        let ba = compute_similarity(&b, &a);
        assert_eq!(ab.overall, ba.overall);
        assert_eq!(ab.structural, ba.structural);
    }

    #[test]
    fn jaccard_set_conventions() {
        let empty: BTreeSet<String> = BTreeSet::new();
        let non_empty: BTreeSet<String> = ["a".to_string()].into_iter().collect();
        assert_eq!(jaccard(&empty, &empty), 1.0);
        assert_eq!(jaccard(&empty, &non_empty), 0.0);
        assert_eq!(jaccard(&non_empty, &empty), 0.0);
    }

    #[test]
    fn churn_identity_is_zero() {
        let a = with_classes(empty_dna("a"), &["h1", "h2"]);
        let churn = compute_churn(&a, &a);
        assert_eq!(churn.churn_percentage, 0.0);
        assert_eq!(churn.added_classes, 0);
        assert_eq!(churn.removed_classes, 0);
    }

    #[test]
    fn churn_totality_when_both_sides_empty() {
        let a = empty_dna("a");
        let b = empty_dna("b");
        let churn = compute_churn(&a, &b);
        assert_eq!(churn.churn_percentage, 100.0);
    }

    #[test]
    fn churn_tracks_added_and_removed_classes() {
        let old = with_classes(empty_dna("old"), &["A", "B", "C", "D"]);
        let new = with_classes(empty_dna("new"), &["A", "B", "C", "E"]);
        let churn = compute_churn(&old, &new);
        assert_eq!(churn.added_classes, 1);
        assert_eq!(churn.removed_classes, 1);
        assert_eq!(churn.unchanged_classes, 3);
    }
}
