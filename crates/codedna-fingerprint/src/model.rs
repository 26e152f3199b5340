use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// The canonical fingerprint record for one artifact. Immutable once built,
/// safe to serialize, and never contains source text or otherwise reversible
/// data: every feature set here is a one-way hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeDNA {
    pub metadata: Metadata,
    pub structure: Structure,
    pub api_footprint: ApiFootprint,
    pub behavioral: Behavioral,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub artifact_name: String,
    pub version: Option<String>,
    pub timestamp_ms: u64,
    pub total_classes: usize,
    pub total_methods: usize,
    pub total_fields: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub class_hashes: BTreeSet<String>,
    pub package_structure: BTreeMap<String, u64>,
    pub inheritance_hashes: BTreeSet<String>,
    pub interface_hashes: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiFootprint {
    pub external_references: BTreeSet<String>,
    pub method_signature_hashes: BTreeSet<String>,
    pub annotation_hashes: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Behavioral {
    pub instruction_pattern_hashes: BTreeSet<String>,
    pub instruction_histograms: BTreeMap<String, BTreeMap<String, u64>>,
}

impl CodeDNA {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
