use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use codedna_classfile::{analyze_class, AnalyzerOptions, ClassInfo};
use regex::Regex;

use crate::error::{FingerprintError, Result};
use crate::model::{ApiFootprint, Behavioral, CodeDNA, Metadata, Structure};

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+\.\d+(\.\d+)?").expect("static regex is valid"))
}

/// Reads `(entry_name, bytes)` pairs from an archive, analyzes every
/// `.class` entry, and aggregates the results into one [`CodeDNA`].
///
/// Entries that don't end in `.class` are ignored. A class file that fails
/// to parse is logged as a non-fatal diagnostic and skipped; the fingerprint
/// is still built over the remaining classes. The artifact is only a hard
/// failure when zero class files were readable at all.
pub fn build_from_entries<I>(
    artifact_name: &str,
    entries: I,
    options: AnalyzerOptions,
) -> Result<CodeDNA>
where
    I: IntoIterator<Item = (String, Vec<u8>)>,
{
    let mut classes = Vec::new();
    for (name, bytes) in entries {
        if !name.ends_with(".class") {
            continue;
        }
        match analyze_class(&bytes, &options) {
            Ok(info) => classes.push(info),
            Err(err) => {
                tracing::warn!(
                    target = "codedna.fingerprint",
                    entry = %name,
                    error = %err,
                    "skipping unparseable class file"
                );
            }
        }
    }

    if classes.is_empty() {
        return Err(FingerprintError::UnsupportedArtifact {
            artifact_name: artifact_name.to_string(),
        });
    }

    let timestamp_ms = current_timestamp_ms();
    Ok(build_from_classes(artifact_name, &classes, timestamp_ms))
}

/// Aggregates already-analyzed classes into a [`CodeDNA`]. Pure given its
/// inputs (the caller supplies `timestamp_ms` so tests can pin it), which is
/// what makes determinism checks on the hashed feature sets possible.
pub fn build_from_classes(artifact_name: &str, classes: &[ClassInfo], timestamp_ms: u64) -> CodeDNA {
    let mut class_hashes = BTreeSet::new();
    let mut inheritance_hashes = BTreeSet::new();
    let mut interface_hashes = BTreeSet::new();
    let mut package_structure: BTreeMap<String, u64> = BTreeMap::new();
    let mut external_references = BTreeSet::new();
    let mut method_signature_hashes = BTreeSet::new();
    let mut annotation_hashes = BTreeSet::new();
    let mut instruction_pattern_hashes = BTreeSet::new();
    let mut instruction_histograms = BTreeMap::new();

    let mut total_methods = 0usize;
    let mut total_fields = 0usize;

    for class in classes {
        let super_or_empty = class.super_name.as_deref().unwrap_or("");
        let sorted_interfaces = class.interfaces.iter().cloned().collect::<BTreeSet<_>>();
        class_hashes.insert(codedna_hash::digest(format!(
            "{}|{}|{}",
            class.class_name,
            super_or_empty,
            sorted_interfaces.iter().cloned().collect::<Vec<_>>().join(",")
        )));

        if let Some(super_name) = &class.super_name {
            inheritance_hashes.insert(codedna_hash::digest(format!(
                "{}:extends:{}",
                class.class_name, super_name
            )));
        }

        for iface in &class.interfaces {
            interface_hashes.insert(codedna_hash::digest(format!(
                "{}:implements:{}",
                class.class_name, iface
            )));
        }

        *package_structure
            .entry(package_of(&class.class_name))
            .or_insert(0) += 1;

        for reference in &class.external_references {
            external_references.insert(codedna_hash::digest(reference));
        }
        for annotation in &class.annotations {
            annotation_hashes.insert(codedna_hash::digest(annotation));
        }

        total_fields += class.fields.len();
        total_methods += class.methods.len();
        for method in &class.methods {
            method_signature_hashes.insert(codedna_hash::digest(format!(
                "{}.{}",
                class.class_name, method.signature
            )));

            if let Some(pattern) = &method.instruction_pattern {
                instruction_pattern_hashes.insert(pattern.clone());
            }
            if let Some(histogram) = &method.instruction_histogram {
                let key = codedna_hash::digest(format!("{}.{}", class.class_name, method.signature));
                instruction_histograms.insert(key, histogram.clone());
            }
        }
    }

    let metadata = Metadata {
        artifact_name: artifact_name.to_string(),
        version: parse_version(artifact_name),
        timestamp_ms,
        total_classes: classes.len(),
        total_methods,
        total_fields,
    };

    let structure = Structure {
        class_hashes: class_hashes.clone(),
        package_structure,
        inheritance_hashes: inheritance_hashes.clone(),
        interface_hashes,
    };

    let api_footprint = ApiFootprint {
        external_references: external_references.clone(),
        method_signature_hashes: method_signature_hashes.clone(),
        annotation_hashes,
    };

    let behavioral = Behavioral {
        instruction_pattern_hashes: instruction_pattern_hashes.clone(),
        instruction_histograms,
    };

    let hash = overall_hash(
        &class_hashes,
        &inheritance_hashes,
        &external_references,
        &method_signature_hashes,
        &instruction_pattern_hashes,
    );

    CodeDNA {
        metadata,
        structure,
        api_footprint,
        behavioral,
        hash,
    }
}

fn overall_hash(
    class_hashes: &BTreeSet<String>,
    inheritance_hashes: &BTreeSet<String>,
    external_references: &BTreeSet<String>,
    method_signature_hashes: &BTreeSet<String>,
    instruction_pattern_hashes: &BTreeSet<String>,
) -> String {
    let parts = [
        sorted_join(class_hashes),
        sorted_join(inheritance_hashes),
        sorted_join(external_references),
        sorted_join(method_signature_hashes),
        sorted_join(instruction_pattern_hashes),
    ];
    codedna_hash::digest(parts.join("|"))
}

fn sorted_join(set: &BTreeSet<String>) -> String {
    // BTreeSet already iterates in sorted order.
    set.iter().cloned().collect::<Vec<_>>().join(",")
}

fn package_of(class_name: &str) -> String {
    match class_name.rfind('/') {
        Some(idx) => class_name[..idx].to_string(),
        None => String::new(),
    }
}

fn parse_version(artifact_name: &str) -> Option<String> {
    version_pattern()
        .find(artifact_name)
        .map(|m| m.as_str().to_string())
}

fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codedna_classfile::{FieldInfo, MethodInfo};

    fn class(name: &str, super_name: Option<&str>, interfaces: Vec<&str>) -> ClassInfo {
        ClassInfo {
            class_name: name.to_string(),
            super_name: super_name.map(str::to_string),
            interfaces: interfaces.into_iter().map(str::to_string).collect(),
            methods: vec![MethodInfo {
                name: "run".to_string(),
                descriptor: "()V".to_string(),
                access_flags: 0,
                signature: "run()V".to_string(),
                instruction_pattern: Some(codedna_hash::digest("EMPTY_METHOD")),
                instruction_histogram: Some(BTreeMap::from([(
                    codedna_hash::digest("<empty>"),
                    1,
                )])),
            }],
            fields: vec![FieldInfo {
                name: "x".to_string(),
                descriptor: "I".to_string(),
                access_flags: 0,
            }],
            annotations: vec![],
            external_references: BTreeSet::new(),
        }
    }

    #[test]
    fn determinism_same_input_produces_same_hash() {
        let classes = vec![class("a/b/C", Some("java/lang/Object"), vec!["java/io/Serializable"])];
        let dna1 = build_from_classes("plugin-1.0.0.jar", &classes, 0);
        let dna2 = build_from_classes("plugin-1.0.0.jar", &classes, 0);
        assert_eq!(dna1.hash, dna2.hash);
    }

    #[test]
    fn version_is_extracted_from_artifact_name() {
        let classes = vec![class("a/b/C", None, vec![])];
        let dna = build_from_classes("my-plugin-2.13.4-final.jar", &classes, 0);
        assert_eq!(dna.metadata.version.as_deref(), Some("2.13.4"));
    }

    #[test]
    fn version_is_none_when_no_match() {
        let classes = vec![class("a/b/C", None, vec![])];
        let dna = build_from_classes("no-version-here.jar", &classes, 0);
        assert_eq!(dna.metadata.version, None);
    }

    #[test]
    fn class_without_superclass_contributes_no_inheritance_hash() {
        let classes = vec![class("a/b/C", None, vec![])];
        let dna = build_from_classes("x", &classes, 0);
        assert!(dna.structure.inheritance_hashes.is_empty());
    }

    #[test]
    fn package_structure_counts_classes_per_package() {
        let classes = vec![
            class("a/b/C", None, vec![]),
            class("a/b/D", None, vec![]),
            class("c/E", None, vec![]),
        ];
        let dna = build_from_classes("x", &classes, 0);
        assert_eq!(dna.structure.package_structure.get("a/b"), Some(&2));
        assert_eq!(dna.structure.package_structure.get("c"), Some(&1));
    }

    #[test]
    fn reordering_classes_does_not_change_the_overall_hash() {
        let a = class("a/A", None, vec![]);
        let b = class("b/B", Some("java/lang/Object"), vec!["java/io/Serializable"]);
        let forward = build_from_classes("x", &[a.clone(), b.clone()], 0);
        let backward = build_from_classes("x", &[b, a], 0);
        assert_eq!(forward.hash, backward.hash);
    }
}
