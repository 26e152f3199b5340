use assert_cmd::Command;
use predicates::prelude::*;

fn codedna() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("codedna"))
}

fn write_fingerprint(dir: &std::path::Path, name: &str, class_hashes: &[&str]) -> std::path::PathBuf {
    let path = dir.join(name);
    let hashes: Vec<String> = class_hashes.iter().map(|h| format!("\"{h}\"")).collect();
    let json = format!(
        r#"{{
  "metadata": {{
    "artifact_name": "{name}",
    "version": null,
    "timestamp_ms": 0,
    "total_classes": {count},
    "total_methods": 0,
    "total_fields": 0
  }},
  "structure": {{
    "class_hashes": [{hashes}],
    "package_structure": {{}},
    "inheritance_hashes": [],
    "interface_hashes": []
  }},
  "api_footprint": {{
    "external_references": [],
    "method_signature_hashes": [],
    "annotation_hashes": []
  }},
  "behavioral": {{
    "instruction_pattern_hashes": [],
    "instruction_histograms": {{}}
  }},
  "hash": "{name}-hash"
}}"#,
        count = class_hashes.len(),
        hashes = hashes.join(",")
    );
    std::fs::write(&path, json).unwrap();
    path
}

#[test]
fn help_mentions_core_commands() {
    codedna()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("fingerprint")
                .and(predicate::str::contains("compare"))
                .and(predicate::str::contains("churn"))
                .and(predicate::str::contains("build-index"))
                .and(predicate::str::contains("search")),
        );
}

#[test]
fn compare_prints_reflexive_similarity() {
    let dir = tempfile::tempdir().unwrap();
    let fp = write_fingerprint(dir.path(), "a.json", &["h1", "h2"]);

    codedna()
        .arg("compare")
        .arg(&fp)
        .arg(&fp)
        .assert()
        .success()
        .stdout(predicate::str::contains("structural: 1.0000"));
}

#[test]
fn churn_reports_identity_for_identical_fingerprints() {
    let dir = tempfile::tempdir().unwrap();
    let fp = write_fingerprint(dir.path(), "a.json", &["h1", "h2", "h3"]);

    codedna()
        .arg("churn")
        .arg(&fp)
        .arg(&fp)
        .assert()
        .success()
        .stdout(predicate::str::contains("churn_percentage:     0.00%"));
}

#[test]
fn build_index_and_search_find_the_query_itself() {
    let fixtures = tempfile::tempdir().unwrap();
    write_fingerprint(fixtures.path(), "a.json", &["h1", "h2", "h3"]);
    write_fingerprint(fixtures.path(), "b.json", &["h9", "h10"]);

    let out_dir = tempfile::tempdir().unwrap();
    let index_path = out_dir.path().join("index.json");

    codedna()
        .arg("build-index")
        .arg(fixtures.path())
        .arg(&index_path)
        .assert()
        .success();
    assert!(index_path.exists());

    let query = write_fingerprint(fixtures.path(), "query.json", &["h1", "h2", "h3"]);
    codedna()
        .arg("search")
        .arg(&query)
        .arg(&index_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("a.json"));
}
