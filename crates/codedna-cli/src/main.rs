use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use codedna_archive::Archive;
use codedna_classfile::{AnalyzerOptions, OpcodeMode};
use codedna_fingerprint::CodeDNA;
use codedna_index::LshIndex;
use codedna_similarity::{compute_churn, compute_similarity};

#[derive(Parser)]
#[command(name = "codedna", version, about = "Compute and compare CodeDNA fingerprints")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute a fingerprint for one artifact (JAR or exploded directory)
    Fingerprint(FingerprintArgs),
    /// Compare two fingerprints
    Compare(CompareArgs),
    /// Report version-to-version churn between two fingerprints
    Churn(ChurnArgs),
    /// Build an LSH index over every fingerprint in a directory
    BuildIndex(BuildIndexArgs),
    /// Search an index for the fingerprints most similar to a query
    Search(SearchArgs),
}

#[derive(Args)]
struct FingerprintArgs {
    /// Path to a JAR file or an exploded build directory
    artifact: PathBuf,
    /// Where to write the fingerprint JSON
    output: PathBuf,
    /// Emit multi-line, indented JSON
    #[arg(long)]
    pretty: bool,
    /// Use fuzzy opcode categories instead of exact opcode numbers
    #[arg(long)]
    fuzzy: bool,
}

#[derive(Args)]
struct CompareArgs {
    fp1: PathBuf,
    fp2: PathBuf,
    /// Also print detail counts behind the similarity numbers
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args)]
struct ChurnArgs {
    old: PathBuf,
    new: PathBuf,
}

#[derive(Args)]
struct BuildIndexArgs {
    /// Directory of fingerprint JSON files (see `fingerprint`)
    dir: PathBuf,
    /// Where to write the serialized index
    out: PathBuf,
}

#[derive(Args)]
struct SearchArgs {
    /// Fingerprint JSON of the query artifact
    query: PathBuf,
    /// Serialized index produced by `build-index`
    db: PathBuf,
    /// Minimum estimated overall similarity to report
    #[arg(short, long, default_value_t = 0.0)]
    threshold: f64,
    /// Maximum number of results to print
    #[arg(short, long, default_value_t = 10)]
    k: usize,
    /// Re-rank candidates with exact similarity instead of the LSH estimate
    #[arg(long)]
    exact: bool,
    /// Print per-dimension detail alongside the overall score
    #[arg(short, long)]
    verbose: bool,
}

/// A build-index output: the fingerprints an index was built from, so
/// `search` can re-hydrate `CodeDNA` for exact verification without a
/// separate fingerprint store.
#[derive(serde::Serialize, serde::Deserialize)]
struct IndexFile {
    fingerprints: Vec<CodeDNA>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Fingerprint(args) => fingerprint(args),
        Command::Compare(args) => compare(args),
        Command::Churn(args) => churn(args),
        Command::BuildIndex(args) => build_index(args),
        Command::Search(args) => search(args),
    }
}

fn fingerprint(args: FingerprintArgs) -> Result<i32> {
    let archive = Archive::new(&args.artifact);
    let entries = archive
        .class_entries()
        .with_context(|| format!("reading artifact {}", args.artifact.display()))?;

    let options = AnalyzerOptions {
        opcode_mode: if args.fuzzy { OpcodeMode::Fuzzy } else { OpcodeMode::Exact },
    };

    let artifact_name = args
        .artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.artifact.to_string_lossy().into_owned());

    let dna = codedna_fingerprint::build_from_entries(&artifact_name, entries, options)
        .with_context(|| format!("no readable class files in {}", args.artifact.display()))?;

    let json = if args.pretty { dna.to_json_pretty()? } else { dna.to_json()? };
    std::fs::write(&args.output, json)
        .with_context(|| format!("writing {}", args.output.display()))?;

    tracing::info!(
        target = "codedna.cli",
        classes = dna.metadata.total_classes,
        "wrote fingerprint to {}",
        args.output.display()
    );
    Ok(0)
}

fn compare(args: CompareArgs) -> Result<i32> {
    let a = read_dna(&args.fp1)?;
    let b = read_dna(&args.fp2)?;
    let score = compute_similarity(&a, &b);

    println!("structural: {:.4}", score.structural);
    println!("api:        {:.4}", score.api);
    println!("behavioral: {:.4}", score.behavioral);
    println!("overall:    {:.4}", score.overall);

    if args.verbose {
        println!(
            "class_hashes:             {}/{} (a) {}/{} (b)",
            score.detail.common_class_hashes,
            score.detail.total_class_hashes_a,
            score.detail.common_class_hashes,
            score.detail.total_class_hashes_b
        );
        println!(
            "external_references:      {}/{} (a) {}/{} (b)",
            score.detail.common_external_references,
            score.detail.total_external_references_a,
            score.detail.common_external_references,
            score.detail.total_external_references_b
        );
        println!(
            "method_signature_hashes:  {}/{} (a) {}/{} (b)",
            score.detail.common_method_signature_hashes,
            score.detail.total_method_signature_hashes_a,
            score.detail.common_method_signature_hashes,
            score.detail.total_method_signature_hashes_b
        );
    }
    Ok(0)
}

fn churn(args: ChurnArgs) -> Result<i32> {
    let old = read_dna(&args.old)?;
    let new = read_dna(&args.new)?;
    let metrics = compute_churn(&old, &new);

    println!("added_classes:        {}", metrics.added_classes);
    println!("removed_classes:      {}", metrics.removed_classes);
    println!("unchanged_classes:    {}", metrics.unchanged_classes);
    println!("added_methods:        {}", metrics.added_methods);
    println!("removed_methods:      {}", metrics.removed_methods);
    println!("added_api_references: {}", metrics.added_api_references);
    println!("removed_api_references: {}", metrics.removed_api_references);
    println!("churn_percentage:     {:.2}%", metrics.churn_percentage);
    Ok(0)
}

fn build_index(args: BuildIndexArgs) -> Result<i32> {
    let mut index = LshIndex::with_defaults();
    let mut fingerprints = Vec::new();

    for entry in walkdir::WalkDir::new(&args.dir).into_iter().filter_map(std::result::Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let dna = read_dna(entry.path())
            .with_context(|| format!("reading fingerprint {}", entry.path().display()))?;
        index.add(&dna);
        fingerprints.push(dna);
    }

    if fingerprints.is_empty() {
        bail!("no fingerprint JSON files found under {}", args.dir.display());
    }

    let file = IndexFile { fingerprints };
    let json = serde_json::to_string(&file)?;
    std::fs::write(&args.out, json).with_context(|| format!("writing {}", args.out.display()))?;

    let stats = index.stats();
    tracing::info!(
        target = "codedna.cli",
        num_plugins = stats.num_plugins,
        num_buckets = stats.num_buckets,
        "built index"
    );
    Ok(0)
}

fn search(args: SearchArgs) -> Result<i32> {
    let query = read_dna(&args.query)?;
    let file = read_index_file(&args.db)?;

    let mut index = LshIndex::with_defaults();
    for dna in &file.fingerprints {
        index.add(dna);
    }
    let by_hash: std::collections::HashMap<&str, &CodeDNA> =
        file.fingerprints.iter().map(|dna| (dna.hash.as_str(), dna)).collect();

    let candidates = index.find_candidates(&query, 1);

    let mut results: Vec<(String, f64)> = Vec::new();
    for id in candidates {
        let overall = if args.exact {
            by_hash.get(id.as_str()).map(|dna| compute_similarity(&query, dna).overall)
        } else {
            index.estimate_similarity(&id, &query).map(|est| est.overall)
        };
        if let Some(overall) = overall {
            if overall >= args.threshold {
                results.push((id, overall));
            }
        }
    }
    results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(args.k);

    for (id, overall) in &results {
        let name = by_hash.get(id.as_str()).map(|dna| dna.metadata.artifact_name.as_str()).unwrap_or(id);
        if args.verbose {
            println!("{overall:.4}  {id}  {name}");
        } else {
            println!("{overall:.4}  {name}");
        }
    }
    Ok(0)
}

fn read_dna(path: &Path) -> Result<CodeDNA> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    CodeDNA::from_json(&text).with_context(|| format!("parsing fingerprint {}", path.display()))
}

fn read_index_file(path: &Path) -> Result<IndexFile> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing index {}", path.display()))
}
