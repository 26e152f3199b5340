#![forbid(unsafe_code)]

//! Aggregates many analyzed classes into one `CodeDNA`: a compact,
//! non-reversible, serializable fingerprint of a compiled plugin artifact.

mod builder;
mod error;
mod model;

pub use builder::{build_from_classes, build_from_entries};
pub use error::{FingerprintError, Result};
pub use model::{ApiFootprint, Behavioral, CodeDNA, Metadata, Structure};
