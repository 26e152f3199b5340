use thiserror::Error;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("artifact {artifact_name} has no readable class files")]
    UnsupportedArtifact { artifact_name: String },
}

pub type Result<T> = std::result::Result<T, FingerprintError>;
