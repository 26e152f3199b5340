#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("number of hashes ({k}) is not evenly divisible by band count ({b})")]
    BandConfig { k: usize, b: usize },
}

pub type Result<T> = std::result::Result<T, IndexError>;
