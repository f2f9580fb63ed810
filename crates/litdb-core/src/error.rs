use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot build an index from an empty corpus")]
    EmptyCorpus,

    #[error("duplicate file_path in corpus: {0}")]
    DuplicateFilePath(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index has not been built or loaded")]
    IndexNotBuilt,

    #[error("snapshot corrupt: {0}")]
    SnapshotCorrupt(String),

    #[error("cache I/O failed: {0}")]
    CacheIo(String),

    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("lexical index failed: {0}")]
    Lexical(String),

    #[error("reasoner failed: {0}")]
    Reasoner(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Only provider outages are worth another attempt; everything else is
    /// structural and will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ProviderUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
