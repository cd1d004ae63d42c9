use thiserror::Error;

/// Failure reported by a storage backend.
///
/// Kept separate from [`BlobError`] so the service can wrap it without
/// losing the backend's own message or kind.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        match self {
            BackendError::NotFound(_) => true,
            BackendError::Io(error) => error.kind() == std::io::ErrorKind::NotFound,
            BackendError::ObjectStore(object_store::Error::NotFound { .. }) => true,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed data URI: {0}")]
    MalformedDataUri(String),

    #[error("Backend read failed for key {key}: {source}")]
    BackendRead {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("Backend write failed for key {key}: {source}")]
    BackendWrite {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("Backend delete failed for key {key}: {source}")]
    BackendDelete {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("Network error: {0}")]
    Network(String),
}

impl BlobError {
    /// The wrapped backend failure, if this error came from the backend.
    pub fn backend_source(&self) -> Option<&BackendError> {
        match self {
            BlobError::BackendRead { source, .. }
            | BlobError::BackendWrite { source, .. }
            | BlobError::BackendDelete { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.backend_source()
            .map(BackendError::is_not_found)
            .unwrap_or(false)
    }
}

pub type Result<T> = std::result::Result<T, BlobError>;
