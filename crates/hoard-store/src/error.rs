use hoard_types::ContentHash;

/// Errors from storage engine operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The identifier cannot name a shard: too short for the shard prefix,
    /// or carrying characters that would escape the store root.
    #[error("invalid hash {hash:?} for shard prefix length {shard_len}")]
    InvalidHash { hash: String, shard_len: usize },

    /// The client-supplied file name yields an unusable extension.
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    /// An object with this hash is already stored. Objects are never
    /// overwritten.
    #[error("object already stored: {0}")]
    DuplicateObject(ContentHash),

    /// No object with this hash is stored.
    #[error("object not found: {0}")]
    NotFound(ContentHash),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
