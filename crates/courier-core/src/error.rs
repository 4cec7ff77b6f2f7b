use thiserror::Error;

/// Failure reported by a [`Store`](crate::ports::Store) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("store is closed")]
    Closed,
}

impl StoreError {
    pub fn backend(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend {
            source: source.into(),
        }
    }
}

/// Errors surfaced by the queue client and its loops.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The message could not be encoded to text. Caller contract violation.
    #[error("message encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("a default queue is already installed")]
    AlreadyInstalled,
}
