//! Collector error type

use std::error::Error as StdError;

/// Boxed error used to carry underlying provider and sink failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type for collector operations
pub type CollectResult<T> = Result<T, CollectError>;

/// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The run was cancelled while waiting on the limiter, a backoff or a pause
    #[error("operation cancelled")]
    Cancelled,

    /// Every attempt failed; carries the last underlying error
    #[error("max retries reached after {attempts} attempts: {source}")]
    MaxRetriesReached {
        /// Number of attempts made (max_retries + 1)
        attempts: u32,
        /// Error returned by the final attempt
        #[source]
        source: BoxError,
    },

    /// Error classified as non-retryable
    #[error("non-retryable error: {0}")]
    Fatal(#[source] BoxError),

    /// Listing kept returning cursors past the configured page cap
    #[error("pagination exceeded {max_pages} pages without a terminal cursor")]
    PageLimitExceeded {
        /// Configured page cap
        max_pages: usize,
    },

    /// Streaming sink rejected a resource
    #[error("sink rejected resource: {0}")]
    Sink(#[source] BoxError),

    /// A work item's enrichment function panicked
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    /// Enrichment or mapping of an item failed outside the retry executor
    #[error("describe failed: {0}")]
    Describe(#[source] BoxError),

    /// Configuration error
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CollectError {
    /// Wrap an arbitrary error as a describe failure.
    pub fn describe<E: Into<BoxError>>(err: E) -> Self {
        Self::Describe(err.into())
    }

    /// Wrap an arbitrary error as a sink failure.
    pub fn sink<E: Into<BoxError>>(err: E) -> Self {
        Self::Sink(err.into())
    }

    /// Whether this error stems from cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Underlying error carried by this error, if any.
    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::MaxRetriesReached { source, .. } => Some(source.as_ref()),
            Self::Fatal(source) | Self::Sink(source) | Self::Describe(source) => {
                Some(source.as_ref())
            }
            _ => None,
        }
    }

    /// Downcast the underlying error to a concrete type.
    pub fn downcast_inner<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner().and_then(|e| e.downcast_ref::<E>())
    }
}
