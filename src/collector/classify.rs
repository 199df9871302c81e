//! Error classification for retry decisions.
//!
//! Every provider error is reduced to a machine-readable code and mapped to a
//! closed [`ErrorClass`] in one place, instead of comparing code strings at
//! each call site.

use std::collections::HashSet;

/// Provider error codes that signal throttling.
pub const THROTTLING_CODES: [&str; 3] = [
    "ThrottlingException",
    "ThrottledException",
    "TooManyRequestsException",
];

/// Errors returned by external API calls.
///
/// Implementors expose the provider's structured error code, if the error
/// carries one.
pub trait ApiError: std::error::Error + Send + Sync + 'static {
    /// Machine-readable error code (e.g. `ThrottlingException`).
    fn code(&self) -> Option<&str>;
}

/// How the retry executor treats an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Provider-side rate limiting: reduce rate, pause, back off, retry
    Throttled,
    /// Anything else: back off and retry
    Transient,
    /// Registered as non-retryable: fail immediately
    Fatal,
}

/// Maps error codes to [`ErrorClass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassifier {
    throttling: HashSet<String>,
    fatal: HashSet<String>,
}

impl ErrorClassifier {
    /// Build a classifier from explicit throttling and fatal code sets.
    pub fn new<T, F>(throttling: T, fatal: F) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            throttling: throttling.into_iter().map(Into::into).collect(),
            fatal: fatal.into_iter().map(Into::into).collect(),
        }
    }

    /// Register an additional non-retryable code.
    pub fn with_fatal_code(mut self, code: impl Into<String>) -> Self {
        self.fatal.insert(code.into());
        self
    }

    /// Classify an error code. Errors without a code are transient.
    pub fn classify(&self, code: Option<&str>) -> ErrorClass {
        match code {
            Some(code) if self.throttling.contains(code) => ErrorClass::Throttled,
            Some(code) if self.fatal.contains(code) => ErrorClass::Fatal,
            _ => ErrorClass::Transient,
        }
    }

    /// Classify an [`ApiError`].
    pub fn classify_error<E: ApiError + ?Sized>(&self, err: &E) -> ErrorClass {
        self.classify(err.code())
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(THROTTLING_CODES, std::iter::empty::<String>())
    }
}

/// Plain coded error, for providers without an SDK error type and for tests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ServiceError {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ServiceError {
    /// Create a coded error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Standard throttling error.
    pub fn throttled() -> Self {
        Self::new("ThrottlingException", "Rate exceeded")
    }
}

impl ApiError for ServiceError {
    fn code(&self) -> Option<&str> {
        Some(&self.code)
    }
}
