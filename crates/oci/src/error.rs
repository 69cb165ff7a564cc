//! Error types for artifact pull operations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for artifact pull operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while pulling an artifact.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to parse the artifact reference.
    #[error("Invalid artifact reference '{0}': {1}")]
    InvalidReference(String, String),

    /// The destination is missing, empty or not a directory.
    #[error("Invalid output path '{}': {reason}", path.display())]
    InvalidDestination {
        /// The rejected path.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// Registry authentication failed.
    #[error("Authentication failed for registry '{0}': {1}")]
    AuthenticationFailed(String, String),

    /// The reference could not be resolved to a manifest.
    #[error("Failed to resolve artifact '{reference}': {message}")]
    ResolutionFailed {
        /// The reference being resolved.
        reference: String,
        /// Error message.
        message: String,
    },

    /// The manifest does not describe a pullable artifact.
    #[error("Invalid artifact manifest for '{reference}': {message}")]
    InvalidManifest {
        /// The reference whose manifest was rejected.
        reference: String,
        /// Error message.
        message: String,
    },

    /// Failed to pull blob from registry.
    #[error("Failed to pull blob {digest}: {message}")]
    BlobPullFailed {
        /// The blob digest.
        digest: String,
        /// Error message.
        message: String,
    },

    /// Digest mismatch after download.
    #[error("Digest mismatch for blob: expected {expected}, got {actual}")]
    DigestMismatch {
        /// The expected digest.
        expected: String,
        /// The computed digest.
        actual: String,
    },

    /// Failed to extract the artifact content.
    #[error("Failed to extract '{entry}': {message}")]
    ExtractionFailed {
        /// The archive entry or path involved.
        entry: String,
        /// Error message.
        message: String,
    },

    /// The caller-supplied deadline elapsed.
    #[error("Pull did not complete within {}s", .0.as_secs_f64())]
    DeadlineExceeded(Duration),

    /// The operation was cancelled before completion.
    #[error("Pull was cancelled")]
    Cancelled,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The reference could not be parsed.
    InvalidReference,
    /// The destination was rejected.
    InvalidDestination,
    /// Credentials could not be resolved or were refused.
    AuthenticationFailure,
    /// The reference did not resolve, or its manifest is unusable.
    ResolutionFailure,
    /// Fetching content from the registry failed.
    FetchFailure,
    /// Downloaded content did not match its declared digest.
    DigestMismatch,
    /// Content could not be written to the destination.
    ExtractionFailure,
    /// The deadline elapsed or the pull was cancelled.
    DeadlineExceeded,
}

impl Error {
    /// Create an invalid reference error.
    #[must_use]
    pub fn invalid_reference(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidReference(reference.into(), message.into())
    }

    /// Create an invalid destination error.
    #[must_use]
    pub fn invalid_destination(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidDestination {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an authentication error.
    #[must_use]
    pub fn authentication_failed(registry: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AuthenticationFailed(registry.into(), message.into())
    }

    /// Create a resolution error.
    #[must_use]
    pub fn resolution_failed(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Create an invalid manifest error.
    #[must_use]
    pub fn invalid_manifest(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Create an extraction failed error.
    #[must_use]
    pub fn extraction_failed(entry: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            entry: entry.into(),
            message: message.into(),
        }
    }

    /// Create a blob pull failed error.
    #[must_use]
    pub fn blob_pull_failed(digest: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BlobPullFailed {
            digest: digest.into(),
            message: message.into(),
        }
    }

    /// Create a digest mismatch error.
    #[must_use]
    pub fn digest_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::DigestMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Classify this error.
    ///
    /// Raw IO failures only reach callers from the write side of a pull,
    /// so they are reported as extraction failures.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidReference(..) => ErrorKind::InvalidReference,
            Self::InvalidDestination { .. } => ErrorKind::InvalidDestination,
            Self::AuthenticationFailed(..) => ErrorKind::AuthenticationFailure,
            Self::ResolutionFailed { .. } | Self::InvalidManifest { .. } | Self::Json(_) => {
                ErrorKind::ResolutionFailure
            }
            Self::BlobPullFailed { .. } => ErrorKind::FetchFailure,
            Self::DigestMismatch { .. } => ErrorKind::DigestMismatch,
            Self::ExtractionFailed { .. } | Self::Io(_) => ErrorKind::ExtractionFailure,
            Self::DeadlineExceeded(_) | Self::Cancelled => ErrorKind::DeadlineExceeded,
        }
    }
}
