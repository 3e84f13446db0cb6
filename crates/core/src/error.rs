use std::fmt;

use thiserror::Error;

use crate::subject::PayloadError;

/// Errors reported by an identity directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The directory could not be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// The caller is not allowed to perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The pool or identity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The directory rejected the request due to rate limiting.
    #[error("directory request throttled")]
    Throttled,

    /// The request timed out.
    #[error("directory request timed out")]
    Timeout,

    /// The directory answered with something that cannot be used.
    #[error("invalid directory response: {0}")]
    InvalidResponse(String),

    /// Any other service-side failure.
    #[error("directory service error: {0}")]
    Service(String),
}

impl DirectoryError {
    /// Returns `true` if the error is transient and the operation may succeed
    /// on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Throttled | Self::Timeout)
    }
}

/// Errors reported by a batch source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("failed to receive batch: {0}")]
    Receive(String),

    #[error("failed to acknowledge batch: {0}")]
    Acknowledge(String),
}

/// Coarse classification of a [`ResolverError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An envelope did not yield a subject.
    MalformedPayload,
    /// A directory call failed.
    Directory,
    /// The resolver was built with invalid settings.
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MalformedPayload => "malformed_payload",
            Self::Directory => "directory_error",
            Self::Configuration => "configuration",
        };
        f.write_str(s)
    }
}

/// Errors that fail a whole batch.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The batch contained no envelopes.
    #[error("batch contains no records")]
    EmptyBatch,

    /// An envelope body did not yield a subject.
    #[error("malformed payload in record {index}{}: {source}", message_suffix(.message_id))]
    MalformedPayload {
        /// Position of the envelope in the batch.
        index: usize,
        /// Queue message id, when known.
        message_id: Option<String>,
        #[source]
        source: PayloadError,
    },

    /// A directory call failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Invalid resolver settings.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

fn message_suffix(message_id: &Option<String>) -> String {
    message_id
        .as_deref()
        .map(|id| format!(" ({id})"))
        .unwrap_or_default()
}

impl ResolverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyBatch | Self::MalformedPayload { .. } => ErrorKind::MalformedPayload,
            Self::Directory(_) => ErrorKind::Directory,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Whether the batch should go back to the queue for another delivery.
    ///
    /// Payload and directory failures fail the whole batch and leave it for
    /// redelivery; configuration errors are never fixed by redelivering.
    pub fn should_redeliver(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Configuration)
    }

    /// Whether a redelivery can succeed without any change: the directory
    /// was unreachable, throttled or timed out.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Directory(e) if e.is_retryable())
    }
}
