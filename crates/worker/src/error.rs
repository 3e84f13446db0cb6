use authtrail_aws::AwsError;
use authtrail_core::{DirectoryError, ResolverError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur when running the worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A batch failed; the caller should treat it as not processed.
    #[error("batch failed: {0}")]
    Resolver(#[from] ResolverError),

    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("aws setup error: {0}")]
    Aws(#[from] AwsError),

    /// The replay input could not be parsed as a batch document.
    #[error("invalid batch document: {0}")]
    Event(#[from] serde_json::Error),
}
