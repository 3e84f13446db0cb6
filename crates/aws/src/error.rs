use authtrail_core::DirectoryError;
use thiserror::Error;

/// Errors raised while setting up AWS-backed components.
#[derive(Debug, Error)]
pub enum AwsError {
    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Classify an AWS error into the appropriate [`DirectoryError`].
///
/// The service error code is checked first (Cognito exception names), then
/// the rendered message is inspected for common patterns (throttling,
/// timeout, connection).
pub fn classify_sdk_error(code: Option<&str>, message: &str) -> DirectoryError {
    match code {
        Some(
            "NotAuthorizedException"
            | "AccessDeniedException"
            | "UnrecognizedClientException"
            | "InvalidClientTokenId"
            | "ExpiredTokenException",
        ) => return DirectoryError::PermissionDenied(message.to_owned()),
        Some("ResourceNotFoundException" | "UserNotFoundException") => {
            return DirectoryError::NotFound(message.to_owned());
        }
        Some(
            "TooManyRequestsException"
            | "ThrottlingException"
            | "LimitExceededException"
            | "RequestLimitExceeded",
        ) => return DirectoryError::Throttled,
        Some("InternalErrorException" | "ServiceUnavailable" | "InternalFailure") => {
            return DirectoryError::Unavailable(message.to_owned());
        }
        _ => {}
    }

    let lower = message.to_lowercase();
    if lower.contains("throttl") || lower.contains("rate exceed") || lower.contains("too many") {
        DirectoryError::Throttled
    } else if lower.contains("timeout") || lower.contains("timed out") {
        DirectoryError::Timeout
    } else if lower.contains("connection")
        || lower.contains("connect")
        || lower.contains("dns")
        || lower.contains("network")
    {
        DirectoryError::Unavailable(message.to_owned())
    } else {
        DirectoryError::Service(message.to_owned())
    }
}
