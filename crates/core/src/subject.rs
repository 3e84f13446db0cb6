//! Subject extraction from CloudTrail authentication events.
//!
//! Only `detail.additionalEventData.sub` is read. Every other field of the
//! event is ignored, present or not.

use serde_json::Value;
use thiserror::Error;

use crate::types::SubjectId;

/// JSON pointer to the subject inside a decoded event.
pub const SUBJECT_POINTER: &str = "/detail/additionalEventData/sub";

/// Reasons an envelope body does not yield a subject.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// The body is not valid JSON.
    #[error("body is not valid JSON: {0}")]
    InvalidJson(String),

    /// `detail.additionalEventData.sub` is absent.
    #[error("missing detail.additionalEventData.sub")]
    MissingSubject,

    /// The subject is present but is not a JSON string.
    #[error("detail.additionalEventData.sub is not a string")]
    SubjectNotString,

    /// The subject is an empty string.
    #[error("detail.additionalEventData.sub is empty")]
    EmptySubject,
}

/// Decode an envelope body and extract its subject identifier.
pub fn extract_subject(body: &str) -> Result<SubjectId, PayloadError> {
    let event: Value =
        serde_json::from_str(body).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;

    let sub = event
        .pointer(SUBJECT_POINTER)
        .ok_or(PayloadError::MissingSubject)?
        .as_str()
        .ok_or(PayloadError::SubjectNotString)?;

    if sub.is_empty() {
        return Err(PayloadError::EmptySubject);
    }
    Ok(SubjectId::new(sub))
}
