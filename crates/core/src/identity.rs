use serde::{Deserialize, Serialize};

use crate::types::{SubjectId, Username};

/// Directory attribute that holds the subject identifier.
pub const SUBJECT_ATTRIBUTE: &str = "sub";

/// An identity returned by a directory prefix lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: Username,

    /// Subject attribute, when the directory returned it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<SubjectId>,
}

impl Identity {
    pub fn new(username: impl Into<Username>) -> Self {
        Self {
            username: username.into(),
            subject_id: None,
        }
    }

    #[must_use]
    pub fn with_subject_id(mut self, subject_id: impl Into<SubjectId>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }
}

/// One historical authentication attempt, kept exactly as the directory
/// described it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthHistoryEntry(pub serde_json::Value);

impl AuthHistoryEntry {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Build the prefix filter matching every identity whose subject starts with
/// `subject`, e.g. `sub^="abc123"`.
///
/// Quotes and backslashes in the value are escaped so the value cannot
/// terminate the quoted literal.
pub fn prefix_filter(subject: &SubjectId) -> String {
    let mut escaped = String::with_capacity(subject.len());
    for c in subject.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("{SUBJECT_ATTRIBUTE}^=\"{escaped}\"")
}

/// Recover the subject prefix from a filter built by [`prefix_filter`].
///
/// Returns `None` for any other filter expression.
pub fn parse_prefix_filter(filter: &str) -> Option<String> {
    let quoted = filter
        .strip_prefix(SUBJECT_ATTRIBUTE)?
        .strip_prefix("^=\"")?
        .strip_suffix('"')?;

    let mut value = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            value.push(chars.next()?);
        } else if c == '"' {
            return None;
        } else {
            value.push(c);
        }
    }
    Some(value)
}
