use serde::{Deserialize, Serialize};

/// One message of an incoming batch.
///
/// Only `body` is read by the resolver. The queue identifiers are carried so
/// a consumer can acknowledge the batch once it has been processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Serialized event payload (JSON text).
    #[serde(default)]
    pub body: String,

    /// Queue-assigned message identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Handle used to delete the message from the queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_handle: Option<String>,
}

impl Envelope {
    /// Create an envelope carrying the given body.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            message_id: None,
            receipt_handle: None,
        }
    }

    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    #[must_use]
    pub fn with_receipt_handle(mut self, receipt_handle: impl Into<String>) -> Self {
        self.receipt_handle = Some(receipt_handle.into());
        self
    }
}

/// A Lambda-style SQS batch document: `{"Records": [{"body": "..."}]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqsEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<Envelope>,
}

impl SqsEvent {
    /// Parse a batch document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Result returned to the caller once a batch has been fully processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub status_code: u16,
}

impl BatchResponse {
    /// The only response this component produces: `{"statusCode": 200}`.
    #[must_use]
    pub fn ok() -> Self {
        Self { status_code: 200 }
    }
}
