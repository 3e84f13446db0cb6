//! SQS queue as the batch source.

use authtrail_core::{BatchSource, Envelope, SourceError};
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{DeleteMessageBatchRequestEntry, Message};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use crate::auth::build_sdk_config;
use crate::config::AwsBaseConfig;
use crate::error::AwsError;

/// Most messages SQS returns or deletes in a single call.
pub const MAX_BATCH_SIZE: i32 = 10;

const DELETE_CHUNK_SIZE: usize = 10;

/// Longest long-poll wait SQS accepts, in seconds.
pub const MAX_WAIT_TIME_SECONDS: i32 = 20;

/// Configuration for the SQS batch source.
#[derive(Clone, Serialize, Deserialize)]
pub struct SqsSourceConfig {
    /// Shared AWS configuration (region, role ARN, endpoint URL).
    #[serde(flatten)]
    pub aws: AwsBaseConfig,

    /// URL of the queue carrying the authentication events.
    pub queue_url: String,

    /// Messages requested per receive (1-10).
    #[serde(default = "default_max_messages")]
    pub max_messages: i32,

    /// Long-poll wait per receive in seconds (0-20).
    #[serde(default = "default_wait_time_seconds")]
    pub wait_time_seconds: i32,

    /// Overrides the queue's visibility timeout for received messages.
    #[serde(default)]
    pub visibility_timeout_seconds: Option<i32>,
}

impl std::fmt::Debug for SqsSourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqsSourceConfig")
            .field("aws", &self.aws)
            .field("queue_url", &self.queue_url)
            .field("max_messages", &self.max_messages)
            .field("wait_time_seconds", &self.wait_time_seconds)
            .field("visibility_timeout_seconds", &self.visibility_timeout_seconds)
            .finish()
    }
}

fn default_max_messages() -> i32 {
    MAX_BATCH_SIZE
}

fn default_wait_time_seconds() -> i32 {
    MAX_WAIT_TIME_SECONDS
}

impl SqsSourceConfig {
    /// Create a new `SqsSourceConfig` for the given region and queue.
    pub fn new(region: impl Into<String>, queue_url: impl Into<String>) -> Self {
        Self {
            aws: AwsBaseConfig::new(region),
            queue_url: queue_url.into(),
            max_messages: default_max_messages(),
            wait_time_seconds: default_wait_time_seconds(),
            visibility_timeout_seconds: None,
        }
    }

    #[must_use]
    pub fn with_max_messages(mut self, max_messages: i32) -> Self {
        self.max_messages = max_messages;
        self
    }

    #[must_use]
    pub fn with_wait_time_seconds(mut self, wait_time_seconds: i32) -> Self {
        self.wait_time_seconds = wait_time_seconds;
        self
    }

    #[must_use]
    pub fn with_visibility_timeout_seconds(mut self, seconds: i32) -> Self {
        self.visibility_timeout_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.aws.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Check the values against the limits SQS enforces.
    pub fn validate(&self) -> Result<(), AwsError> {
        if self.queue_url.trim().is_empty() {
            return Err(AwsError::Configuration("queue_url must not be empty".to_owned()));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.max_messages) {
            return Err(AwsError::Configuration(format!(
                "max_messages must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.max_messages
            )));
        }
        if !(0..=MAX_WAIT_TIME_SECONDS).contains(&self.wait_time_seconds) {
            return Err(AwsError::Configuration(format!(
                "wait_time_seconds must be between 0 and {MAX_WAIT_TIME_SECONDS}, got {}",
                self.wait_time_seconds
            )));
        }
        if let Some(visibility) = self.visibility_timeout_seconds
            && visibility < 0
        {
            return Err(AwsError::Configuration(format!(
                "visibility_timeout_seconds must not be negative, got {visibility}"
            )));
        }
        Ok(())
    }
}

/// [`BatchSource`] that long-polls an SQS queue.
///
/// Received messages stay invisible for the queue's visibility timeout. A
/// batch that is never acknowledged reappears afterwards, which is how a
/// failed batch gets redelivered.
pub struct SqsBatchSource {
    config: SqsSourceConfig,
    client: aws_sdk_sqs::Client,
}

impl std::fmt::Debug for SqsBatchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqsBatchSource")
            .field("config", &self.config)
            .field("client", &"<SqsClient>")
            .finish()
    }
}

impl SqsBatchSource {
    /// Create an `SqsBatchSource` by building an AWS SDK client.
    pub async fn new(config: SqsSourceConfig) -> Result<Self, AwsError> {
        config.validate()?;
        let sdk_config = build_sdk_config(&config.aws).await;
        let client = aws_sdk_sqs::Client::new(&sdk_config);
        Ok(Self { config, client })
    }

    /// Create an `SqsBatchSource` with a pre-built client.
    pub fn with_client(
        config: SqsSourceConfig,
        client: aws_sdk_sqs::Client,
    ) -> Result<Self, AwsError> {
        config.validate()?;
        Ok(Self { config, client })
    }
}

impl BatchSource for SqsBatchSource {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "sqs"
    }

    #[instrument(skip(self), fields(queue_url = %self.config.queue_url))]
    async fn receive(&self) -> Result<Vec<Envelope>, SourceError> {
        let mut request = self
            .client
            .receive_message()
            .queue_url(&self.config.queue_url)
            .max_number_of_messages(self.config.max_messages)
            .wait_time_seconds(self.config.wait_time_seconds);
        if let Some(visibility) = self.config.visibility_timeout_seconds {
            request = request.visibility_timeout(visibility);
        }

        let output = request.send().await.map_err(|e| {
            let err_str = DisplayErrorContext(&e).to_string();
            error!(error = %err_str, "SQS receive_message failed");
            SourceError::Receive(err_str)
        })?;

        let batch: Vec<Envelope> = output.messages().iter().map(message_to_envelope).collect();
        debug!(messages = batch.len(), "SQS batch received");
        Ok(batch)
    }

    #[instrument(skip_all, fields(queue_url = %self.config.queue_url, messages = batch.len()))]
    async fn acknowledge(&self, batch: &[Envelope]) -> Result<(), SourceError> {
        let entries = delete_entries(batch)?;

        for chunk in entries.chunks(DELETE_CHUNK_SIZE) {
            let output = self
                .client
                .delete_message_batch()
                .queue_url(&self.config.queue_url)
                .set_entries(Some(chunk.to_vec()))
                .send()
                .await
                .map_err(|e| {
                    let err_str = DisplayErrorContext(&e).to_string();
                    error!(error = %err_str, "SQS delete_message_batch failed");
                    SourceError::Acknowledge(err_str)
                })?;

            let failed = output.failed();
            if !failed.is_empty() {
                let detail = failed
                    .iter()
                    .map(|f| format!("{}: {}", f.id(), f.code()))
                    .collect::<Vec<_>>()
                    .join(", ");
                error!(failed = failed.len(), detail = %detail, "SQS rejected some deletes");
                return Err(SourceError::Acknowledge(format!(
                    "{} of {} deletes failed ({detail})",
                    failed.len(),
                    chunk.len()
                )));
            }
        }

        debug!("SQS batch acknowledged");
        Ok(())
    }
}

/// Map a received message to an envelope. A message without a body becomes
/// an envelope with an empty body, which fails subject extraction.
pub(crate) fn message_to_envelope(message: &Message) -> Envelope {
    Envelope {
        body: message.body().unwrap_or_default().to_owned(),
        message_id: message.message_id().map(str::to_owned),
        receipt_handle: message.receipt_handle().map(str::to_owned),
    }
}

/// Build delete entries for every envelope that carries a receipt handle.
/// Entry ids are the envelope's position in the batch.
pub(crate) fn delete_entries(
    batch: &[Envelope],
) -> Result<Vec<DeleteMessageBatchRequestEntry>, SourceError> {
    let mut entries = Vec::with_capacity(batch.len());
    for (index, envelope) in batch.iter().enumerate() {
        let Some(handle) = envelope.receipt_handle.as_deref() else {
            warn!(
                index,
                message_id = envelope.message_id.as_deref().unwrap_or(""),
                "envelope has no receipt handle, cannot delete"
            );
            continue;
        };
        let entry = DeleteMessageBatchRequestEntry::builder()
            .id(index.to_string())
            .receipt_handle(handle)
            .build()
            .map_err(|e| SourceError::Acknowledge(e.to_string()))?;
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUEUE: &str = "https://sqs.us-east-1.amazonaws.com/123456789012/auth-events";

    #[test]
    fn config_defaults() {
        let config = SqsSourceConfig::new("us-east-1", QUEUE);
        assert_eq!(config.max_messages, 10);
        assert_eq!(config.wait_time_seconds, 20);
        assert!(config.visibility_timeout_seconds.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: SqsSourceConfig =
            serde_json::from_value(serde_json::json!({"region": "us-east-1", "queue_url": QUEUE}))
                .unwrap();
        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.max_messages, 10);
        assert_eq!(config.wait_time_seconds, 20);
    }

    #[test]
    fn config_rejects_out_of_range_values() {
        let base = SqsSourceConfig::new("us-east-1", QUEUE);
        assert!(base.clone().with_max_messages(0).validate().is_err());
        assert!(base.clone().with_max_messages(11).validate().is_err());
        assert!(base.clone().with_wait_time_seconds(21).validate().is_err());
        assert!(base.clone().with_wait_time_seconds(-1).validate().is_err());
        assert!(base.clone().with_visibility_timeout_seconds(-5).validate().is_err());
        assert!(SqsSourceConfig::new("us-east-1", " ").validate().is_err());
        base.with_wait_time_seconds(0).validate().unwrap();
    }

    #[test]
    fn message_maps_to_envelope() {
        let message = Message::builder()
            .message_id("m-1")
            .receipt_handle("rh-1")
            .body(r#"{"detail":{}}"#)
            .build();
        let envelope = message_to_envelope(&message);
        assert_eq!(envelope.body, r#"{"detail":{}}"#);
        assert_eq!(envelope.message_id.as_deref(), Some("m-1"));
        assert_eq!(envelope.receipt_handle.as_deref(), Some("rh-1"));
    }

    #[test]
    fn message_without_body_has_empty_body() {
        let envelope = message_to_envelope(&Message::builder().message_id("m-2").build());
        assert_eq!(envelope.body, "");
    }

    #[test]
    fn delete_entries_skip_envelopes_without_handle() {
        let batch = vec![
            Envelope::new("a").with_receipt_handle("rh-0"),
            Envelope::new("b"),
            Envelope::new("c").with_receipt_handle("rh-2"),
        ];
        let entries = delete_entries(&batch).unwrap();
        let ids: Vec<&str> = entries.iter().map(DeleteMessageBatchRequestEntry::id).collect();
        let handles: Vec<&str> = entries
            .iter()
            .map(DeleteMessageBatchRequestEntry::receipt_handle)
            .collect();
        assert_eq!(ids, vec!["0", "2"]);
        assert_eq!(handles, vec!["rh-0", "rh-2"]);
    }
}
