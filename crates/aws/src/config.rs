use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Shared AWS settings for the directory and queue clients.
///
/// Contains the region, an optional STS assume-role ARN for cross-account
/// pools, an endpoint URL override for local development (e.g.
/// `LocalStack`) and the per-operation timeout applied by the SDK.
#[derive(Clone, Serialize, Deserialize)]
pub struct AwsBaseConfig {
    /// AWS region (e.g. `"us-east-1"`).
    #[serde(default = "default_region")]
    pub region: String,

    /// Optional IAM role ARN to assume via STS.
    #[serde(default)]
    pub role_arn: Option<String>,

    /// Optional endpoint URL override for local development.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Optional STS session name (defaults to `"authtrail-worker"`).
    #[serde(default)]
    pub session_name: Option<String>,

    /// Optional external ID for cross-account trust policies.
    #[serde(default)]
    pub external_id: Option<String>,

    /// Upper bound on one SDK operation, retries included.
    #[serde(default)]
    pub operation_timeout_seconds: Option<u64>,
}

impl std::fmt::Debug for AwsBaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsBaseConfig")
            .field("region", &self.region)
            .field("role_arn", &self.role_arn.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint_url", &self.endpoint_url)
            .field("session_name", &self.session_name)
            .field("external_id", &self.external_id.as_ref().map(|_| "[REDACTED]"))
            .field("operation_timeout_seconds", &self.operation_timeout_seconds)
            .finish()
    }
}

impl AwsBaseConfig {
    /// Create a new `AwsBaseConfig` with the given region.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }

    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    #[must_use]
    pub fn with_session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = Some(session_name.into());
        self
    }

    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_seconds = Some(timeout.as_secs());
        self
    }

    /// The configured operation timeout, if any.
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_seconds.map(Duration::from_secs)
    }
}

fn default_region() -> String {
    "us-east-1".to_owned()
}

impl Default for AwsBaseConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            role_arn: None,
            endpoint_url: None,
            session_name: None,
            external_id: None,
            operation_timeout_seconds: None,
        }
    }
}
