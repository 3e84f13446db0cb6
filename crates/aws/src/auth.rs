use tracing::{debug, info};

use crate::config::AwsBaseConfig;

const DEFAULT_SESSION_NAME: &str = "authtrail-worker";

/// Build an AWS SDK configuration from the given [`AwsBaseConfig`].
///
/// Uses the standard AWS SDK environment credential chain and optionally:
/// - Overrides the endpoint URL for local development (e.g. `LocalStack`)
/// - Bounds every operation with the configured timeout
/// - Assumes an IAM role via STS, with automatic credential refresh
///
/// The resulting config is loaded once at startup; the clients built from it
/// are shared for the lifetime of the process.
pub async fn build_sdk_config(config: &AwsBaseConfig) -> aws_config::SdkConfig {
    let loader = base_loader(config);

    let Some(role_arn) = &config.role_arn else {
        return loader.load().await;
    };

    let session_name = config
        .session_name
        .as_deref()
        .unwrap_or(DEFAULT_SESSION_NAME);
    info!(role_arn = %role_arn, session_name = %session_name, "assuming IAM role via STS (auto-refresh)");

    // The assume-role provider inherits the endpoint override and base
    // credentials of the unauthenticated loader for its STS calls.
    let base_config = loader.load().await;

    let mut provider_builder = aws_config::sts::AssumeRoleProvider::builder(role_arn)
        .session_name(session_name)
        .region(aws_config::Region::new(config.region.clone()));
    if let Some(external_id) = &config.external_id {
        provider_builder = provider_builder.external_id(external_id);
    }
    let assume_role_provider = provider_builder.configure(&base_config).build().await;

    base_loader(config)
        .credentials_provider(assume_role_provider)
        .load()
        .await
}

fn base_loader(config: &AwsBaseConfig) -> aws_config::ConfigLoader {
    let mut loader = aws_config::from_env().region(aws_config::Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint_url {
        debug!(endpoint = %endpoint, "using custom AWS endpoint");
        loader = loader.endpoint_url(endpoint);
    }

    if let Some(timeout) = config.operation_timeout() {
        debug!(timeout_secs = timeout.as_secs(), "bounding AWS operations");
        loader = loader.timeout_config(
            aws_config::timeout::TimeoutConfig::builder()
                .operation_timeout(timeout)
                .build(),
        );
    }

    loader
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    // The AWS SDK panics on `load()` without system root certificates, so
    // these only run in integration test mode.

    #[tokio::test]
    async fn build_sdk_config_sets_region() {
        let config = AwsBaseConfig::new("ap-northeast-1");
        let sdk_config = build_sdk_config(&config).await;
        assert_eq!(
            sdk_config.region().map(|r| r.as_ref()),
            Some("ap-northeast-1")
        );
    }

    #[tokio::test]
    async fn build_sdk_config_with_timeout() {
        let config = AwsBaseConfig::new("us-west-2")
            .with_endpoint_url("http://localhost:4566")
            .with_operation_timeout(std::time::Duration::from_secs(5));
        let sdk_config = build_sdk_config(&config).await;
        assert_eq!(
            sdk_config
                .timeout_config()
                .and_then(|t| t.operation_timeout()),
            Some(std::time::Duration::from_secs(5))
        );
    }
}
