//! Wiring of the production backends from a [`WorkerConfig`].

use std::path::Path;
use std::sync::Arc;

use authtrail_aws::{CognitoDirectory, SqsBatchSource};
use authtrail_core::{
    BatchResolver, BatchResponse, HistorySink, IdentityDirectory, SqsEvent, TracingSink,
};
use tracing::{error, info};

use crate::config::{ConfigError, WorkerConfig};
use crate::consumer::Consumer;
use crate::error::WorkerError;
use crate::telemetry;

/// Load the configuration file.
///
/// A failure is logged through a stderr-only subscriber, since the
/// configured one cannot be built without the file.
pub fn load_config(path: &Path) -> Result<WorkerConfig, ConfigError> {
    WorkerConfig::load(path).inspect_err(|e| {
        telemetry::init_fallback();
        error!(error = %e, path = %path.display(), "failed to load configuration");
    })
}

/// Build a resolver backed by the Cognito user pool and logging history
/// through `tracing`.
pub async fn cognito_resolver(
    config: &WorkerConfig,
    pool_override: Option<String>,
) -> Result<BatchResolver<CognitoDirectory>, WorkerError> {
    let resolver_config = config.resolver_config(pool_override)?;
    let directory = CognitoDirectory::new(config.directory.cognito.clone()).await;
    let sink: Arc<dyn HistorySink> = Arc::new(TracingSink);

    info!(
        pool_id = %resolver_config.pool_id,
        max_history = resolver_config.max_history,
        subject_mode = ?resolver_config.subject_mode,
        "resolver configured"
    );
    Ok(BatchResolver::new(resolver_config, directory, sink)?)
}

/// Build the SQS consumer for the `run` command.
pub async fn sqs_consumer(
    config: &WorkerConfig,
    pool_override: Option<String>,
) -> Result<Consumer<SqsBatchSource, CognitoDirectory>, WorkerError> {
    let queue = config.queue_config()?.clone();
    let resolver = cognito_resolver(config, pool_override).await?;
    info!(queue_url = %queue.queue_url, "queue configured");
    let source = SqsBatchSource::new(queue).await?;
    Ok(Consumer::new(
        source,
        resolver,
        config.consumer.error_backoff(),
    ))
}

/// Run one Lambda-style batch document through `resolver`.
pub async fn replay<D: IdentityDirectory>(
    resolver: &BatchResolver<D>,
    document: &str,
) -> Result<BatchResponse, WorkerError> {
    let event = SqsEvent::from_json(document)?;
    Ok(resolver.process(&event.records).await?)
}

/// Check that the configured user pool is reachable.
pub async fn check<D: IdentityDirectory>(resolver: &BatchResolver<D>) -> Result<(), WorkerError> {
    let directory = resolver.directory();
    directory.health_check(&resolver.config().pool_id).await?;
    info!(directory = directory.name(), pool_id = %resolver.config().pool_id, "directory reachable");
    Ok(())
}
