//! Log output and span export for the worker.
//!
//! History dumps from [`TracingSink`](authtrail_core::TracingSink) are
//! ordinary `tracing` events, so they land wherever the fmt layer writes:
//! stderr. With `[telemetry.otlp]` set, spans are exported as well, tagged
//! with the pool and queue this worker serves.

use std::time::Duration;

use opentelemetry::trace::TracerProvider;
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{BatchSpanProcessor, Sampler, SdkTracerProvider};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{OtlpConfig, OtlpProtocol, TelemetryConfig, WorkerConfig};

/// Instrumentation scope of the exported spans.
const TRACER_NAME: &str = env!("CARGO_CRATE_NAME");

/// Keeps the span exporter alive. Call [`TelemetryGuard::shutdown`] before
/// exit to flush buffered spans.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    pub fn shutdown(mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            warn!(error = %e, "span exporter shutdown failed");
        }
    }
}

/// Resource attributes identifying this worker instance.
///
/// Settings that fail validation are left out; the command that needs them
/// reports the problem.
pub fn worker_resource(config: &WorkerConfig, pool_override: Option<String>) -> Vec<KeyValue> {
    let mut attributes = vec![
        KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        KeyValue::new("cloud.region", config.directory.cognito.aws.region.clone()),
        KeyValue::new(
            "authtrail.subject_mode",
            config.resolver.subject_mode.as_str(),
        ),
        KeyValue::new(
            "authtrail.max_history",
            i64::from(config.resolver.max_history),
        ),
    ];
    if let Ok(pool_id) = config.pool_id(pool_override) {
        attributes.push(KeyValue::new("cognito.pool_id", pool_id.to_string()));
    }
    if let Some(queue) = &config.queue {
        attributes.push(KeyValue::new("sqs.queue_url", queue.queue_url.clone()));
    }
    attributes
}

/// Install the global subscriber.
///
/// A span exporter that cannot be built is logged and skipped; the worker
/// still starts with stderr logging.
pub fn init(config: &TelemetryConfig, resource: Vec<KeyValue>) -> TelemetryGuard {
    let registry = tracing_subscriber::registry()
        .with(log_filter(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    let Some(otlp) = &config.otlp else {
        registry.init();
        return TelemetryGuard { provider: None };
    };

    match otlp_provider(otlp, resource) {
        Ok(provider) => {
            global::set_tracer_provider(provider.clone());
            let tracer = provider.tracer(TRACER_NAME);
            registry
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .init();
            info!(
                endpoint = %otlp.endpoint,
                protocol = ?otlp.protocol,
                sample_ratio = otlp.sample_ratio,
                "exporting spans over OTLP"
            );
            TelemetryGuard {
                provider: Some(provider),
            }
        }
        Err(e) => {
            registry.init();
            warn!(error = %e, endpoint = %otlp.endpoint, "span export disabled");
            TelemetryGuard { provider: None }
        }
    }
}

/// Stderr logging at `info`, for failures before the configuration is known.
pub fn init_fallback() {
    let _ = tracing_subscriber::registry()
        .with(log_filter("info"))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn otlp_provider(
    config: &OtlpConfig,
    resource: Vec<KeyValue>,
) -> Result<SdkTracerProvider, String> {
    let timeout = Duration::from_secs(config.timeout_seconds);
    let builder = opentelemetry_otlp::SpanExporter::builder();
    let exporter = match config.protocol {
        OtlpProtocol::Grpc => builder
            .with_tonic()
            .with_endpoint(&config.endpoint)
            .with_timeout(timeout)
            .build(),
        OtlpProtocol::Http => builder
            .with_http()
            .with_endpoint(&config.endpoint)
            .with_timeout(timeout)
            .build(),
    }
    .map_err(|e| e.to_string())?;

    // Follow the caller's decision when a batch arrives with a sampled parent.
    let sampler = Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
        config.sample_ratio.clamp(0.0, 1.0),
    )));

    Ok(SdkTracerProvider::builder()
        .with_span_processor(BatchSpanProcessor::builder(exporter).build())
        .with_sampler(sampler)
        .with_resource(Resource::builder().with_attributes(resource).build())
        .build())
}
